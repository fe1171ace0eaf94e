//! Error types for web handlers.
//!
//! [`AppError`] bridges domain errors and HTTP responses via Axum's
//! `IntoResponse`. The body carries a stable machine-readable code next to
//! the human-readable message; internal detail stays in the log.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lagoon_core::admission::AdmissionError;
use lagoon_core::store::StoreError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code.
    status: StatusCode,
    /// User-facing message.
    message: String,
    /// Stable code for client error handling.
    code: String,
    /// Internal error, logged but never exposed to the client.
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach a source error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            message.into(),
            "CONFLICT".to_string(),
        )
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Stable code for client error handling.
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

/// Map admission rejections to their HTTP shape. Rejection codes come from
/// [`AdmissionError::code`] uppercased, so clients can branch on them.
impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        let status = match &err {
            AdmissionError::NotFound { .. } | AdmissionError::BookingNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            AdmissionError::InvalidDateRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AdmissionError::DateBlocked { .. }
            | AdmissionError::AlreadyBooked { .. }
            | AdmissionError::PendingLimitExceeded { .. } => StatusCode::CONFLICT,
            AdmissionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let code = err.code().to_uppercase();
        if status.is_server_error() {
            Self::new(status, "An internal error occurred".to_string(), code)
                .with_source(err.into())
        } else {
            Self::new(status, err.to_string(), code)
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { entity, key } => {
                Self::conflict(format!("{entity} {key} already exists"))
            }
            other => Self::internal("An internal error occurred").with_source(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lagoon_core::types::ResortId;

    #[test]
    fn error_display_includes_code() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn not_found_formats_resource_and_id() {
        let err = AppError::not_found("Booking", "123");
        assert_eq!(err.to_string(), "[NOT_FOUND] Booking with id 123 not found");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn admission_rejections_keep_their_codes() {
        let err: AppError = AdmissionError::NotFound {
            resort_id: ResortId::new(),
        }
        .into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");

        let err: AppError = AdmissionError::AlreadyBooked {
            resort_name: "Blue Lagoon".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default(),
        }
        .into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "ALREADY_BOOKED");
    }

    #[test]
    fn store_failures_hide_detail() {
        let err: AppError = AdmissionError::Store(StoreError::Database("pg down".to_string())).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "An internal error occurred");
    }
}
