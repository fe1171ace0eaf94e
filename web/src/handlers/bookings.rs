//! Booking handlers: admission, lookup, and payment lifecycle operations.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use lagoon_core::admission::{AdmittedBooking, BookingRequest};
use lagoon_core::types::{Booking, BookingId, ResortId};
use serde::Deserialize;
use uuid::Uuid;

/// `POST /api/bookings` — run the admission pipeline. On success the
/// response carries the booking and its payment instruction.
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<AdmittedBooking>), AppError> {
    if request.guest_name.trim().is_empty() {
        return Err(AppError::validation("guest name must not be empty"));
    }
    if request.guests == 0 {
        return Err(AppError::validation("guest count must be greater than zero"));
    }
    let admitted = state.controller.admit(request).await?;
    Ok((StatusCode::CREATED, Json(admitted)))
}

/// Query for `GET /api/bookings`.
#[derive(Debug, Deserialize)]
pub struct ListBookingsParams {
    /// Restrict to one resort.
    pub resort_id: Option<Uuid>,
}

/// `GET /api/bookings?resort_id=` — newest first.
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(params): Query<ListBookingsParams>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .store
        .list_bookings(params.resort_id.map(ResortId::from_uuid))
        .await?;
    Ok(Json(bookings))
}

/// `GET /api/bookings/{id}`.
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let id = BookingId::from_uuid(id);
    let booking = state
        .store
        .booking(id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking", id))?;
    Ok(Json(booking))
}

/// Body for `POST /api/bookings/{id}/payment-proof`.
#[derive(Debug, Deserialize)]
pub struct PaymentProofRequest {
    /// Externally supplied transaction reference.
    pub transaction_id: String,
    /// Optional card suffix.
    pub card_last_four: Option<String>,
}

/// `POST /api/bookings/{id}/payment-proof` — record the guest's payment
/// reference and move the booking to `pending_verification`.
pub async fn submit_payment_proof(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentProofRequest>,
) -> Result<Json<Booking>, AppError> {
    if request.transaction_id.trim().is_empty() {
        return Err(AppError::validation("transaction id must not be empty"));
    }
    let booking = state
        .controller
        .submit_payment_proof(
            BookingId::from_uuid(id),
            request.transaction_id,
            request.card_last_four,
        )
        .await?;
    Ok(Json(booking))
}

/// `POST /api/bookings/{id}/mark-paid` — operator reconciliation.
pub async fn mark_paid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.controller.mark_paid(BookingId::from_uuid(id)).await?;
    Ok(Json(booking))
}

/// `POST /api/bookings/{id}/cancel` — operator cancellation; releases the
/// booking's date claims.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.controller.cancel(BookingId::from_uuid(id)).await?;
    Ok(Json(booking))
}
