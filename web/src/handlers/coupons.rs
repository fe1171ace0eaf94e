//! Coupon admin handlers. Coupons are immutable once created; correction is
//! delete-and-recreate.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use lagoon_core::coupon::validate_definition;
use lagoon_core::event::kinds;
use lagoon_core::store::NewCoupon;
use lagoon_core::types::{Coupon, CouponCode, CouponDayType, DiscountKind, ResortId};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// Body for `POST /api/coupons`.
#[derive(Debug, Deserialize)]
pub struct CreateCouponRequest {
    /// Unique code, matched exactly as entered.
    pub code: String,
    /// `percentage` or `flat`.
    pub kind: String,
    /// Percent (1–100) or whole currency units.
    pub value: u64,
    /// `all`, `weekday`, or `weekend`; defaults to `all`.
    pub day_type: Option<String>,
    /// Optional resort restriction.
    pub resort_id: Option<Uuid>,
}

/// `GET /api/coupons`.
pub async fn list_coupons(State(state): State<AppState>) -> Result<Json<Vec<Coupon>>, AppError> {
    Ok(Json(state.store.list_coupons().await?))
}

/// `POST /api/coupons` — validate, persist, emit `coupon.created`.
pub async fn create_coupon(
    State(state): State<AppState>,
    Json(request): Json<CreateCouponRequest>,
) -> Result<(StatusCode, Json<Coupon>), AppError> {
    let kind = DiscountKind::parse(&request.kind)
        .ok_or_else(|| AppError::validation(format!("unknown discount kind: {}", request.kind)))?;
    let day_type = match request.day_type.as_deref() {
        None => CouponDayType::All,
        Some(s) => CouponDayType::parse(s)
            .ok_or_else(|| AppError::validation(format!("unknown day type: {s}")))?,
    };
    validate_definition(&request.code, kind, request.value)
        .map_err(|e| AppError::validation(e.to_string()))?;

    let coupon = state
        .store
        .create_coupon(NewCoupon {
            code: CouponCode::new(request.code),
            kind,
            value: request.value,
            day_type,
            resort_id: request.resort_id.map(ResortId::from_uuid),
        })
        .await?;

    state
        .publisher
        .publish(
            kinds::COUPON_CREATED,
            serde_json::to_value(&coupon).unwrap_or_default(),
        )
        .await;
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// `DELETE /api/coupons/{code}` — emit `coupon.deleted` on success.
pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    let code = CouponCode::new(code);
    let deleted = state.store.delete_coupon(&code).await?;
    if !deleted {
        return Err(AppError::not_found("Coupon", code));
    }
    state
        .publisher
        .publish(kinds::COUPON_DELETED, json!({"code": code.as_str()}))
        .await;
    Ok(StatusCode::NO_CONTENT)
}
