//! Resort catalogue handlers: listing, admin CRUD, blocked dates, and
//! price quotes.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use lagoon_core::event::kinds;
use lagoon_core::pricing::PriceBreakdown;
use lagoon_core::store::{NewResort, RateOverride, ResortRemoval, ResortUpdate};
use lagoon_core::types::{BlockSource, BlockedDate, DayType, Money, Resort, ResortId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Body for `POST /api/resorts`.
#[derive(Debug, Deserialize)]
pub struct CreateResortRequest {
    /// Display name.
    pub name: String,
    /// Human-readable location.
    pub location: String,
    /// Base nightly rate in whole currency units.
    pub base_price: u64,
    /// Maximum guests per booking.
    pub max_guests: u32,
    /// Ordering key for listings.
    #[serde(default)]
    pub display_rank: i32,
    /// Optional day-type rate overrides.
    #[serde(default)]
    pub pricing_rules: Vec<RateOverrideRequest>,
}

/// One rate override in a create/update body.
#[derive(Debug, Deserialize)]
pub struct RateOverrideRequest {
    /// Day class, `weekday` / `friday` / `weekend`.
    pub day_type: String,
    /// Nightly rate for that class.
    pub price: u64,
}

/// Body for `PUT /api/resorts/{id}`. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateResortRequest {
    /// New display name.
    pub name: Option<String>,
    /// New location.
    pub location: Option<String>,
    /// New base nightly rate.
    pub base_price: Option<u64>,
    /// New availability flag.
    pub available: Option<bool>,
    /// New guest capacity.
    pub max_guests: Option<u32>,
    /// New listing rank.
    pub display_rank: Option<i32>,
    /// Replacement rule set; replaces the existing rules wholesale.
    pub pricing_rules: Option<Vec<RateOverrideRequest>>,
}

fn validate_price(price: u64, what: &str) -> Result<Money, AppError> {
    if price == 0 {
        return Err(AppError::validation(format!(
            "{what} must be greater than zero"
        )));
    }
    if price > Money::MAX_PRICE.amount() {
        return Err(AppError::validation(format!(
            "{what} must not exceed {}",
            Money::MAX_PRICE
        )));
    }
    Ok(Money::new(price))
}

fn parse_rules(rules: Vec<RateOverrideRequest>) -> Result<Vec<RateOverride>, AppError> {
    rules
        .into_iter()
        .map(|rule| {
            let day_type = DayType::parse(&rule.day_type)
                .ok_or_else(|| AppError::validation(format!("unknown day type: {}", rule.day_type)))?;
            Ok(RateOverride {
                day_type,
                price: validate_price(rule.price, "rule price")?,
            })
        })
        .collect()
}

/// `GET /api/resorts` — full catalogue in display order.
pub async fn list_resorts(State(state): State<AppState>) -> Result<Json<Vec<Resort>>, AppError> {
    Ok(Json(state.store.list_resorts().await?))
}

/// `GET /api/resorts/{id}`.
pub async fn get_resort(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Resort>, AppError> {
    let id = ResortId::from_uuid(id);
    let resort = state
        .store
        .resort(id)
        .await?
        .ok_or_else(|| AppError::not_found("Resort", id))?;
    Ok(Json(resort))
}

/// `POST /api/resorts` — create a resort and emit `resort.created`.
pub async fn create_resort(
    State(state): State<AppState>,
    Json(request): Json<CreateResortRequest>,
) -> Result<(StatusCode, Json<Resort>), AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::validation("resort name must not be empty"));
    }
    let base_price = validate_price(request.base_price, "base price")?;
    if request.max_guests == 0 {
        return Err(AppError::validation("max guests must be greater than zero"));
    }

    let resort = state
        .store
        .create_resort(NewResort {
            name: request.name,
            location: request.location,
            base_price,
            max_guests: request.max_guests,
            display_rank: request.display_rank,
            pricing_rules: parse_rules(request.pricing_rules)?,
        })
        .await?;

    state
        .publisher
        .publish(
            kinds::RESORT_CREATED,
            serde_json::to_value(&resort).unwrap_or_default(),
        )
        .await;
    Ok((StatusCode::CREATED, Json(resort)))
}

/// `PUT /api/resorts/{id}` — partial update, emits `resort.updated`.
pub async fn update_resort(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateResortRequest>,
) -> Result<Json<Resort>, AppError> {
    let id = ResortId::from_uuid(id);
    let update = ResortUpdate {
        name: request.name,
        location: request.location,
        base_price: request
            .base_price
            .map(|price| validate_price(price, "base price"))
            .transpose()?,
        available: request.available,
        max_guests: request.max_guests,
        display_rank: request.display_rank,
        pricing_rules: request.pricing_rules.map(parse_rules).transpose()?,
    };

    let resort = state
        .store
        .update_resort(id, update)
        .await?
        .ok_or_else(|| AppError::not_found("Resort", id))?;

    state
        .publisher
        .publish(
            kinds::RESORT_UPDATED,
            serde_json::to_value(&resort).unwrap_or_default(),
        )
        .await;
    Ok(Json(resort))
}

/// `DELETE /api/resorts/{id}` — delete, or soft-disable when bookings
/// reference the resort. Emits `resort.deleted` either way.
pub async fn delete_resort(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = ResortId::from_uuid(id);
    let removal = state
        .store
        .remove_resort(id)
        .await?
        .ok_or_else(|| AppError::not_found("Resort", id))?;

    state
        .publisher
        .publish(kinds::RESORT_DELETED, json!({"id": id, "outcome": removal}))
        .await;
    let outcome = match removal {
        ResortRemoval::Deleted => "deleted",
        ResortRemoval::Disabled => "disabled",
    };
    Ok(Json(json!({"id": id, "outcome": outcome})))
}

/// Query for `GET /api/resorts/{id}/quote`.
#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    /// First night of the stay.
    pub check_in: NaiveDate,
    /// Vacate date.
    pub check_out: NaiveDate,
    /// Optional coupon code.
    pub coupon: Option<String>,
}

/// `GET /api/resorts/{id}/quote` — price a prospective stay.
pub async fn quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<QuoteParams>,
) -> Result<Json<PriceBreakdown>, AppError> {
    let breakdown = state
        .controller
        .quote(
            ResortId::from_uuid(id),
            params.check_in,
            params.check_out,
            params.coupon.as_deref(),
        )
        .await?;
    Ok(Json(breakdown))
}

/// Body for `POST /api/resorts/{id}/blocked-dates`; query for the DELETE.
#[derive(Debug, Deserialize, Serialize)]
pub struct BlockedDateParams {
    /// The check-in date to block.
    pub date: NaiveDate,
    /// `admin` or `owner`.
    pub source: String,
}

fn parse_source(source: &str) -> Result<BlockSource, AppError> {
    BlockSource::parse(source)
        .ok_or_else(|| AppError::validation(format!("unknown block source: {source}")))
}

/// `GET /api/resorts/{id}/blocked-dates`.
pub async fn list_blocked_dates(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BlockedDate>>, AppError> {
    let id = ResortId::from_uuid(id);
    state
        .store
        .resort(id)
        .await?
        .ok_or_else(|| AppError::not_found("Resort", id))?;
    Ok(Json(state.store.blocked_dates(id).await?))
}

/// `POST /api/resorts/{id}/blocked-dates` — idempotent block.
pub async fn add_blocked_date(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<BlockedDateParams>,
) -> Result<StatusCode, AppError> {
    let id = ResortId::from_uuid(id);
    let source = parse_source(&request.source)?;
    state
        .store
        .resort(id)
        .await?
        .ok_or_else(|| AppError::not_found("Resort", id))?;
    state.store.add_blocked_date(id, request.date, source).await?;
    state
        .publisher
        .publish(
            kinds::RESORT_UPDATED,
            json!({"id": id, "blocked_date": request.date, "source": request.source}),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/resorts/{id}/blocked-dates?date=&source=` — lift one block.
/// Only the named list is touched; the other list's block stands.
pub async fn remove_blocked_date(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<BlockedDateParams>,
) -> Result<StatusCode, AppError> {
    let id = ResortId::from_uuid(id);
    let source = parse_source(&params.source)?;
    let removed = state
        .store
        .remove_blocked_date(id, params.date, source)
        .await?;
    if !removed {
        return Err(AppError::not_found("Blocked date", params.date));
    }
    state
        .publisher
        .publish(
            kinds::RESORT_UPDATED,
            json!({"id": id, "unblocked_date": params.date, "source": params.source}),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}
