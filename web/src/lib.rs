//! HTTP and SSE surface for the Lagoon booking platform.
//!
//! The binary wires the pieces together in `main`: a `PostgreSQL` booking
//! store, a Redpanda event bus, the admission controller, the in-process
//! [`hub::EventHub`], the broker [`bridge`], and the notification outbox
//! drain ([`notifier`]). Handlers receive all of it through [`AppState`] —
//! nothing in this crate reaches for a global.
//!
//! Request flow for a booking:
//!
//! 1. `POST /api/bookings` arrives and is parsed;
//! 2. the admission controller runs its precondition pipeline and prices
//!    the stay;
//! 3. the store commits booking, proof, and notification in one guarded
//!    transaction;
//! 4. `booking.created` goes to the broker, the bridge fans it back into
//!    every process's hub, and SSE listeners see it as a frame.

pub mod bridge;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod middleware;
pub mod notifier;
pub mod state;

pub use config::AppConfig;
pub use error::AppError;
pub use hub::EventHub;
pub use state::AppState;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Assemble the application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route(
            "/api/resorts",
            get(handlers::resorts::list_resorts).post(handlers::resorts::create_resort),
        )
        .route(
            "/api/resorts/:id",
            get(handlers::resorts::get_resort)
                .put(handlers::resorts::update_resort)
                .delete(handlers::resorts::delete_resort),
        )
        .route("/api/resorts/:id/quote", get(handlers::resorts::quote))
        .route(
            "/api/resorts/:id/blocked-dates",
            get(handlers::resorts::list_blocked_dates)
                .post(handlers::resorts::add_blocked_date)
                .delete(handlers::resorts::remove_blocked_date),
        )
        .route(
            "/api/bookings",
            get(handlers::bookings::list_bookings).post(handlers::bookings::create_booking),
        )
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/payment-proof",
            post(handlers::bookings::submit_payment_proof),
        )
        .route("/api/bookings/:id/mark-paid", post(handlers::bookings::mark_paid))
        .route("/api/bookings/:id/cancel", post(handlers::bookings::cancel_booking))
        .route(
            "/api/coupons",
            get(handlers::coupons::list_coupons).post(handlers::coupons::create_coupon),
        )
        .route("/api/coupons/:code", delete(handlers::coupons::delete_coupon))
        .route("/api/events", get(handlers::events::stream_events))
        .layer(middleware::correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
