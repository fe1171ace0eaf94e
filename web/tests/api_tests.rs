//! End-to-end handler tests over in-memory collaborators.
//!
//! Exercises the HTTP surface the way a front end would: admin CRUD,
//! quotes, the booking flow with its payment instruction, and rejection
//! shapes. The fixed test clock pins "today" to 2025-01-01.

#![allow(clippy::expect_used)] // Test code uses expect for clear failure messages
#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use axum_test::TestServer;
use lagoon_core::admission::AdmissionController;
use lagoon_core::environment::Clock;
use lagoon_core::event::EventPublisher;
use lagoon_core::types::{Booking, Coupon, Resort};
use lagoon_testing::fixtures::{self, TEST_PAYEE};
use lagoon_testing::{InMemoryBookingStore, InMemoryEventBus, test_clock};
use lagoon_web::{AppState, EventHub, build_router};
use serde_json::{Value, json};
use std::sync::Arc;

struct TestApp {
    server: TestServer,
    store: Arc<InMemoryBookingStore>,
    bus: Arc<InMemoryEventBus>,
}

fn test_app() -> TestApp {
    let clock: Arc<dyn Clock> = Arc::new(test_clock());
    let store = Arc::new(InMemoryBookingStore::with_clock(clock.clone()));
    let bus = Arc::new(InMemoryEventBus::new());
    let publisher = EventPublisher::new(bus.clone(), clock.clone());
    let controller =
        AdmissionController::new(store.clone(), publisher.clone(), clock, TEST_PAYEE);
    let state = AppState::new(
        store.clone(),
        controller,
        publisher,
        Arc::new(EventHub::default()),
    );
    let server = TestServer::new(build_router(state)).expect("router should build");
    TestApp { server, store, bus }
}

fn booking_body(resort: &Resort) -> Value {
    json!({
        "resort_id": resort.id,
        "guest_name": "Asha Rao",
        "guest_email": "asha@example.com",
        "guest_phone": "9876543210",
        "check_in": "2025-06-01",
        "check_out": "2025-06-03",
        "guests": 2,
        "coupon_code": null,
        "transaction_reference": null
    })
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = test_app();

    let response = app.server.get("/health").await;
    response.assert_status(StatusCode::OK);

    let response = app.server.get("/health/ready").await;
    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn resort_crud_over_http() {
    let app = test_app();

    let response = app
        .server
        .post("/api/resorts")
        .json(&json!({
            "name": "Blue Lagoon",
            "location": "Gokarna",
            "base_price": 1000,
            "max_guests": 4,
            "pricing_rules": [{"day_type": "weekend", "price": 1500}]
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Resort = response.json();
    assert_eq!(created.name, "Blue Lagoon");

    let response = app.server.get("/api/resorts").await;
    response.assert_status(StatusCode::OK);
    let listed: Vec<Resort> = response.json();
    assert_eq!(listed.len(), 1);

    let response = app
        .server
        .put(&format!("/api/resorts/{}", created.id))
        .json(&json!({"base_price": 1200}))
        .await;
    response.assert_status(StatusCode::OK);
    let updated: Resort = response.json();
    assert_eq!(updated.base_price.amount(), 1200);
    assert_eq!(updated.name, "Blue Lagoon");

    // Admin mutations fan out resort facts.
    assert_eq!(app.bus.published_of_type("resort.created").len(), 1);
    assert_eq!(app.bus.published_of_type("resort.updated").len(), 1);

    let response = app
        .server
        .delete(&format!("/api/resorts/{}", created.id))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["outcome"], "deleted");
}

#[tokio::test]
async fn invalid_resorts_are_rejected() {
    let app = test_app();

    let response = app
        .server
        .post("/api/resorts")
        .json(&json!({
            "name": "  ",
            "location": "Nowhere",
            "base_price": 1000,
            "max_guests": 4
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .server
        .post("/api/resorts")
        .json(&json!({
            "name": "Zero",
            "location": "Nowhere",
            "base_price": 0,
            "max_guests": 4
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn oversized_prices_are_rejected() {
    let app = test_app();

    // Rates past the platform maximum never reach the store, so quote
    // arithmetic stays inside u64 for anything admitted over HTTP.
    let response = app
        .server
        .post("/api/resorts")
        .json(&json!({
            "name": "Gold Plated",
            "location": "Nowhere",
            "base_price": u64::MAX / 2,
            "max_guests": 4
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .server
        .post("/api/resorts")
        .json(&json!({
            "name": "Gold Plated",
            "location": "Nowhere",
            "base_price": 1000,
            "max_guests": 4,
            "pricing_rules": [{"day_type": "weekend", "price": u64::MAX / 2}]
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let resort = fixtures::resort("Blue Lagoon", 1000);
    app.store.seed_resort(resort.clone());
    let response = app
        .server
        .put(&format!("/api/resorts/{}", resort.id))
        .json(&json!({"base_price": u64::MAX / 2}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .server
        .put(&format!("/api/resorts/{}", resort.id))
        .json(&json!({"base_price": 0}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn quote_returns_the_canonical_breakdown() {
    let app = test_app();
    let resort = fixtures::resort("Blue Lagoon", 1000);
    app.store.seed_resort(resort.clone());
    app.store.seed_coupon(fixtures::percentage_coupon("SAVE10", 10));

    // Monday and Tuesday nights at the base rate.
    let response = app
        .server
        .get(&format!("/api/resorts/{}/quote", resort.id))
        .add_query_param("check_in", "2025-06-02")
        .add_query_param("check_out", "2025-06-04")
        .add_query_param("coupon", "SAVE10")
        .await;
    response.assert_status(StatusCode::OK);
    let breakdown: Value = response.json();
    assert_eq!(breakdown["base_price"], 2000);
    assert_eq!(breakdown["platform_fee"], 30);
    assert_eq!(breakdown["subtotal"], 2030);
    assert_eq!(breakdown["discount"], 203);
    assert_eq!(breakdown["total"], 1827);
}

#[tokio::test]
async fn booking_flow_returns_payment_instruction() {
    let app = test_app();
    let resort = fixtures::resort("Blue Lagoon", 1000);
    app.store.seed_resort(resort.clone());

    let response = app
        .server
        .post("/api/bookings")
        .json(&booking_body(&resort))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["booking"]["status"], "pending_payment");
    let reference = body["booking"]["reference"]
        .as_str()
        .expect("reference should be a string");
    assert!(reference.starts_with("RB-"));
    assert_eq!(body["payment"]["payee"], TEST_PAYEE);
    let url = body["payment"]["payment_url"]
        .as_str()
        .expect("payment url should be a string");
    assert!(url.starts_with("upi://pay?pa=lagoon@upi&pn=Lagoon%20Resorts&am=2030&cu=INR&tn=RB-"));

    assert_eq!(app.bus.published_of_type("booking.created").len(), 1);
}

#[tokio::test]
async fn admission_rejections_surface_their_codes() {
    let app = test_app();
    let resort = fixtures::resort("Blue Lagoon", 1000);
    app.store.seed_resort(resort.clone());

    // Fill the pending cap for the date.
    for _ in 0..2 {
        let response = app
            .server
            .post("/api/bookings")
            .json(&booking_body(&resort))
            .await;
        response.assert_status(StatusCode::CREATED);
    }

    let response = app
        .server
        .post("/api/bookings")
        .json(&booking_body(&resort))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "PENDING_LIMIT_EXCEEDED");

    // Past check-in is a validation failure, not a conflict.
    let mut past = booking_body(&resort);
    past["check_in"] = json!("2024-12-01");
    past["check_out"] = json!("2024-12-02");
    let response = app.server.post("/api/bookings").json(&past).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_DATE_RANGE");
}

#[tokio::test]
async fn blocked_dates_reject_admission() {
    let app = test_app();
    let resort = fixtures::resort("Blue Lagoon", 1000);
    app.store.seed_resort(resort.clone());

    let response = app
        .server
        .post(&format!("/api/resorts/{}/blocked-dates", resort.id))
        .json(&json!({"date": "2025-06-01", "source": "admin"}))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = app
        .server
        .post("/api/bookings")
        .json(&booking_body(&resort))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "DATE_BLOCKED");

    // Lifting the block reopens the date.
    let response = app
        .server
        .delete(&format!("/api/resorts/{}/blocked-dates", resort.id))
        .add_query_param("date", "2025-06-01")
        .add_query_param("source", "admin")
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = app
        .server
        .post("/api/bookings")
        .json(&booking_body(&resort))
        .await;
    response.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn payment_lifecycle_over_http() {
    let app = test_app();
    let resort = fixtures::resort("Blue Lagoon", 1000);
    app.store.seed_resort(resort.clone());

    let response = app
        .server
        .post("/api/bookings")
        .json(&booking_body(&resort))
        .await;
    let body: Value = response.json();
    let booking_id = body["booking"]["id"].as_str().expect("id").to_string();

    let response = app
        .server
        .post(&format!("/api/bookings/{booking_id}/payment-proof"))
        .json(&json!({"transaction_id": "TXN-001", "card_last_four": null}))
        .await;
    response.assert_status(StatusCode::OK);
    let booking: Booking = response.json();
    assert_eq!(booking.status.as_str(), "pending_verification");

    let response = app
        .server
        .post(&format!("/api/bookings/{booking_id}/mark-paid"))
        .await;
    response.assert_status(StatusCode::OK);
    let booking: Booking = response.json();
    assert_eq!(booking.status.as_str(), "confirmed");
    assert_eq!(booking.payment_status.as_str(), "paid");

    assert_eq!(app.bus.published_of_type("payment.updated").len(), 2);

    let response = app
        .server
        .post(&format!("/api/bookings/{booking_id}/cancel"))
        .await;
    response.assert_status(StatusCode::OK);
    let booking: Booking = response.json();
    assert_eq!(booking.status.as_str(), "cancelled");
    assert_eq!(app.bus.published_of_type("booking.updated").len(), 1);
}

#[tokio::test]
async fn coupon_admin_over_http() {
    let app = test_app();

    let response = app
        .server
        .post("/api/coupons")
        .json(&json!({"code": "SAVE10", "kind": "percentage", "value": 10}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let coupon: Coupon = response.json();
    assert_eq!(coupon.code.as_str(), "SAVE10");

    // Out-of-range percentage is rejected before it reaches the store.
    let response = app
        .server
        .post("/api/coupons")
        .json(&json!({"code": "TOOMUCH", "kind": "percentage", "value": 150}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = app.server.delete("/api/coupons/SAVE10").await;
    response.assert_status(StatusCode::NO_CONTENT);
    assert_eq!(app.bus.published_of_type("coupon.deleted").len(), 1);

    let response = app.server.delete("/api/coupons/SAVE10").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_event_channels_are_rejected() {
    let app = test_app();
    let response = app
        .server
        .get("/api/events")
        .add_query_param("channels", "mystery-events")
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}
