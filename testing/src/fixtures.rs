//! Ready-made domain fixtures and a wired controller harness.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use crate::memory_bus::InMemoryEventBus;
use crate::memory_store::InMemoryBookingStore;
use crate::mocks::test_clock;
use chrono::NaiveDate;
use lagoon_core::admission::{AdmissionController, BookingRequest};
use lagoon_core::environment::Clock;
use lagoon_core::event::EventPublisher;
use lagoon_core::event_bus::EventBus;
use lagoon_core::types::{
    Coupon, CouponCode, CouponDayType, DiscountKind, Money, Resort, ResortId,
};
use std::sync::Arc;

/// Payee identifier used by test controllers.
pub const TEST_PAYEE: &str = "lagoon@upi";

/// Calendar date literal.
#[must_use]
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A bookable resort with the given nightly base rate.
#[must_use]
pub fn resort(name: &str, base_price: u64) -> Resort {
    Resort {
        id: ResortId::new(),
        name: name.to_string(),
        location: "Rushikonda Beach".to_string(),
        base_price: Money::new(base_price),
        available: true,
        max_guests: 4,
        display_rank: 0,
        created_at: test_clock().now(),
    }
}

/// An unrestricted percentage coupon.
#[must_use]
pub fn percentage_coupon(code: &str, percent: u64) -> Coupon {
    Coupon {
        code: CouponCode::new(code),
        kind: DiscountKind::Percentage,
        value: percent,
        day_type: CouponDayType::All,
        resort_id: None,
        created_at: test_clock().now(),
    }
}

/// A reservation request for a stay, with plausible guest details filled in.
#[must_use]
pub fn booking_request(
    resort_id: ResortId,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> BookingRequest {
    BookingRequest {
        resort_id,
        guest_name: "Asha Rao".to_string(),
        guest_email: "asha@example.com".to_string(),
        guest_phone: "9876543210".to_string(),
        check_in,
        check_out,
        guests: 2,
        coupon_code: None,
        transaction_reference: None,
    }
}

/// Everything a controller test needs: the controller plus handles to the
/// store and the recording bus behind it.
pub struct TestHarness {
    /// Controller under test, on the fixed test clock.
    pub controller: AdmissionController,
    /// Backing store, for seeding and inspection.
    pub store: Arc<InMemoryBookingStore>,
    /// Recording bus, for event assertions.
    pub bus: Arc<InMemoryEventBus>,
}

/// Wire a controller to fresh in-memory collaborators on the fixed clock
/// (2025-01-01, so any 2025 date after January 1st is "future").
#[must_use]
pub fn harness() -> TestHarness {
    let clock: Arc<dyn Clock> = Arc::new(test_clock());
    let store = Arc::new(InMemoryBookingStore::with_clock(clock.clone()));
    let bus = Arc::new(InMemoryEventBus::new());
    let publisher = EventPublisher::new(bus.clone(), clock.clone());
    let controller = AdmissionController::new(store.clone(), publisher, clock, TEST_PAYEE);
    TestHarness {
        controller,
        store,
        bus,
    }
}

/// Harness variant whose publishes always fail, for resilience tests.
#[must_use]
pub fn harness_with_bus(bus: Arc<dyn EventBus>) -> (AdmissionController, Arc<InMemoryBookingStore>) {
    let clock: Arc<dyn Clock> = Arc::new(test_clock());
    let store = Arc::new(InMemoryBookingStore::with_clock(clock.clone()));
    let publisher = EventPublisher::new(bus, clock.clone());
    let controller = AdmissionController::new(store.clone(), publisher, clock, TEST_PAYEE);
    (controller, store)
}
