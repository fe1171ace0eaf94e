//! # Lagoon Testing
//!
//! Testing utilities and in-memory fakes for the Lagoon booking platform.
//!
//! This crate provides:
//! - Deterministic clocks
//! - An in-memory [`BookingStore`](lagoon_core::store::BookingStore) with the
//!   same serialization contract as the Postgres implementation
//! - A recording event bus and a bus that always fails
//! - Domain fixtures and a fully wired controller harness
//!
//! ## Example
//!
//! ```ignore
//! use lagoon_testing::fixtures::{booking_request, date, harness, resort};
//!
//! #[tokio::test]
//! async fn test_booking_flow() {
//!     let h = harness();
//!     let pearl = resort("Pearl Cove", 1000);
//!     h.store.seed_resort(pearl.clone());
//!
//!     let admitted = h
//!         .controller
//!         .admit(booking_request(pearl.id, date(2025, 3, 10), date(2025, 3, 12)))
//!         .await
//!         .unwrap();
//!     assert_eq!(admitted.booking.total_price, lagoon_core::types::Money::new(2030));
//! }
//! ```

use chrono::{DateTime, Utc};
use lagoon_core::environment::Clock;

pub mod fixtures;
pub mod memory_bus;
pub mod memory_store;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible. Admission
    /// resolves "today" through the clock, so pinning it pins the calendar.
    ///
    /// # Example
    ///
    /// ```
    /// use lagoon_testing::mocks::FixedClock;
    /// use lagoon_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use memory_bus::{FailingEventBus, InMemoryEventBus};
pub use memory_store::InMemoryBookingStore;
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }
}
