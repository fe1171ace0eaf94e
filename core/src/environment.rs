//! Injected dependencies shared across components.
//!
//! Admission decisions depend on "today", so time is a trait rather than a
//! call to [`Utc::now`] scattered through the logic. Production wires in
//! [`SystemClock`]; tests pin the calendar with the fixed clock from
//! `lagoon-testing`.

use chrono::{DateTime, Utc};

/// Clock abstraction for testable time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
