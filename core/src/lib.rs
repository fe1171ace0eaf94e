//! # Lagoon Core
//!
//! Domain model and admission-control engine for the Lagoon resort booking
//! platform, plus the event fabric that keeps every front end in sync.
//!
//! ## What lives here
//!
//! - **Domain types**: resorts, bookings, coupons, pricing rules, payment
//!   proofs, and the newtype identifiers that tie them together.
//! - **Pricing**: day-type classification of the check-in date and the
//!   nightly-rate resolution that feeds the price breakdown.
//! - **Admission**: the ordered precondition pipeline that decides whether a
//!   reservation may be admitted, and the shared contention check every
//!   store implementation must run inside its serialization scope.
//! - **Events**: the `DomainEvent` wire envelope, the total prefix-to-channel
//!   routing map, and an [`event::EventPublisher`] that never fails its
//!   caller when the broker is down.
//! - **Boundaries**: the [`store::BookingStore`] and [`event_bus::EventBus`]
//!   traits implemented by the `lagoon-postgres` and `lagoon-redpanda`
//!   crates, and the [`environment::Clock`] abstraction that keeps the
//!   calendar testable.
//!
//! ## Design principles
//!
//! - Business decisions are pure functions; I/O happens behind traits.
//! - Dependencies are injected, never reached for as process globals.
//! - Admission rejections are typed values, not exceptions; infrastructure
//!   failures degrade (an event may be lost) but never corrupt a booking.

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};

pub mod admission;
pub mod channel;
pub mod coupon;
pub mod environment;
pub mod event;
pub mod event_bus;
pub mod pricing;
pub mod store;
pub mod types;
