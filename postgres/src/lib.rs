//! PostgreSQL persistence for the Lagoon booking platform.
//!
//! Implements the [`BookingStore`](lagoon_core::store::BookingStore) trait
//! over a `sqlx` connection pool. The store is the single source of truth:
//! the broker and the gateway listener sets are caches of recent facts that
//! any consumer can rebuild from a full poll against these tables.
//!
//! Two things matter here beyond plain CRUD:
//!
//! - **Admission serialization**: the guarded booking insert takes a
//!   per-(resort, check-in date) advisory lock inside its transaction, so
//!   two racing admissions for the same date cannot both pass the pending
//!   cap. See [`store::PostgresBookingStore`].
//! - **Versioned migrations**: the schema is applied once at startup from
//!   an ordered migration list with a `schema_migrations` version table,
//!   never probed into existence by ignoring `ALTER` failures. See
//!   [`migrations::run_migrations`].

pub mod migrations;
pub mod store;

pub use migrations::run_migrations;
pub use store::PostgresBookingStore;
