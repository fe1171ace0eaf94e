//! Application state shared across HTTP handlers.
//!
//! Everything is constructed once in `main` and injected here; handlers
//! never reach for process-wide singletons.

use crate::hub::EventHub;
use lagoon_core::admission::AdmissionController;
use lagoon_core::event::EventPublisher;
use lagoon_core::store::BookingStore;
use std::sync::Arc;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Persistence handle, used directly by read and admin handlers.
    pub store: Arc<dyn BookingStore>,
    /// Admission pipeline for quotes, bookings, and payment operations.
    pub controller: AdmissionController,
    /// Publisher for resort and coupon facts emitted by admin handlers.
    pub publisher: EventPublisher,
    /// Live-update fan-out hub backing the SSE endpoint.
    pub hub: Arc<EventHub>,
}

impl AppState {
    /// Assemble the handler state.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        controller: AdmissionController,
        publisher: EventPublisher,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            store,
            controller,
            publisher,
            hub,
        }
    }
}
