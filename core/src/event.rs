//! Domain events and the publisher that hands them to the broker.
//!
//! A [`DomainEvent`] is a transient wire message (never persisted): a typed
//! fact about a completed state change, carried as JSON so every consumer of
//! the live-update stream can read it without a schema registry. The frame
//! shape on the wire is exactly `{"type": …, "data": …, "timestamp": …}`
//! with the timestamp in epoch milliseconds.

use crate::channel::Channel;
use crate::environment::Clock;
use crate::event_bus::EventBus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Event type tags emitted by this core. Sibling services publish further
/// `food.*` and `travel.*` tags over the same fabric.
pub mod kinds {
    /// A booking was admitted.
    pub const BOOKING_CREATED: &str = "booking.created";
    /// A booking changed state (e.g. cancelled).
    pub const BOOKING_UPDATED: &str = "booking.updated";
    /// A payment proof was submitted or reconciled.
    pub const PAYMENT_UPDATED: &str = "payment.updated";
    /// A resort was created.
    pub const RESORT_CREATED: &str = "resort.created";
    /// A resort was edited, disabled, or had its calendar blocks changed.
    pub const RESORT_UPDATED: &str = "resort.updated";
    /// A resort was removed.
    pub const RESORT_DELETED: &str = "resort.deleted";
    /// A coupon was created.
    pub const COUPON_CREATED: &str = "coupon.created";
    /// A coupon was deleted.
    pub const COUPON_DELETED: &str = "coupon.deleted";
}

/// A typed fact about a completed state change, as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Dotted type tag, e.g. `booking.created`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data: serde_json::Value,
    /// Server time of the fact, epoch milliseconds.
    pub timestamp: i64,
}

impl DomainEvent {
    /// Build an event stamped with the given server time.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: serde_json::Value, at: DateTime<Utc>) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: at.timestamp_millis(),
        }
    }

    /// The broker channel this event rides, derived from its type tag.
    #[must_use]
    pub fn channel(&self) -> Channel {
        Channel::for_event_type(&self.event_type)
    }

    /// Encode the wire frame.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the payload cannot be encoded
    /// (practically unreachable for `Value` payloads, but propagated rather
    /// than swallowed).
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a wire frame.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] when the frame is not a well-formed
    /// event.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

/// Publishes domain events without ever failing the caller.
///
/// The broker is a cache of recent facts, not a source of truth; when it is
/// unreachable the event is logged and dropped (consumers recover via their
/// fallback poll), and the triggering request still succeeds.
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
}

impl EventPublisher {
    /// Wire a publisher to a broker adapter and clock.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self { bus, clock }
    }

    /// Publish a fact. Infallible by contract: broker failures are logged,
    /// counted, and swallowed.
    pub async fn publish(&self, event_type: &str, data: serde_json::Value) {
        let event = DomainEvent::new(event_type, data, self.clock.now());
        let channel = event.channel();
        match self.bus.publish(&event).await {
            Ok(()) => {
                metrics::counter!("lagoon_events_published_total").increment(1);
                tracing::debug!(
                    event_type,
                    channel = channel.as_str(),
                    "published domain event"
                );
            }
            Err(error) => {
                metrics::counter!("lagoon_events_dropped_total").increment(1);
                tracing::warn!(
                    event_type,
                    channel = channel.as_str(),
                    %error,
                    "event publish failed; continuing without fan-out"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::SystemClock;
    use crate::event_bus::{EventBusError, EventStream};
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    #[test]
    fn frame_shape_matches_the_wire_contract() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let event = DomainEvent::new(
            kinds::BOOKING_CREATED,
            json!({"booking_id": "abc"}),
            at,
        );
        let frame = event.to_frame().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "booking.created");
        assert_eq!(value["data"]["booking_id"], "abc");
        assert_eq!(value["timestamp"], 1_700_000_000_000i64);

        let decoded = DomainEvent::from_frame(&frame).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn events_derive_their_channel() {
        let at = Utc::now();
        let event = DomainEvent::new(kinds::PAYMENT_UPDATED, json!({}), at);
        assert_eq!(event.channel(), Channel::Booking);
    }

    struct RecordingBus {
        published: Mutex<Vec<DomainEvent>>,
        fail: bool,
    }

    impl EventBus for RecordingBus {
        fn publish(
            &self,
            event: &DomainEvent,
        ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
            let event = event.clone();
            Box::pin(async move {
                if self.fail {
                    return Err(EventBusError::ConnectionFailed("broker down".into()));
                }
                self.published.lock().unwrap().push(event);
                Ok(())
            })
        }

        fn subscribe(
            &self,
            _channels: &[Channel],
        ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
            Box::pin(async { Err(EventBusError::ConnectionFailed("not wired".into())) })
        }
    }

    #[tokio::test]
    async fn publisher_forwards_to_the_bus() {
        let bus = Arc::new(RecordingBus {
            published: Mutex::new(Vec::new()),
            fail: false,
        });
        let publisher = EventPublisher::new(bus.clone(), Arc::new(SystemClock));

        publisher
            .publish(kinds::RESORT_CREATED, json!({"name": "Cove"}))
            .await;

        let published = bus.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_type, "resort.created");
    }

    #[tokio::test]
    async fn publisher_swallows_broker_failures() {
        let bus = Arc::new(RecordingBus {
            published: Mutex::new(Vec::new()),
            fail: true,
        });
        let publisher = EventPublisher::new(bus, Arc::new(SystemClock));

        // Must complete without panicking or returning an error.
        publisher.publish(kinds::BOOKING_CREATED, json!({})).await;
    }
}
