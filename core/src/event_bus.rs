//! Event bus abstraction over the external publish/subscribe broker.
//!
//! The trait is object-safe (boxed futures) so the web process can hold a
//! `dyn EventBus` wired to Redpanda in production and to an in-memory bus in
//! tests. Delivery is best-effort: at-most-once on the publish side (a
//! failed publish is logged and dropped by [`crate::event::EventPublisher`])
//! and at-least-once on the subscribe side (offsets commit after forward).

use crate::channel::Channel;
use crate::event::DomainEvent;
use futures::stream::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from broker interactions.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Could not reach the broker at all.
    #[error("broker connection failed: {0}")]
    ConnectionFailed(String),

    /// A publish did not complete within its timeout.
    #[error("publish to {channel} failed: {reason}")]
    PublishFailed {
        /// Target channel topic.
        channel: String,
        /// Broker-reported reason.
        reason: String,
    },

    /// Subscribing to one or more channels failed.
    #[error("subscription to {channels:?} failed: {reason}")]
    SubscriptionFailed {
        /// Requested channel topics.
        channels: Vec<String>,
        /// Broker-reported reason.
        reason: String,
    },

    /// An inbound message could not be decoded as a [`DomainEvent`].
    #[error("event deserialization failed: {0}")]
    Deserialization(String),

    /// Event could not be encoded for the wire.
    #[error("event serialization failed: {0}")]
    Serialization(String),

    /// Anything else the transport reports.
    #[error("broker transport error: {0}")]
    Transport(String),
}

/// Stream of inbound domain events from subscribed channels.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<DomainEvent, EventBusError>> + Send>>;

/// Publish/subscribe boundary to the broker.
///
/// Implementations route each event to the channel derived from its type tag
/// (see [`Channel::for_event_type`]) and enforce short timeouts so a dead
/// broker degrades to lost events, never to blocked callers.
pub trait EventBus: Send + Sync {
    /// Publish one event to its channel.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError`] when the event cannot be encoded or the
    /// broker rejects or times out the send.
    fn publish(
        &self,
        event: &DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to a set of channels, yielding every subsequent event.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError`] when the consumer cannot be created or the
    /// subscription is rejected.
    fn subscribe(
        &self,
        channels: &[Channel],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
