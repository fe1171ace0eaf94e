//! In-process fan-out hub for the live-update gateway.
//!
//! One bounded broadcast channel per broker channel. The bridge task pushes
//! every broker event in; each SSE connection holds receivers for the
//! channels it asked for. Attach and detach are O(1) (subscribe / drop), and
//! a slow listener only loses its own events: when its receiver lags past
//! the buffer the oldest entries are dropped for that receiver alone, never
//! for the other listeners and never by blocking the fan-out path.

use async_stream::stream;
use futures::stream::{BoxStream, select_all};
use lagoon_core::channel::Channel;
use lagoon_core::event::DomainEvent;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Default per-channel buffer size.
pub const DEFAULT_HUB_CAPACITY: usize = 1000;

/// Per-process listener registry. Shared behind an `Arc` between the bridge
/// task and the SSE handler; all methods take `&self`.
pub struct EventHub {
    senders: HashMap<Channel, broadcast::Sender<DomainEvent>>,
}

impl EventHub {
    /// Create a hub with `capacity` buffered events per channel.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let senders = Channel::ALL
            .iter()
            .map(|&channel| (channel, broadcast::channel(capacity).0))
            .collect();
        Self { senders }
    }

    /// Rebroadcast one event to the listeners of its channel. Publishing to
    /// a channel with no listeners is a no-op.
    pub fn publish(&self, event: &DomainEvent) {
        let channel = event.channel();
        if let Some(sender) = self.senders.get(&channel) {
            let delivered = sender.send(event.clone()).unwrap_or(0);
            metrics::counter!("lagoon_hub_events_total", "channel" => channel.as_str())
                .increment(1);
            tracing::trace!(
                event_type = %event.event_type,
                channel = channel.as_str(),
                listeners = delivered,
                "hub fan-out"
            );
        }
    }

    /// Attach a listener to the given channels, merged into one stream.
    ///
    /// The listener detaches by dropping the stream. A listener that falls
    /// more than the buffer size behind skips the overwritten events and
    /// keeps going; gap recovery is the consumer's fallback poll.
    #[must_use]
    pub fn subscribe(&self, channels: &[Channel]) -> BoxStream<'static, DomainEvent> {
        let mut streams: Vec<BoxStream<'static, DomainEvent>> = Vec::new();
        for &channel in channels {
            let Some(sender) = self.senders.get(&channel) else {
                continue;
            };
            let mut rx = sender.subscribe();
            streams.push(Box::pin(stream! {
                loop {
                    match rx.recv().await {
                        Ok(event) => yield event,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            metrics::counter!(
                                "lagoon_hub_lagged_drops_total",
                                "channel" => channel.as_str()
                            )
                            .increment(skipped);
                            tracing::warn!(
                                channel = channel.as_str(),
                                skipped,
                                "slow listener skipped events"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }
        Box::pin(select_all(streams))
    }

    /// Current listener count for one channel.
    #[must_use]
    pub fn listener_count(&self, channel: Channel) -> usize {
        self.senders
            .get(&channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::time::Duration;

    fn event(event_type: &str) -> DomainEvent {
        DomainEvent::new(event_type, json!({}), chrono::Utc::now())
    }

    #[test]
    fn publish_without_listeners_is_a_noop() {
        let hub = EventHub::default();
        hub.publish(&event("booking.created"));
        assert_eq!(hub.listener_count(Channel::Booking), 0);
    }

    #[tokio::test]
    async fn listeners_only_see_their_channels() {
        let hub = EventHub::default();
        let mut bookings = hub.subscribe(&[Channel::Booking]);

        hub.publish(&event("resort.updated"));
        hub.publish(&event("booking.created"));

        let received = tokio::time::timeout(Duration::from_secs(1), bookings.next())
            .await
            .expect("event should arrive")
            .expect("stream should be open");
        assert_eq!(received.event_type, "booking.created");
    }

    #[tokio::test]
    async fn payment_events_reach_booking_listeners() {
        let hub = EventHub::default();
        let mut stream = hub.subscribe(&[Channel::Booking]);

        hub.publish(&event("payment.updated"));

        let received = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("event should arrive")
            .expect("stream should be open");
        assert_eq!(received.event_type, "payment.updated");
    }

    #[tokio::test]
    async fn fan_out_reaches_every_listener() {
        let hub = EventHub::default();
        let mut first = hub.subscribe(&[Channel::Resort]);
        let mut second = hub.subscribe(&[Channel::Resort]);
        assert_eq!(hub.listener_count(Channel::Resort), 2);

        hub.publish(&event("resort.created"));

        for stream in [&mut first, &mut second] {
            let received = tokio::time::timeout(Duration::from_secs(1), stream.next())
                .await
                .expect("event should arrive")
                .expect("stream should be open");
            assert_eq!(received.event_type, "resort.created");
        }
    }

    #[tokio::test]
    async fn detach_does_not_perturb_other_listeners() {
        let hub = EventHub::default();
        let dropped = hub.subscribe(&[Channel::Coupon]);
        let mut kept = hub.subscribe(&[Channel::Coupon]);
        drop(dropped);

        hub.publish(&event("coupon.created"));

        let received = tokio::time::timeout(Duration::from_secs(1), kept.next())
            .await
            .expect("event should arrive")
            .expect("stream should be open");
        assert_eq!(received.event_type, "coupon.created");
        assert_eq!(hub.listener_count(Channel::Coupon), 1);
    }

    #[tokio::test]
    async fn merged_subscription_spans_channels() {
        let hub = EventHub::default();
        let mut stream = hub.subscribe(&[Channel::Booking, Channel::Resort]);

        hub.publish(&event("booking.created"));
        hub.publish(&event("resort.updated"));

        let mut seen = Vec::new();
        for _ in 0..2 {
            let received = tokio::time::timeout(Duration::from_secs(1), stream.next())
                .await
                .expect("event should arrive")
                .expect("stream should be open");
            seen.push(received.event_type);
        }
        seen.sort();
        assert_eq!(seen, vec!["booking.created", "resort.updated"]);
    }
}
