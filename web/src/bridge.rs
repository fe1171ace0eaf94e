//! Broker bridge: one consumer per process that subscribes to every channel
//! and rebroadcasts into the local [`EventHub`].
//!
//! The bridge never gives up. A broken subscription is logged and re-created
//! after a delay; while it is down the process keeps serving requests and
//! SSE consumers fall back to polling for gaps.

use crate::hub::EventHub;
use futures::StreamExt;
use lagoon_core::channel::Channel;
use lagoon_core::event_bus::EventBus;
use std::sync::Arc;
use std::time::Duration;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Run the bridge until the task is aborted.
pub async fn run_bridge(bus: Arc<dyn EventBus>, hub: Arc<EventHub>) {
    loop {
        match bus.subscribe(&Channel::ALL).await {
            Ok(mut stream) => {
                tracing::info!("broker bridge subscribed to all channels");
                while let Some(result) = stream.next().await {
                    match result {
                        Ok(event) => hub.publish(&event),
                        Err(error) => {
                            metrics::counter!("lagoon_bridge_stream_errors_total").increment(1);
                            tracing::warn!(%error, "broker bridge stream error; skipping frame");
                        }
                    }
                }
                tracing::warn!("broker bridge stream ended; resubscribing");
            }
            Err(error) => {
                tracing::warn!(%error, "broker bridge subscription failed; retrying");
            }
        }
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use futures::StreamExt;
    use lagoon_testing::InMemoryEventBus;
    use serde_json::json;

    #[tokio::test]
    async fn bridge_forwards_broker_events_into_the_hub() {
        let bus = Arc::new(InMemoryEventBus::new());
        let hub = Arc::new(EventHub::default());
        let mut listener = hub.subscribe(&[Channel::Booking]);

        let bridge = tokio::spawn(run_bridge(bus.clone(), hub.clone()));
        // Let the bridge attach before publishing.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let event = lagoon_core::event::DomainEvent::new(
            "booking.created",
            json!({"id": "b-1"}),
            chrono::Utc::now(),
        );
        use lagoon_core::event_bus::EventBus as _;
        bus.publish(&event).await.expect("publish should succeed");

        let received = tokio::time::timeout(Duration::from_secs(1), listener.next())
            .await
            .expect("event should arrive")
            .expect("stream should be open");
        assert_eq!(received.event_type, "booking.created");

        bridge.abort();
    }
}
