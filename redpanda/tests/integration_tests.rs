//! Integration tests for [`RedpandaEventBus`] against a live broker.
//!
//! Marked `#[ignore]` because they need a reachable Kafka-compatible broker
//! (set `LAGOON_TEST_BROKERS`, default `localhost:9092`) and take seconds to
//! rebalance consumer groups. Run explicitly:
//!
//! ```bash
//! cargo test -p lagoon-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use futures::StreamExt;
use lagoon_core::channel::Channel;
use lagoon_core::event::DomainEvent;
use lagoon_core::event_bus::EventBus;
use lagoon_redpanda::RedpandaEventBus;
use serde_json::json;
use std::time::Duration;

fn brokers() -> String {
    std::env::var("LAGOON_TEST_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string())
}

fn unique_group(prefix: &str) -> String {
    format!("{prefix}-{}", uuid_like())
}

fn uuid_like() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_nanos()
}

#[tokio::test]
#[ignore = "requires a running Kafka-compatible broker"]
async fn publish_subscribe_roundtrip() {
    let bus = RedpandaEventBus::builder()
        .brokers(brokers())
        .consumer_group(unique_group("lagoon-it-roundtrip"))
        .auto_offset_reset("earliest")
        .build()
        .expect("bus should build");

    let mut stream = bus
        .subscribe(&[Channel::Booking])
        .await
        .expect("subscription should succeed");

    // Give the consumer group a moment to finish joining before publishing.
    tokio::time::sleep(Duration::from_secs(3)).await;

    let marker = uuid_like().to_string();
    let event = DomainEvent::new(
        "booking.created",
        json!({"marker": marker}),
        chrono::Utc::now(),
    );
    bus.publish(&event).await.expect("publish should succeed");

    let received = tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(result) = stream.next().await {
            if let Ok(event) = result {
                if event.data["marker"] == marker.as_str() {
                    return event;
                }
            }
        }
        panic!("stream ended before the marker event arrived");
    })
    .await
    .expect("event should arrive within the timeout");

    assert_eq!(received.event_type, "booking.created");
    assert_eq!(received.channel(), Channel::Booking);
}

#[tokio::test]
#[ignore = "requires a running Kafka-compatible broker"]
async fn payment_events_ride_the_booking_channel() {
    let bus = RedpandaEventBus::builder()
        .brokers(brokers())
        .consumer_group(unique_group("lagoon-it-payment"))
        .auto_offset_reset("earliest")
        .build()
        .expect("bus should build");

    let mut stream = bus
        .subscribe(&[Channel::Booking])
        .await
        .expect("subscription should succeed");
    tokio::time::sleep(Duration::from_secs(3)).await;

    let marker = uuid_like().to_string();
    let event = DomainEvent::new(
        "payment.updated",
        json!({"marker": marker}),
        chrono::Utc::now(),
    );
    bus.publish(&event).await.expect("publish should succeed");

    let received = tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(result) = stream.next().await {
            if let Ok(event) = result {
                if event.data["marker"] == marker.as_str() {
                    return event;
                }
            }
        }
        panic!("stream ended before the marker event arrived");
    })
    .await
    .expect("event should arrive within the timeout");

    assert_eq!(received.event_type, "payment.updated");
}
