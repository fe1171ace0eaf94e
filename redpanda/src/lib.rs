//! Redpanda adapter for the Lagoon event fabric.
//!
//! Implements the [`EventBus`] trait from `lagoon-core` over the Kafka wire
//! protocol via rdkafka, so any Kafka-compatible broker (Redpanda, Apache
//! Kafka, a managed service) can carry the platform's domain events. Each
//! [`Channel`](lagoon_core::channel::Channel) maps to one topic; the payload
//! is the JSON wire frame every live-update consumer already reads, so no
//! schema registry sits between the publisher and the front ends.
//!
//! # Delivery semantics
//!
//! - **Publish**: at-most-once with a short, enforced send timeout. The
//!   [`EventPublisher`](lagoon_core::event::EventPublisher) above this
//!   adapter swallows failures; a dead broker degrades to lost events and
//!   the fallback poll, never to blocked admission requests.
//! - **Subscribe**: at-least-once with manual commits. Offsets commit only
//!   after an event has been handed to the subscriber's channel, so a crash
//!   redelivers rather than drops; gateway consumers are idempotent (they
//!   trigger coarse refetches, so a duplicate frame is harmless).
//!
//! # Example
//!
//! ```no_run
//! use lagoon_redpanda::RedpandaEventBus;
//! use lagoon_core::channel::Channel;
//! use lagoon_core::event_bus::EventBus;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = RedpandaEventBus::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("lagoon-web")
//!     .build()?;
//!
//! let mut stream = bus.subscribe(&Channel::ALL).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(event) => println!("received {}", event.event_type),
//!         Err(e) => eprintln!("stream error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use lagoon_core::channel::Channel;
use lagoon_core::event::DomainEvent;
use lagoon_core::event_bus::{EventBus, EventBusError, EventStream};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Redpanda-backed [`EventBus`].
///
/// One producer is shared by every publish; each subscription creates its
/// own consumer so independent gateways can join separate consumer groups.
pub struct RedpandaEventBus {
    producer: FutureProducer,
    brokers: String,
    send_timeout: Duration,
    consumer_group: Option<String>,
    buffer_size: usize,
    auto_offset_reset: String,
}

impl RedpandaEventBus {
    /// Connect with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] when the producer cannot
    /// be created from the broker list.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Start configuring a bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// The configured broker list.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for a [`RedpandaEventBus`].
#[derive(Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    send_timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaEventBusBuilder {
    /// Comma-separated broker addresses, e.g. `localhost:9092`.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Producer send timeout. A publish that cannot complete within this
    /// window fails (and is then dropped by the publisher above). Default:
    /// 3 seconds.
    #[must_use]
    pub const fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Consumer group for subscriptions. Every gateway process that should
    /// see every event needs its own group; left unset, a group name is
    /// derived from the subscribed channel list.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Events buffered between the consumer and the subscriber stream.
    /// Default: 1000.
    #[must_use]
    pub const fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Where a new consumer group starts reading: `"latest"` (default, the
    /// live-update case — history is recovered by polling, not replay) or
    /// `"earliest"`.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the bus.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] when brokers are missing
    /// or the producer cannot be created.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("brokers not configured".to_string()))?;
        let send_timeout = self.send_timeout.unwrap_or(Duration::from_secs(3));

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", send_timeout.as_millis().to_string())
            .set("acks", "1");

        let producer: FutureProducer = producer_config.create().map_err(|e| {
            EventBusError::ConnectionFailed(format!("failed to create producer: {e}"))
        })?;

        tracing::info!(
            brokers = %brokers,
            send_timeout_ms = send_timeout.as_millis(),
            buffer_size = self.buffer_size.unwrap_or(1000),
            auto_offset_reset = self.auto_offset_reset.as_deref().unwrap_or("latest"),
            "redpanda event bus created"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            send_timeout,
            consumer_group: self.consumer_group,
            buffer_size: self.buffer_size.unwrap_or(1000),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "latest".to_string()),
        })
    }
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        event: &DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let event = event.clone();
        let timeout = self.send_timeout;

        Box::pin(async move {
            let channel = event.channel();
            let topic = channel.as_str();
            let frame = event
                .to_frame()
                .map_err(|e| EventBusError::Serialization(e.to_string()))?;

            // Keyed by event type so facts of one kind stay ordered within
            // their partition.
            let record = FutureRecord::to(topic)
                .payload(&frame)
                .key(event.event_type.as_bytes());

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic,
                        partition,
                        offset,
                        event_type = %event.event_type,
                        "event published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => Err(EventBusError::PublishFailed {
                    channel: topic.to_string(),
                    reason: kafka_error.to_string(),
                }),
            }
        })
    }

    fn subscribe(
        &self,
        channels: &[Channel],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = channels.iter().map(|c| c.as_str().to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group = self.consumer_group.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let group_id = consumer_group.unwrap_or_else(|| {
                let mut sorted = topics.clone();
                sorted.sort();
                format!("lagoon-{}", sorted.join("-"))
            });

            // Manual commits: the offset moves only after the event reached
            // the subscriber's channel.
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    channels: topics.clone(),
                    reason: format!("failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| EventBusError::SubscriptionFailed {
                    channels: topics.clone(),
                    reason: format!("failed to subscribe: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %group_id,
                buffer_size,
                "subscribed to broker channels"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();

                while let Some(msg_result) = stream.next().await {
                    match msg_result {
                        Ok(message) => {
                            let event_result = decode_message(&message);
                            if let Err(error) = &event_result {
                                metrics::counter!("lagoon_bus_decode_failures_total")
                                    .increment(1);
                                tracing::warn!(
                                    topic = message.topic(),
                                    offset = message.offset(),
                                    %error,
                                    "undecodable broker message"
                                );
                            }

                            // Commit only after the subscriber has the event;
                            // a crash before this point redelivers.
                            if tx.send(event_result).await.is_err() {
                                tracing::debug!("subscriber dropped, consumer task exiting");
                                break;
                            }
                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    topic = message.topic(),
                                    offset = message.offset(),
                                    error = %e,
                                    "offset commit failed; message may be redelivered"
                                );
                            }
                        }
                        Err(e) => {
                            let err = EventBusError::Transport(e.to_string());
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                        }
                    }
                }

                tracing::debug!("consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}

fn decode_message<M: Message>(message: &M) -> Result<DomainEvent, EventBusError> {
    let payload = message
        .payload()
        .ok_or_else(|| EventBusError::Deserialization("message has no payload".to_string()))?;
    let frame = std::str::from_utf8(payload)
        .map_err(|e| EventBusError::Deserialization(format!("payload is not UTF-8: {e}")))?;
    DomainEvent::from_frame(frame).map_err(|e| EventBusError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redpanda_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaEventBus>();
        assert_sync::<RedpandaEventBus>();
    }

    #[test]
    fn builder_requires_brokers() {
        let result = RedpandaEventBus::builder().build();
        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    #[test]
    fn derived_consumer_group_is_deterministic() {
        // The fallback group name sorts topics so the same channel set maps
        // to the same group regardless of subscription order.
        let mut a = vec!["resort-events".to_string(), "booking-events".to_string()];
        let mut b = vec!["booking-events".to_string(), "resort-events".to_string()];
        a.sort();
        b.sort();
        assert_eq!(format!("lagoon-{}", a.join("-")), format!("lagoon-{}", b.join("-")));
    }
}
