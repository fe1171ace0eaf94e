//! In-memory event buses: one that records and fans out, one that always
//! fails. The failing bus exists to prove the publish path never takes a
//! request down with it.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use async_stream::stream;
use lagoon_core::channel::Channel;
use lagoon_core::event::DomainEvent;
use lagoon_core::event_bus::{EventBus, EventBusError, EventStream};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Recording event bus backed by a tokio broadcast channel.
///
/// Publishes are captured for assertions and fanned out to any live
/// subscriber streams, so the same fake drives both publisher tests and
/// consumer tests.
#[derive(Clone)]
pub struct InMemoryEventBus {
    published: Arc<Mutex<Vec<DomainEvent>>>,
    sender: broadcast::Sender<DomainEvent>,
}

impl InMemoryEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            sender,
        }
    }

    /// Every event published so far, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<DomainEvent> {
        self.published.lock().unwrap().clone()
    }

    /// Published events carrying the given type tag.
    #[must_use]
    pub fn published_of_type(&self, event_type: &str) -> Vec<DomainEvent> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Forget recorded events (for test isolation).
    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        event: &DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let event = event.clone();
        Box::pin(async move {
            self.published.lock().unwrap().push(event.clone());
            // No receiver just means nobody subscribed yet.
            let _ = self.sender.send(event);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        channels: &[Channel],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let channels = channels.to_vec();
        let mut receiver = self.sender.subscribe();
        Box::pin(async move {
            let events = stream! {
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            if channels.contains(&event.channel()) {
                                yield Ok(event);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };
            Ok(Box::pin(events) as EventStream)
        })
    }
}

/// Bus whose operations always fail, simulating an unreachable broker.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingEventBus;

impl EventBus for FailingEventBus {
    fn publish(
        &self,
        event: &DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let channel = event.channel().as_str().to_string();
        Box::pin(async move {
            Err(EventBusError::PublishFailed {
                channel,
                reason: "synthetic broker outage".to_string(),
            })
        })
    }

    fn subscribe(
        &self,
        channels: &[Channel],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let channels = channels.iter().map(|c| c.as_str().to_string()).collect();
        Box::pin(async move {
            Err(EventBusError::SubscriptionFailed {
                channels,
                reason: "synthetic broker outage".to_string(),
            })
        })
    }
}
