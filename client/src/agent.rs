//! The reconnection agent: stream consumption, linear back-off, and the
//! fallback poller.
//!
//! Dial discipline: on stream failure the agent retries with linear
//! back-off (`attempt × base_delay`, base 2 s) up to a bounded attempt
//! count, starting the fallback poller on the first failure. A successful
//! reconnect stops the poller and resets the attempt counter. Once the
//! attempt budget is spent the agent stops dialing entirely and the poller
//! is the sole survivor.

use futures::StreamExt;
use lagoon_core::event::DomainEvent;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Which local cache an event invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshScope {
    /// Bookings and their payment state.
    Bookings,
    /// The resort catalogue, rules and blocked dates included.
    Resorts,
    /// The coupon list.
    Coupons,
    /// Food orders, published by the food-ordering services.
    FoodOrders,
    /// Travel bookings, published by the travel-booking services.
    TravelBookings,
}

impl RefreshScope {
    /// Every scope, the granularity of a full poll.
    pub const ALL: [Self; 5] = [
        Self::Bookings,
        Self::Resorts,
        Self::Coupons,
        Self::FoodOrders,
        Self::TravelBookings,
    ];

    /// Classify an event type tag. Returns `None` for types no front end
    /// caches locally (including the `connected` acknowledgement).
    #[must_use]
    pub fn classify(event_type: &str) -> Option<Self> {
        if event_type.starts_with("booking.") || event_type.starts_with("payment.") {
            Some(Self::Bookings)
        } else if event_type.starts_with("resort.") {
            Some(Self::Resorts)
        } else if event_type.starts_with("coupon.") {
            Some(Self::Coupons)
        } else if event_type.starts_with("food.order.") {
            Some(Self::FoodOrders)
        } else if event_type.starts_with("travel.booking.") {
            Some(Self::TravelBookings)
        } else {
            None
        }
    }
}

/// The front end's re-fetch seam. Both paths go through it: the stream
/// path refreshes one scope per event, the poll path refreshes everything.
pub trait Refresher: Send + Sync {
    /// Re-fetch one scope's list from the platform.
    fn refresh(&self, scope: RefreshScope) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Full refresh, used by the fallback poller and on reconnect.
    fn refresh_all(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            for scope in RefreshScope::ALL {
                self.refresh(scope).await;
            }
        })
    }
}

/// Why a dial attempt ended.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The endpoint could not be reached or refused the stream.
    #[error("failed to connect to event stream: {0}")]
    Connect(String),

    /// The stream broke mid-flight.
    #[error("event stream failed: {0}")]
    Stream(String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Full URL of the SSE endpoint, channel filter included.
    pub events_url: String,
    /// Linear back-off unit; attempt N waits `N × base_delay`.
    pub base_delay: Duration,
    /// Dial attempts before the agent stops streaming for good.
    pub max_attempts: u32,
    /// Fallback poller interval.
    pub poll_interval: Duration,
}

impl AgentConfig {
    /// Configuration with the production dial discipline.
    #[must_use]
    pub fn new(events_url: impl Into<String>) -> Self {
        Self {
            events_url: events_url.into(),
            base_delay: Duration::from_secs(2),
            max_attempts: 5,
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// The per-front-end reconnection agent.
pub struct LiveUpdateAgent {
    config: AgentConfig,
    refresher: Arc<dyn Refresher>,
    client: reqwest::Client,
}

impl LiveUpdateAgent {
    /// Wire an agent to its refresher.
    #[must_use]
    pub fn new(config: AgentConfig, refresher: Arc<dyn Refresher>) -> Self {
        Self {
            config,
            refresher,
            client: reqwest::Client::new(),
        }
    }

    /// Run the agent until the task is aborted.
    ///
    /// Never returns under normal operation: either the stream loop or the
    /// fallback poller is always alive. When the attempt budget is spent
    /// the stream loop exits and the poller is left running as the sole
    /// survivor.
    pub async fn run(&self) {
        let mut attempt: u32 = 0;
        let mut poller: Option<tokio::task::JoinHandle<()>> = None;

        loop {
            match self.connect().await {
                Ok(response) => {
                    // Connected: the poller stops and the counter resets.
                    if let Some(handle) = poller.take() {
                        handle.abort();
                    }
                    attempt = 0;
                    // No replay on reconnect; a full refresh covers the gap.
                    self.refresher.refresh_all().await;
                    match self.consume(response).await {
                        Ok(()) => tracing::info!("event stream closed; reconnecting"),
                        Err(error) => tracing::warn!(%error, "event stream broke"),
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, attempt, "event stream dial failed");
                }
            }

            attempt += 1;
            if poller.is_none() {
                poller = Some(self.spawn_poller());
            }
            if attempt >= self.config.max_attempts {
                tracing::warn!(
                    attempts = attempt,
                    "attempt budget exhausted; relying on the fallback poll"
                );
                return;
            }
            tokio::time::sleep(self.config.base_delay * attempt).await;
        }
    }

    /// One dial attempt: connect, full-refresh, then consume frames until
    /// the stream breaks or ends.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Connect`] when the dial fails and
    /// [`AgentError::Stream`] when an open stream breaks.
    pub async fn stream_once(&self) -> Result<(), AgentError> {
        let response = self.connect().await?;
        self.refresher.refresh_all().await;
        self.consume(response).await
    }

    async fn connect(&self) -> Result<reqwest::Response, AgentError> {
        let response = self
            .client
            .get(&self.config.events_url)
            .send()
            .await
            .map_err(|e| AgentError::Connect(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AgentError::Connect(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        tracing::info!(url = %self.config.events_url, "event stream attached");
        metrics::counter!("lagoon_agent_connects_total").increment(1);
        Ok(response)
    }

    async fn consume(&self, response: reqwest::Response) -> Result<(), AgentError> {
        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk.map_err(|e| AgentError::Stream(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);
                self.handle_line(&line).await;
            }
        }
        Ok(())
    }

    /// Process one SSE line: data frames are classified and refreshed,
    /// comment heartbeats and blank separators are ignored.
    async fn handle_line(&self, line: &str) {
        let Some(payload) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))
        else {
            return;
        };
        match DomainEvent::from_frame(payload) {
            Ok(event) => {
                if let Some(scope) = RefreshScope::classify(&event.event_type) {
                    tracing::debug!(event_type = %event.event_type, ?scope, "refreshing");
                    self.refresher.refresh(scope).await;
                }
            }
            Err(error) => {
                tracing::warn!(%error, line, "undecodable frame ignored");
            }
        }
    }

    fn spawn_poller(&self) -> tokio::task::JoinHandle<()> {
        let refresher = self.refresher.clone();
        let interval = self.config.poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                tracing::debug!("fallback poll");
                metrics::counter!("lagoon_agent_polls_total").increment(1);
                refresher.refresh_all().await;
            }
        })
    }
}
