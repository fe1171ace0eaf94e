//! The SSE live-update endpoint.
//!
//! Each connection is one hub listener: an immediate `connected`
//! acknowledgement frame, then every broker event on the subscribed
//! channels as its own frame, plus SSE comment heartbeats (~15s) so
//! half-open connections are detected. There is no replay: a reconnecting
//! consumer re-polls to recover whatever it missed.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use async_stream::stream;
use futures::Stream;
use lagoon_core::channel::Channel;
use lagoon_core::event::DomainEvent;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Query for `GET /api/events`.
#[derive(Debug, Deserialize)]
pub struct EventStreamParams {
    /// Comma-separated channel names; absent means every channel.
    pub channels: Option<String>,
}

fn parse_channels(params: &EventStreamParams) -> Result<Vec<Channel>, AppError> {
    let Some(csv) = params.channels.as_deref().filter(|s| !s.trim().is_empty()) else {
        return Ok(Channel::ALL.to_vec());
    };
    csv.split(',')
        .map(str::trim)
        .map(|name| {
            Channel::parse(name)
                .ok_or_else(|| AppError::validation(format!("unknown channel: {name}")))
        })
        .collect()
}

/// `GET /api/events?channels=a,b` — attach a live-update listener.
pub async fn stream_events(
    State(state): State<AppState>,
    Query(params): Query<EventStreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let channels = parse_channels(&params)?;
    let mut updates = state.hub.subscribe(&channels);
    metrics::counter!("lagoon_sse_connections_total").increment(1);
    tracing::debug!(channels = ?channels, "SSE listener attached");

    let stream = stream! {
        let hello = DomainEvent::new("connected", json!({}), chrono::Utc::now());
        if let Ok(frame) = hello.to_frame() {
            yield Ok(Event::default().data(frame));
        }
        use futures::StreamExt;
        while let Some(event) = updates.next().await {
            match event.to_frame() {
                Ok(frame) => yield Ok(Event::default().data(frame)),
                Err(error) => {
                    tracing::warn!(%error, "unencodable event dropped from SSE stream");
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_filter_means_every_channel() {
        let channels = parse_channels(&EventStreamParams { channels: None })
            .unwrap_or_default();
        assert_eq!(channels.len(), Channel::ALL.len());
    }

    #[test]
    fn named_channels_are_honoured() {
        let channels = parse_channels(&EventStreamParams {
            channels: Some("booking-events, coupon-events".to_string()),
        })
        .unwrap_or_default();
        assert_eq!(channels, vec![Channel::Booking, Channel::Coupon]);
    }

    #[test]
    fn unknown_channels_are_rejected() {
        let result = parse_channels(&EventStreamParams {
            channels: Some("mystery-events".to_string()),
        });
        assert!(result.is_err());
    }
}
