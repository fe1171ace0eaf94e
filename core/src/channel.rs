//! Broker channel routing.
//!
//! Every domain event rides exactly one named broker channel, chosen by the
//! prefix of its type tag. The mapping is total: unknown prefixes fall back
//! to the general resort channel rather than failing, so a new event type
//! can never strand a publisher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named broker channel (one topic per channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// `resort.*` events, and the fallback for unknown prefixes.
    Resort,
    /// `booking.*` and `payment.*` events.
    Booking,
    /// `coupon.*` events.
    Coupon,
    /// `food.*` events published by the food-ordering services.
    Food,
    /// `travel.*` events published by the travel-booking services.
    Travel,
}

impl Channel {
    /// Every channel, in subscription order.
    pub const ALL: [Self; 5] = [
        Self::Resort,
        Self::Booking,
        Self::Coupon,
        Self::Food,
        Self::Travel,
    ];

    /// Broker topic name for this channel.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resort => "resort-events",
            Self::Booking => "booking-events",
            Self::Coupon => "coupon-events",
            Self::Food => "food-events",
            Self::Travel => "travel-events",
        }
    }

    /// Parse a topic name back into a channel.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resort-events" => Some(Self::Resort),
            "booking-events" => Some(Self::Booking),
            "coupon-events" => Some(Self::Coupon),
            "food-events" => Some(Self::Food),
            "travel-events" => Some(Self::Travel),
            _ => None,
        }
    }

    /// Route an event type tag to its channel. Total by construction:
    /// payment facts ride the booking channel, anything unrecognised rides
    /// the general resort channel.
    #[must_use]
    pub fn for_event_type(event_type: &str) -> Self {
        if event_type.starts_with("booking.") || event_type.starts_with("payment.") {
            Self::Booking
        } else if event_type.starts_with("coupon.") {
            Self::Coupon
        } else if event_type.starts_with("food.") {
            Self::Food
        } else if event_type.starts_with("travel.") {
            Self::Travel
        } else {
            Self::Resort
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
