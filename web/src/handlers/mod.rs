//! HTTP request handlers, organized by domain.

pub mod bookings;
pub mod coupons;
pub mod events;
pub mod health;
pub mod resorts;
