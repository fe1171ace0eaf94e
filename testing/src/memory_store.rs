//! In-memory booking store for fast, deterministic testing.
//!
//! [`InMemoryBookingStore`] implements the full
//! [`BookingStore`](lagoon_core::store::BookingStore) contract, including the
//! serialization guarantee on the guarded insert: the store-wide mutex plays
//! the role the per-resort row lock plays in Postgres, so the contention
//! re-check and the insert are one critical section here too.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use chrono::{DateTime, NaiveDate, Utc};
use lagoon_core::admission::{CoveringBooking, check_date_contention};
use lagoon_core::environment::{Clock, SystemClock};
use lagoon_core::store::{
    BookingStore, InsertBookingError, NewBookingRecord, NewCoupon, NewPaymentProof, NewResort,
    NotificationRequest, OutboxEntry, ResortRemoval, ResortUpdate, StoreError, StoreFuture,
};
use lagoon_core::types::{
    BlockSource, BlockedDate, Booking, BookingId, BookingStatus, Coupon, CouponCode,
    DynamicPricingRule, PaymentProof, PaymentStatus, Resort, ResortId,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

struct OutboxRow {
    id: Uuid,
    payload: NotificationRequest,
    created_at: DateTime<Utc>,
    dispatched: bool,
}

#[derive(Default)]
struct State {
    resorts: HashMap<ResortId, Resort>,
    rules: HashMap<ResortId, Vec<DynamicPricingRule>>,
    blocked: Vec<BlockedDate>,
    coupons: HashMap<CouponCode, Coupon>,
    bookings: HashMap<BookingId, Booking>,
    proofs: HashMap<BookingId, PaymentProof>,
    outbox: Vec<OutboxRow>,
}

/// In-memory [`BookingStore`] backed by a single mutex.
///
/// # Example
///
/// ```
/// use lagoon_testing::InMemoryBookingStore;
/// use lagoon_core::store::BookingStore;
///
/// # async fn example() {
/// let store = InMemoryBookingStore::new();
/// assert!(store.list_resorts().await.unwrap().is_empty());
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryBookingStore {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryBookingStore {
    /// Create an empty store stamping rows with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping rows with the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
        }
    }

    /// Insert a resort row directly, bypassing `create_resort`.
    ///
    /// Useful when a test needs a resort with a known id or with
    /// `available: false`.
    pub fn seed_resort(&self, resort: Resort) {
        self.state.lock().unwrap().resorts.insert(resort.id, resort);
    }

    /// Insert a dynamic-pricing rule row directly.
    pub fn seed_rule(&self, rule: DynamicPricingRule) {
        self.state
            .lock()
            .unwrap()
            .rules
            .entry(rule.resort_id)
            .or_default()
            .push(rule);
    }

    /// Insert a coupon row directly.
    pub fn seed_coupon(&self, coupon: Coupon) {
        self.state
            .lock()
            .unwrap()
            .coupons
            .insert(coupon.code.clone(), coupon);
    }

    /// Insert a booking row directly, bypassing admission.
    ///
    /// Useful for arranging covering bookings in arbitrary states.
    pub fn seed_booking(&self, booking: Booking) {
        self.state.lock().unwrap().bookings.insert(booking.id, booking);
    }

    /// The stored payment proof for a booking, if any.
    #[must_use]
    pub fn proof(&self, booking_id: BookingId) -> Option<PaymentProof> {
        self.state.lock().unwrap().proofs.get(&booking_id).cloned()
    }

    /// Number of persisted bookings.
    #[must_use]
    pub fn booking_count(&self) -> usize {
        self.state.lock().unwrap().bookings.len()
    }

    /// Clear all state (for test isolation).
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        *state = State::default();
    }
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingStore for InMemoryBookingStore {
    fn list_resorts(&self) -> StoreFuture<'_, Vec<Resort>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            let mut resorts: Vec<Resort> = state.resorts.values().cloned().collect();
            resorts.sort_by(|a, b| {
                a.display_rank
                    .cmp(&b.display_rank)
                    .then_with(|| a.name.cmp(&b.name))
            });
            Ok(resorts)
        })
    }

    fn resort(&self, id: ResortId) -> StoreFuture<'_, Option<Resort>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().resorts.get(&id).cloned()) })
    }

    fn create_resort(&self, resort: NewResort) -> StoreFuture<'_, Resort> {
        Box::pin(async move {
            let created = Resort {
                id: ResortId::new(),
                name: resort.name,
                location: resort.location,
                base_price: resort.base_price,
                available: true,
                max_guests: resort.max_guests,
                display_rank: resort.display_rank,
                created_at: self.clock.now(),
            };
            let rules = resort
                .pricing_rules
                .iter()
                .map(|rule| DynamicPricingRule {
                    resort_id: created.id,
                    day_type: rule.day_type,
                    price: rule.price,
                })
                .collect();

            let mut state = self.state.lock().unwrap();
            state.rules.insert(created.id, rules);
            state.resorts.insert(created.id, created.clone());
            Ok(created)
        })
    }

    fn update_resort(
        &self,
        id: ResortId,
        update: ResortUpdate,
    ) -> StoreFuture<'_, Option<Resort>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let Some(resort) = state.resorts.get_mut(&id) else {
                return Ok(None);
            };
            if let Some(name) = update.name {
                resort.name = name;
            }
            if let Some(location) = update.location {
                resort.location = location;
            }
            if let Some(base_price) = update.base_price {
                resort.base_price = base_price;
            }
            if let Some(available) = update.available {
                resort.available = available;
            }
            if let Some(max_guests) = update.max_guests {
                resort.max_guests = max_guests;
            }
            if let Some(display_rank) = update.display_rank {
                resort.display_rank = display_rank;
            }
            let snapshot = resort.clone();

            if let Some(rules) = update.pricing_rules {
                let rows = rules
                    .into_iter()
                    .map(|rule| DynamicPricingRule {
                        resort_id: id,
                        day_type: rule.day_type,
                        price: rule.price,
                    })
                    .collect();
                state.rules.insert(id, rows);
            }
            Ok(Some(snapshot))
        })
    }

    fn remove_resort(&self, id: ResortId) -> StoreFuture<'_, Option<ResortRemoval>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if !state.resorts.contains_key(&id) {
                return Ok(None);
            }
            let referenced = state.bookings.values().any(|b| b.resort_id == id);
            if referenced {
                if let Some(resort) = state.resorts.get_mut(&id) {
                    resort.available = false;
                }
                Ok(Some(ResortRemoval::Disabled))
            } else {
                state.resorts.remove(&id);
                state.rules.remove(&id);
                state.blocked.retain(|b| b.resort_id != id);
                Ok(Some(ResortRemoval::Deleted))
            }
        })
    }

    fn pricing_rules(&self, resort_id: ResortId) -> StoreFuture<'_, Vec<DynamicPricingRule>> {
        Box::pin(async move {
            Ok(self
                .state
                .lock()
                .unwrap()
                .rules
                .get(&resort_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn blocked_dates(&self, resort_id: ResortId) -> StoreFuture<'_, Vec<BlockedDate>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            let mut dates: Vec<BlockedDate> = state
                .blocked
                .iter()
                .filter(|b| b.resort_id == resort_id)
                .copied()
                .collect();
            dates.sort_by_key(|b| b.date);
            Ok(dates)
        })
    }

    fn add_blocked_date(
        &self,
        resort_id: ResortId,
        date: NaiveDate,
        source: BlockSource,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let exists = state
                .blocked
                .iter()
                .any(|b| b.resort_id == resort_id && b.date == date && b.source == source);
            if !exists {
                state.blocked.push(BlockedDate {
                    resort_id,
                    date,
                    source,
                });
            }
            Ok(())
        })
    }

    fn remove_blocked_date(
        &self,
        resort_id: ResortId,
        date: NaiveDate,
        source: BlockSource,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let before = state.blocked.len();
            state
                .blocked
                .retain(|b| !(b.resort_id == resort_id && b.date == date && b.source == source));
            Ok(state.blocked.len() != before)
        })
    }

    fn is_date_blocked(&self, resort_id: ResortId, date: NaiveDate) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            Ok(self
                .state
                .lock()
                .unwrap()
                .blocked
                .iter()
                .any(|b| b.resort_id == resort_id && b.date == date))
        })
    }

    fn list_coupons(&self) -> StoreFuture<'_, Vec<Coupon>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            let mut coupons: Vec<Coupon> = state.coupons.values().cloned().collect();
            coupons.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
            Ok(coupons)
        })
    }

    fn coupon<'a>(&'a self, code: &'a CouponCode) -> StoreFuture<'a, Option<Coupon>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().coupons.get(code).cloned()) })
    }

    fn create_coupon(&self, coupon: NewCoupon) -> StoreFuture<'_, Coupon> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if state.coupons.contains_key(&coupon.code) {
                return Err(StoreError::Duplicate {
                    entity: "coupon",
                    key: coupon.code.as_str().to_string(),
                });
            }
            let created = Coupon {
                code: coupon.code.clone(),
                kind: coupon.kind,
                value: coupon.value,
                day_type: coupon.day_type,
                resort_id: coupon.resort_id,
                created_at: self.clock.now(),
            };
            state.coupons.insert(coupon.code, created.clone());
            Ok(created)
        })
    }

    fn delete_coupon<'a>(&'a self, code: &'a CouponCode) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.state.lock().unwrap().coupons.remove(code).is_some()) })
    }

    fn insert_booking(
        &self,
        booking: NewBookingRecord,
        proof: Option<NewPaymentProof>,
        notification: NotificationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Booking, InsertBookingError>> + Send + '_>> {
        Box::pin(async move {
            let now = self.clock.now();
            let mut state = self.state.lock().unwrap();

            // One critical section: contention re-check plus insert.
            let covering: Vec<CoveringBooking> = state
                .bookings
                .values()
                .filter(|b| b.resort_id == booking.resort_id && b.covers(booking.check_in))
                .map(CoveringBooking::of)
                .collect();
            check_date_contention(&covering)?;

            let row = Booking {
                id: booking.id,
                resort_id: booking.resort_id,
                guest_name: booking.guest_name,
                guest_email: booking.guest_email,
                guest_phone: booking.guest_phone,
                check_in: booking.check_in,
                check_out: booking.check_out,
                guests: booking.guests,
                base_price: booking.base_price,
                platform_fee: booking.platform_fee,
                discount: booking.discount,
                total_price: booking.total_price,
                reference: booking.reference,
                status: booking.status,
                payment_status: booking.payment_status,
                created_at: now,
                updated_at: now,
            };
            state.bookings.insert(row.id, row.clone());
            if let Some(proof) = proof {
                state.proofs.insert(
                    proof.booking_id,
                    PaymentProof {
                        booking_id: proof.booking_id,
                        transaction_id: proof.transaction_id,
                        card_last_four: proof.card_last_four,
                        created_at: now,
                    },
                );
            }
            state.outbox.push(OutboxRow {
                id: Uuid::new_v4(),
                payload: notification,
                created_at: now,
                dispatched: false,
            });
            Ok(row)
        })
    }

    fn booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().bookings.get(&id).cloned()) })
    }

    fn list_bookings(&self, resort_id: Option<ResortId>) -> StoreFuture<'_, Vec<Booking>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            let mut bookings: Vec<Booking> = state
                .bookings
                .values()
                .filter(|b| resort_id.is_none_or(|id| b.resort_id == id))
                .cloned()
                .collect();
            // Newest first; the reference tie-break keeps fixed-clock
            // tests deterministic.
            bookings.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.reference.as_str().cmp(b.reference.as_str()))
            });
            Ok(bookings)
        })
    }

    fn record_payment_proof(
        &self,
        booking_id: BookingId,
        transaction_id: String,
        card_last_four: Option<String>,
    ) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let now = self.clock.now();
            let mut state = self.state.lock().unwrap();
            let Some(booking) = state.bookings.get_mut(&booking_id) else {
                return Ok(None);
            };
            if booking
                .status
                .can_transition_to(BookingStatus::PendingVerification)
            {
                booking.status = BookingStatus::PendingVerification;
                booking.updated_at = now;
            }
            let snapshot = booking.clone();
            state.proofs.insert(
                booking_id,
                PaymentProof {
                    booking_id,
                    transaction_id,
                    card_last_four,
                    created_at: now,
                },
            );
            Ok(Some(snapshot))
        })
    }

    fn mark_paid(&self, booking_id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let now = self.clock.now();
            let mut state = self.state.lock().unwrap();
            let Some(booking) = state.bookings.get_mut(&booking_id) else {
                return Ok(None);
            };
            booking.payment_status = PaymentStatus::Paid;
            if booking.status.can_transition_to(BookingStatus::Confirmed) {
                booking.status = BookingStatus::Confirmed;
            }
            booking.updated_at = now;
            Ok(Some(booking.clone()))
        })
    }

    fn cancel_booking(&self, booking_id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let now = self.clock.now();
            let mut state = self.state.lock().unwrap();
            let Some(booking) = state.bookings.get_mut(&booking_id) else {
                return Ok(None);
            };
            if booking.status.can_transition_to(BookingStatus::Cancelled) {
                booking.status = BookingStatus::Cancelled;
                booking.updated_at = now;
            }
            Ok(Some(booking.clone()))
        })
    }

    fn pending_notifications(&self, limit: u32) -> StoreFuture<'_, Vec<OutboxEntry>> {
        Box::pin(async move {
            let state = self.state.lock().unwrap();
            Ok(state
                .outbox
                .iter()
                .filter(|row| !row.dispatched)
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .map(|row| OutboxEntry {
                    id: row.id,
                    payload: row.payload.clone(),
                    created_at: row.created_at,
                })
                .collect())
        })
    }

    fn mark_notification_dispatched(&self, id: Uuid) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if let Some(row) = state.outbox.iter_mut().find(|row| row.id == id) {
                row.dispatched = true;
            }
            Ok(())
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { Ok(()) })
    }
}
