//! Persistence boundary for bookings, resorts, coupons, and the outbox.
//!
//! [`BookingStore`] is the sole owner of booking identity and lifecycle
//! state. It is object-safe (boxed futures) so handlers depend on
//! `Arc<dyn BookingStore>` and tests swap in the in-memory implementation
//! from `lagoon-testing`.
//!
//! The one non-obvious method is [`BookingStore::insert_booking`]: admission
//! steps that race (paid-overlap and the pending cap) must be re-checked and
//! the row inserted inside a single serialization scope per resort, so the
//! trait hands the whole guarded insert to the implementation and shares the
//! decision logic via [`crate::admission::check_date_contention`].

use crate::admission::AdmissionConflict;
use crate::types::{
    BlockSource, BlockedDate, Booking, BookingId, BookingReference, BookingStatus, Coupon,
    CouponCode, CouponDayType, DayType, DiscountKind, DynamicPricingRule, Money, PaymentStatus,
    Resort, ResortId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Infrastructure failures at the persistence boundary.
///
/// These are never shown to guests verbatim; the web layer maps them to a
/// generic "try again" response and logs the detail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The database rejected or failed an operation.
    #[error("database error: {0}")]
    Database(String),

    /// A uniqueness constraint was violated.
    #[error("duplicate {entity}: {key}")]
    Duplicate {
        /// Kind of record, e.g. `coupon`.
        entity: &'static str,
        /// Conflicting key.
        key: String,
    },

    /// A stored value could not be decoded into its domain type.
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

/// Failure modes of the guarded booking insert: either the serialization
/// scope found contention, or the infrastructure failed.
#[derive(Debug, Error)]
pub enum InsertBookingError {
    /// The date-contention check failed inside the transaction.
    #[error(transparent)]
    Conflict(#[from] AdmissionConflict),

    /// The store itself failed; nothing was committed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Boxed-future result type used by every trait method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

// ============================================================================
// Input records
// ============================================================================

/// A day-type rate override supplied when creating or updating a resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateOverride {
    /// Day class the rate applies to.
    pub day_type: DayType,
    /// Nightly rate for that class.
    pub price: Money,
}

/// Fields for a new resort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResort {
    /// Display name.
    pub name: String,
    /// Human-readable location.
    pub location: String,
    /// Base nightly rate.
    pub base_price: Money,
    /// Maximum guests per booking.
    pub max_guests: u32,
    /// Ordering key for listings.
    pub display_rank: i32,
    /// Initial dynamic-pricing rules, at most one per day type.
    pub pricing_rules: Vec<RateOverride>,
}

/// Partial update of a resort. `None` fields are left unchanged; a `Some`
/// rule set replaces the existing rules wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResortUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New location.
    pub location: Option<String>,
    /// New base nightly rate.
    pub base_price: Option<Money>,
    /// New availability flag.
    pub available: Option<bool>,
    /// New guest capacity.
    pub max_guests: Option<u32>,
    /// New listing rank.
    pub display_rank: Option<i32>,
    /// Replacement rule set (delete-all-then-reinsert).
    pub pricing_rules: Option<Vec<RateOverride>>,
}

/// Outcome of removing a resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResortRemoval {
    /// No bookings referenced the resort; the row is gone.
    Deleted,
    /// Bookings reference the resort; it was soft-disabled instead.
    Disabled,
}

/// Fields for a new coupon (already validated, see
/// [`crate::coupon::validate_definition`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCoupon {
    /// Unique code.
    pub code: CouponCode,
    /// Percentage or flat.
    pub kind: DiscountKind,
    /// Discount magnitude.
    pub value: u64,
    /// Day-type restriction.
    pub day_type: CouponDayType,
    /// Optional resort restriction.
    pub resort_id: Option<ResortId>,
}

/// A fully priced booking candidate, ready for the guarded insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookingRecord {
    /// Pre-assigned booking identity.
    pub id: BookingId,
    /// Booked resort.
    pub resort_id: ResortId,
    /// Guest name.
    pub guest_name: String,
    /// Guest email.
    pub guest_email: String,
    /// Guest phone.
    pub guest_phone: String,
    /// First night.
    pub check_in: NaiveDate,
    /// Vacate date.
    pub check_out: NaiveDate,
    /// Guest count.
    pub guests: u32,
    /// Nightly rate times nights.
    pub base_price: Money,
    /// Platform fee.
    pub platform_fee: Money,
    /// Coupon discount.
    pub discount: Money,
    /// Amount owed.
    pub total_price: Money,
    /// Reference derived from the id.
    pub reference: BookingReference,
    /// Initial lifecycle state.
    pub status: BookingStatus,
    /// Initial settlement state.
    pub payment_status: PaymentStatus,
}

/// A payment proof accompanying a booking at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentProof {
    /// Booking the proof belongs to.
    pub booking_id: BookingId,
    /// Externally supplied transaction reference.
    pub transaction_id: String,
    /// Optional card suffix.
    pub card_last_four: Option<String>,
}

// ============================================================================
// Notification outbox
// ============================================================================

/// Payload handed to the external notifier once a booking is admitted.
///
/// Enqueued in the same transaction as the booking insert so notification
/// dispatch can never observe a booking that was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Admitted booking.
    pub booking_id: BookingId,
    /// Human reference for the guest.
    pub reference: String,
    /// Guest name.
    pub guest_name: String,
    /// Guest email.
    pub guest_email: String,
    /// Guest phone.
    pub guest_phone: String,
    /// Resort name for the message body.
    pub resort_name: String,
    /// Stay start.
    pub check_in: NaiveDate,
    /// Stay end.
    pub check_out: NaiveDate,
    /// Amount owed.
    pub total: Money,
}

/// A pending outbox row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    /// Outbox row id.
    pub id: Uuid,
    /// The notification to dispatch.
    pub payload: NotificationRequest,
    /// Enqueue time.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// The store trait
// ============================================================================

/// Persistence boundary. See the module docs for the concurrency contract on
/// [`BookingStore::insert_booking`].
pub trait BookingStore: Send + Sync {
    // ---- resorts -----------------------------------------------------------

    /// All resorts ordered by display rank.
    fn list_resorts(&self) -> StoreFuture<'_, Vec<Resort>>;

    /// One resort by id, if present.
    fn resort(&self, id: ResortId) -> StoreFuture<'_, Option<Resort>>;

    /// Create a resort and its initial pricing rules.
    fn create_resort(&self, resort: NewResort) -> StoreFuture<'_, Resort>;

    /// Apply a partial update; replaces pricing rules wholesale when given.
    /// Returns `None` when the resort does not exist.
    fn update_resort(&self, id: ResortId, update: ResortUpdate)
    -> StoreFuture<'_, Option<Resort>>;

    /// Remove a resort: hard-delete when nothing references it, soft-disable
    /// otherwise. Returns `None` when the resort does not exist.
    fn remove_resort(&self, id: ResortId) -> StoreFuture<'_, Option<ResortRemoval>>;

    /// Dynamic-pricing rules owned by a resort.
    fn pricing_rules(&self, resort_id: ResortId) -> StoreFuture<'_, Vec<DynamicPricingRule>>;

    // ---- blocked dates -----------------------------------------------------

    /// All blocked dates for a resort.
    fn blocked_dates(&self, resort_id: ResortId) -> StoreFuture<'_, Vec<BlockedDate>>;

    /// Block a check-in date. Idempotent per (resort, date, source).
    fn add_blocked_date(
        &self,
        resort_id: ResortId,
        date: NaiveDate,
        source: BlockSource,
    ) -> StoreFuture<'_, ()>;

    /// Unblock a date; returns whether a block was removed.
    fn remove_blocked_date(
        &self,
        resort_id: ResortId,
        date: NaiveDate,
        source: BlockSource,
    ) -> StoreFuture<'_, bool>;

    /// Whether either block list covers the date.
    fn is_date_blocked(&self, resort_id: ResortId, date: NaiveDate) -> StoreFuture<'_, bool>;

    // ---- coupons -----------------------------------------------------------

    /// All coupons.
    fn list_coupons(&self) -> StoreFuture<'_, Vec<Coupon>>;

    /// One coupon by code.
    fn coupon<'a>(&'a self, code: &'a CouponCode) -> StoreFuture<'a, Option<Coupon>>;

    /// Create a coupon. Fails with [`StoreError::Duplicate`] on an existing
    /// code.
    fn create_coupon(&self, coupon: NewCoupon) -> StoreFuture<'_, Coupon>;

    /// Delete a coupon; returns whether one existed.
    fn delete_coupon<'a>(&'a self, code: &'a CouponCode) -> StoreFuture<'a, bool>;

    // ---- bookings ----------------------------------------------------------

    /// The guarded insert: within one serialization scope per resort,
    /// re-check date contention against current rows, then insert the
    /// booking, its optional payment proof, and the outbox row atomically.
    fn insert_booking(
        &self,
        booking: NewBookingRecord,
        proof: Option<NewPaymentProof>,
        notification: NotificationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Booking, InsertBookingError>> + Send + '_>>;

    /// One booking by id.
    fn booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>>;

    /// Bookings, newest first, optionally restricted to a resort.
    fn list_bookings(&self, resort_id: Option<ResortId>) -> StoreFuture<'_, Vec<Booking>>;

    /// Upsert the payment proof and move the booking to
    /// `pending_verification` when the lattice allows. Idempotent: an
    /// identical resubmission changes nothing. Returns `None` when the
    /// booking does not exist.
    fn record_payment_proof(
        &self,
        booking_id: BookingId,
        transaction_id: String,
        card_last_four: Option<String>,
    ) -> StoreFuture<'_, Option<Booking>>;

    /// Reconcile payment: `payment_status → paid`, `status → confirmed`.
    /// Returns `None` when the booking does not exist.
    fn mark_paid(&self, booking_id: BookingId) -> StoreFuture<'_, Option<Booking>>;

    /// Operator cancellation; releases the booking's date claims. Returns
    /// `None` when the booking does not exist.
    fn cancel_booking(&self, booking_id: BookingId) -> StoreFuture<'_, Option<Booking>>;

    // ---- notification outbox ----------------------------------------------

    /// Oldest pending outbox rows, up to `limit`.
    fn pending_notifications(&self, limit: u32) -> StoreFuture<'_, Vec<OutboxEntry>>;

    /// Mark an outbox row dispatched so it is never handed out again.
    fn mark_notification_dispatched(&self, id: Uuid) -> StoreFuture<'_, ()>;

    // ---- health ------------------------------------------------------------

    /// Cheap liveness probe of the underlying store.
    fn ping(&self) -> StoreFuture<'_, ()>;
}
