//! Core domain types for the booking platform.
//!
//! Identifiers are newtypes over [`Uuid`] so a resort id can never be passed
//! where a booking id is expected. Monetary amounts are whole currency units
//! in a [`Money`] newtype with the rounding helpers the price arithmetic
//! relies on (round half up, matching the behaviour customers see quoted).

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResortId(Uuid);

impl ResortId {
    /// Generate a new random resort id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ResortId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Generate a new random booking id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coupon code, the natural key of a coupon. Matched exactly as entered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CouponCode(String);

impl CouponCode {
    /// Wrap a raw code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Access the raw code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable booking reference shown to guests and payment reconcilers.
///
/// Derived from the booking id (`RB-` plus the first eight hex digits of the
/// UUID, uppercased) so it is stable for the lifetime of the booking and not
/// a guessable sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingReference(String);

impl BookingReference {
    /// Derive the reference for a booking id.
    #[must_use]
    pub fn derive(id: BookingId) -> Self {
        let hex = id.as_uuid().simple().to_string();
        Self(format!("RB-{}", hex[..8].to_uppercase()))
    }

    /// Wrap a previously derived reference (e.g. when loading from storage).
    #[must_use]
    pub fn from_string(reference: String) -> Self {
        Self(reference)
    }

    /// Access the reference text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// Monetary amount in whole currency units.
///
/// All platform arithmetic is integral; fractional intermediate results are
/// rounded half up, which is the rounding the original fee and discount
/// figures were quoted with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Highest nightly rate administrators may set. Keeps every stay-price
    /// computation comfortably inside `u64` (see the saturating arithmetic
    /// below, which covers amounts that bypass the admin surface).
    pub const MAX_PRICE: Self = Self(10_000_000);

    /// Create an amount from whole currency units.
    #[must_use]
    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    /// The raw amount in whole currency units.
    #[must_use]
    pub const fn amount(self) -> u64 {
        self.0
    }

    /// Multiply by a count (e.g. nightly rate times nights). Saturates at
    /// the representable maximum rather than wrapping.
    #[must_use]
    pub const fn times(self, count: u64) -> Self {
        Self(self.0.saturating_mul(count))
    }

    /// `percent` percent of this amount, rounded half up. Saturating.
    #[must_use]
    pub const fn percent_round(self, percent: u64) -> Self {
        Self(self.0.saturating_mul(percent).saturating_add(50) / 100)
    }

    /// `permille` thousandths of this amount, rounded half up. Saturating.
    /// Used for the 1.5% platform fee (15 permille).
    #[must_use]
    pub const fn permille_round(self, permille: u64) -> Self {
        Self(self.0.saturating_mul(permille).saturating_add(500) / 1000)
    }

    /// The smaller of two amounts.
    #[must_use]
    pub const fn min(self, other: Self) -> Self {
        if self.0 <= other.0 { self } else { other }
    }

    /// Subtraction that stops at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl std::ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Day types
// ============================================================================

/// Pricing classification of a calendar date.
///
/// The check-in date alone decides the class for the whole stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    /// Monday through Thursday.
    Weekday,
    /// Friday.
    Friday,
    /// Saturday and Sunday.
    Weekend,
}

impl DayType {
    /// Classify a calendar date.
    #[must_use]
    pub fn classify(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Fri => Self::Friday,
            Weekday::Sat | Weekday::Sun => Self::Weekend,
            _ => Self::Weekday,
        }
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weekday => "weekday",
            Self::Friday => "friday",
            Self::Weekend => "weekend",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekday" => Some(Self::Weekday),
            "friday" => Some(Self::Friday),
            "weekend" => Some(Self::Weekend),
            _ => None,
        }
    }
}

/// Day-type applicability of a coupon. `All` means every day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponDayType {
    /// Monday through Thursday only.
    Weekday,
    /// Fridays only.
    Friday,
    /// Saturdays and Sundays only.
    Weekend,
    /// No day restriction.
    All,
}

impl CouponDayType {
    /// Does this applicability cover the given day type?
    #[must_use]
    pub const fn matches(self, day: DayType) -> bool {
        matches!(
            (self, day),
            (Self::All, _)
                | (Self::Weekday, DayType::Weekday)
                | (Self::Friday, DayType::Friday)
                | (Self::Weekend, DayType::Weekend)
        )
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weekday => "weekday",
            Self::Friday => "friday",
            Self::Weekend => "weekend",
            Self::All => "all",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "weekday" => Some(Self::Weekday),
            "friday" => Some(Self::Friday),
            "weekend" => Some(Self::Weekend),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

// ============================================================================
// Resorts and pricing rules
// ============================================================================

/// A bookable resort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resort {
    /// Resort identity.
    pub id: ResortId,
    /// Display name.
    pub name: String,
    /// Human-readable location.
    pub location: String,
    /// Nightly rate applied when no dynamic-pricing rule matches.
    pub base_price: Money,
    /// Whether the resort currently accepts bookings. Soft-disabled resorts
    /// keep their history but admit nothing new.
    pub available: bool,
    /// Maximum guests per booking.
    pub max_guests: u32,
    /// Ordering key for listings (ascending).
    pub display_rank: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Day-type rate override owned by a resort.
///
/// At most one rule may exist per (resort, day type); the set is replaced
/// wholesale whenever the resort is updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicPricingRule {
    /// Owning resort.
    pub resort_id: ResortId,
    /// Day class this rate applies to.
    pub day_type: DayType,
    /// Nightly rate for that class.
    pub price: Money,
}

/// A date on which a resort does not admit new check-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedDate {
    /// Resort the block applies to.
    pub resort_id: ResortId,
    /// The blocked check-in date.
    pub date: NaiveDate,
    /// Which list the block came from.
    pub source: BlockSource,
}

/// Origin of a blocked date. The operator and the resort owner maintain
/// independent lists; either one blocks admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockSource {
    /// Platform operator block.
    Admin,
    /// Resort owner block.
    Owner,
}

impl BlockSource {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }
}

// ============================================================================
// Coupons
// ============================================================================

/// How a coupon's magnitude is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// Percentage of the fee-inclusive subtotal.
    Percentage,
    /// Flat amount in whole currency units.
    Flat,
}

impl DiscountKind {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Flat => "flat",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(Self::Percentage),
            "flat" => Some(Self::Flat),
            _ => None,
        }
    }
}

/// A discount coupon. Immutable once created, removable by deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Unique code, matched exactly as entered.
    pub code: CouponCode,
    /// Percentage or flat.
    pub kind: DiscountKind,
    /// Percent (for [`DiscountKind::Percentage`]) or whole currency units
    /// (for [`DiscountKind::Flat`]).
    pub value: u64,
    /// Day-type restriction.
    pub day_type: CouponDayType,
    /// Optional resort restriction; `None` means the coupon is global.
    pub resort_id: Option<ResortId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Bookings
// ============================================================================

/// Booking lifecycle state.
///
/// Forward-only: a booking moves through `pending_payment` →
/// `pending_verification` → `confirmed`, or sideways to `cancelled` from any
/// live state. It never moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Admitted, waiting for the guest to submit payment.
    PendingPayment,
    /// Payment reference received, waiting for manual reconciliation.
    PendingVerification,
    /// Payment reconciled.
    Confirmed,
    /// Cancelled by an operator; releases the booking's date claims.
    Cancelled,
}

impl BookingStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::PendingVerification => "pending_verification",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(Self::PendingPayment),
            "pending_verification" => Some(Self::PendingVerification),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Position in the forward lattice. `Cancelled` sits outside it.
    const fn rank(self) -> u8 {
        match self {
            Self::PendingPayment => 0,
            Self::PendingVerification => 1,
            Self::Confirmed => 2,
            Self::Cancelled => 3,
        }
    }

    /// Whether a transition to `next` respects the lattice: strictly forward,
    /// or to `Cancelled` from any live state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match next {
            Self::Cancelled => !matches!(self, Self::Cancelled),
            _ => !matches!(self, Self::Cancelled) && next.rank() > self.rank(),
        }
    }
}

/// Payment settlement state, reconciled manually against an external
/// transaction reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Not yet reconciled.
    Pending,
    /// Reconciled by an operator.
    Paid,
}

impl PaymentStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// An admitted reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identity.
    pub id: BookingId,
    /// Booked resort.
    pub resort_id: ResortId,
    /// Guest name.
    pub guest_name: String,
    /// Guest email.
    pub guest_email: String,
    /// Guest phone.
    pub guest_phone: String,
    /// First night of the stay.
    pub check_in: NaiveDate,
    /// Vacate date; not part of the stay.
    pub check_out: NaiveDate,
    /// Number of guests.
    pub guests: u32,
    /// Nightly rate times nights.
    pub base_price: Money,
    /// Platform fee on the base price.
    pub platform_fee: Money,
    /// Coupon discount applied to the fee-inclusive subtotal.
    pub discount: Money,
    /// `base_price + platform_fee - discount`.
    pub total_price: Money,
    /// Human-readable reference derived from the id.
    pub reference: BookingReference,
    /// Lifecycle state.
    pub status: BookingStatus,
    /// Settlement state.
    pub payment_status: PaymentStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last state-transition time.
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Whether this booking's stay covers `date`. Check-out day is a
    /// same-day-vacate boundary and is not covered.
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }
}

/// A guest-supplied payment proof awaiting reconciliation. At most one
/// active proof exists per booking; resubmission replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    /// Booking the proof belongs to.
    pub booking_id: BookingId,
    /// Externally supplied transaction reference.
    pub transaction_id: String,
    /// Optional last four digits of the paying card.
    pub card_last_four: Option<String>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_type_classification() {
        // 2025-01-06 is a Monday.
        assert_eq!(DayType::classify(date(2025, 1, 6)), DayType::Weekday);
        assert_eq!(DayType::classify(date(2025, 1, 9)), DayType::Weekday); // Thursday
        assert_eq!(DayType::classify(date(2025, 1, 10)), DayType::Friday);
        assert_eq!(DayType::classify(date(2025, 1, 11)), DayType::Weekend); // Saturday
        assert_eq!(DayType::classify(date(2025, 1, 12)), DayType::Weekend); // Sunday
    }

    #[test]
    fn coupon_day_type_matching() {
        assert!(CouponDayType::All.matches(DayType::Weekday));
        assert!(CouponDayType::All.matches(DayType::Friday));
        assert!(CouponDayType::All.matches(DayType::Weekend));
        assert!(CouponDayType::Weekend.matches(DayType::Weekend));
        assert!(!CouponDayType::Weekend.matches(DayType::Friday));
        assert!(!CouponDayType::Friday.matches(DayType::Weekday));
    }

    #[test]
    fn money_rounding_half_up() {
        // The canonical fee: 1.5% of 2000 is exactly 30.
        assert_eq!(Money::new(2000).permille_round(15), Money::new(30));
        // 1.5% of 1000 is 15.
        assert_eq!(Money::new(1000).permille_round(15), Money::new(15));
        // 1.5% of 1033 is 15.495, rounds to 15; of 1034 is 15.51, rounds to 16.
        assert_eq!(Money::new(1033).permille_round(15), Money::new(15));
        assert_eq!(Money::new(1034).permille_round(15), Money::new(16));
        // 10% of 2030 is 203.
        assert_eq!(Money::new(2030).percent_round(10), Money::new(203));
        // Half rounds up: 5% of 1010 is 50.5 -> 51.
        assert_eq!(Money::new(1010).percent_round(5), Money::new(51));
    }

    #[test]
    fn money_min_and_saturating_sub() {
        assert_eq!(Money::new(5).min(Money::new(9)), Money::new(5));
        assert_eq!(Money::new(9).saturating_sub(Money::new(5)), Money::new(4));
        assert_eq!(Money::new(5).saturating_sub(Money::new(9)), Money::ZERO);
    }

    #[test]
    fn money_arithmetic_saturates_instead_of_wrapping() {
        let huge = Money::new(u64::MAX / 2);
        assert_eq!(huge.times(3), Money::new(u64::MAX));
        assert_eq!(huge + huge + Money::new(10), Money::new(u64::MAX));
        // Scaled intermediates clamp; the result stays below the input.
        assert!(Money::new(u64::MAX).percent_round(10) <= Money::new(u64::MAX));
        assert!(Money::new(u64::MAX).permille_round(15) <= Money::new(u64::MAX));
    }

    #[test]
    fn booking_reference_is_stable_and_prefixed() {
        let id = BookingId::new();
        let a = BookingReference::derive(id);
        let b = BookingReference::derive(id);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("RB-"));
        assert_eq!(a.as_str().len(), 11);
        assert!(a.as_str()[3..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn distinct_ids_yield_distinct_references() {
        let a = BookingReference::derive(BookingId::new());
        let b = BookingReference::derive(BookingId::new());
        assert_ne!(a, b);
    }

    #[test]
    fn status_lattice_is_forward_only() {
        use BookingStatus::*;
        assert!(PendingPayment.can_transition_to(PendingVerification));
        assert!(PendingPayment.can_transition_to(Confirmed));
        assert!(PendingVerification.can_transition_to(Confirmed));
        assert!(PendingPayment.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));

        assert!(!PendingVerification.can_transition_to(PendingPayment));
        assert!(!Confirmed.can_transition_to(PendingVerification));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Cancelled.can_transition_to(Cancelled));
        assert!(!PendingPayment.can_transition_to(PendingPayment));
    }

    #[test]
    fn booking_covers_checks_checkin_inclusive_checkout_exclusive() {
        let booking = Booking {
            id: BookingId::new(),
            resort_id: ResortId::new(),
            guest_name: "A".into(),
            guest_email: "a@example.com".into(),
            guest_phone: "1".into(),
            check_in: date(2025, 3, 10),
            check_out: date(2025, 3, 12),
            guests: 2,
            base_price: Money::new(2000),
            platform_fee: Money::new(30),
            discount: Money::ZERO,
            total_price: Money::new(2030),
            reference: BookingReference::from_string("RB-TEST0000".into()),
            status: BookingStatus::PendingPayment,
            payment_status: PaymentStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!booking.covers(date(2025, 3, 9)));
        assert!(booking.covers(date(2025, 3, 10)));
        assert!(booking.covers(date(2025, 3, 11)));
        assert!(!booking.covers(date(2025, 3, 12)));
    }

    #[test]
    fn enum_storage_roundtrips() {
        for s in [
            BookingStatus::PendingPayment,
            BookingStatus::PendingVerification,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(s.as_str()), Some(s));
        }
        for s in [PaymentStatus::Pending, PaymentStatus::Paid] {
            assert_eq!(PaymentStatus::parse(s.as_str()), Some(s));
        }
        for s in [DiscountKind::Percentage, DiscountKind::Flat] {
            assert_eq!(DiscountKind::parse(s.as_str()), Some(s));
        }
        for s in [BlockSource::Admin, BlockSource::Owner] {
            assert_eq!(BlockSource::parse(s.as_str()), Some(s));
        }
        assert_eq!(BookingStatus::parse("unknown"), None);
    }
}
