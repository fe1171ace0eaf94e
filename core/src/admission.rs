//! The admission controller: decides whether a reservation request may be
//! admitted and computes its price.
//!
//! Preconditions run in a fixed order, each with its own failure mode:
//!
//! 1. the resort exists and is available ([`AdmissionError::NotFound`]);
//! 2. the dates form a valid future window ([`AdmissionError::InvalidDateRange`]);
//! 3. the check-in date is not blocked by the operator or the owner
//!    ([`AdmissionError::DateBlocked`]);
//! 4. no paid booking already covers the check-in date
//!    ([`AdmissionError::AlreadyBooked`]);
//! 5. fewer than [`PENDING_CAP`] unpaid bookings cover the check-in date
//!    ([`AdmissionError::PendingLimitExceeded`]).
//!
//! Steps 4 and 5 race with concurrent admissions, so their decision lives in
//! [`check_date_contention`] and every store implementation re-runs it inside
//! its per-resort serialization scope together with the insert.
//!
//! Rejections are deterministic for the same inputs and are never retried
//! automatically. Overlap tests only the **check-in date**: check-out is a
//! same-day-vacate boundary.

use crate::environment::Clock;
use crate::event::{EventPublisher, kinds};
use crate::pricing::PriceBreakdown;
use crate::store::{
    BookingStore, InsertBookingError, NewBookingRecord, NewPaymentProof, NotificationRequest,
    StoreError,
};
use crate::types::{
    Booking, BookingId, BookingReference, BookingStatus, CouponCode, Money, PaymentStatus, Resort,
    ResortId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Maximum unpaid bookings that may cover one (resort, check-in date) while
/// verification is pending.
pub const PENDING_CAP: usize = 2;

/// Why a reservation request was not admitted.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The resort does not exist or is not accepting bookings.
    #[error("resort {resort_id} was not found or is not accepting bookings")]
    NotFound {
        /// Requested resort.
        resort_id: ResortId,
    },

    /// Check-in is in the past, or check-out does not fall after check-in.
    #[error("invalid dates: check-in {check_in} must not be in the past and check-out {check_out} must fall after it")]
    InvalidDateRange {
        /// Requested check-in.
        check_in: NaiveDate,
        /// Requested check-out.
        check_out: NaiveDate,
    },

    /// The check-in date is administratively blocked.
    #[error("{resort_name} is not taking check-ins on {date}")]
    DateBlocked {
        /// Resort name, for the guest-facing message.
        resort_name: String,
        /// Blocked date.
        date: NaiveDate,
    },

    /// A paid booking already covers the check-in date.
    #[error("{resort_name} is already booked on {date}")]
    AlreadyBooked {
        /// Resort name, for the guest-facing message.
        resort_name: String,
        /// Contested date.
        date: NaiveDate,
    },

    /// Too many unpaid bookings cover the check-in date.
    #[error("{resort_name} has too many unconfirmed bookings for {date}; please pick another date")]
    PendingLimitExceeded {
        /// Resort name, for the guest-facing message.
        resort_name: String,
        /// Contested date.
        date: NaiveDate,
    },

    /// A payment or cancellation operation referenced a booking that does
    /// not exist.
    #[error("booking {booking_id} was not found")]
    BookingNotFound {
        /// Requested booking.
        booking_id: BookingId,
    },

    /// The store failed; the request may be retried by the caller.
    #[error("storage failure during admission")]
    Store(#[from] StoreError),
}

impl AdmissionError {
    /// Stable machine-readable code used in responses and metrics labels.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidDateRange { .. } => "invalid_date_range",
            Self::DateBlocked { .. } => "date_blocked",
            Self::AlreadyBooked { .. } => "already_booked",
            Self::PendingLimitExceeded { .. } => "pending_limit_exceeded",
            Self::BookingNotFound { .. } => "booking_not_found",
            Self::Store(_) => "store_failure",
        }
    }
}

/// Contention outcome of the serialized check inside a store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionConflict {
    /// A paid booking covers the date.
    #[error("a paid booking already covers the requested check-in date")]
    AlreadyBooked,
    /// The unpaid-booking cap is reached.
    #[error("the pending-booking limit is reached for the requested check-in date")]
    PendingLimitExceeded,
}

/// The slice of an existing booking the contention check needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoveringBooking {
    /// Lifecycle state (cancelled bookings hold no claim).
    pub status: BookingStatus,
    /// Settlement state.
    pub payment_status: PaymentStatus,
}

impl CoveringBooking {
    /// Project a booking onto the fields the check uses.
    #[must_use]
    pub const fn of(booking: &Booking) -> Self {
        Self {
            status: booking.status,
            payment_status: booking.payment_status,
        }
    }
}

/// The shared decision for admission steps 4 and 5, run by every store
/// implementation inside its serialization scope.
///
/// `covering` holds the bookings whose stay covers the requested check-in
/// date. Cancelled bookings hold no claim. One paid booking excludes the
/// date outright; otherwise up to [`PENDING_CAP`] unpaid bookings may hold
/// it while verification is pending.
///
/// # Errors
///
/// Returns the [`AdmissionConflict`] that rejects the candidate.
pub fn check_date_contention(covering: &[CoveringBooking]) -> Result<(), AdmissionConflict> {
    let live = covering
        .iter()
        .filter(|b| b.status != BookingStatus::Cancelled);

    let mut pending = 0usize;
    for booking in live {
        if booking.payment_status == PaymentStatus::Paid {
            return Err(AdmissionConflict::AlreadyBooked);
        }
        pending += 1;
    }
    if pending >= PENDING_CAP {
        return Err(AdmissionConflict::PendingLimitExceeded);
    }
    Ok(())
}

/// A reservation request as received from a front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Requested resort.
    pub resort_id: ResortId,
    /// Guest name.
    pub guest_name: String,
    /// Guest email.
    pub guest_email: String,
    /// Guest phone.
    pub guest_phone: String,
    /// First night of the stay.
    pub check_in: NaiveDate,
    /// Vacate date.
    pub check_out: NaiveDate,
    /// Guest count.
    pub guests: u32,
    /// Optional coupon code.
    pub coupon_code: Option<String>,
    /// Optional payment reference supplied up front.
    pub transaction_reference: Option<String>,
}

/// How the guest should settle the booking: the payee identifier, the exact
/// amount owed, and a UPI-style deep link front ends render as a QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstruction {
    /// Payee identifier (e.g. a UPI id).
    pub payee: String,
    /// Exact amount owed.
    pub amount: Money,
    /// Booking reference to quote with the payment.
    pub reference: BookingReference,
    /// Deep link encoding payee, amount, and reference.
    pub payment_url: String,
}

/// Display name embedded in payment deep links.
pub const PAYEE_DISPLAY_NAME: &str = "Lagoon Resorts";

impl PaymentInstruction {
    /// Assemble the instruction for an admitted booking.
    #[must_use]
    pub fn new(payee: &str, amount: Money, reference: &BookingReference) -> Self {
        let payment_url = format!(
            "upi://pay?pa={payee}&pn={name}&am={amount}&cu=INR&tn={reference}",
            name = urlencoding::encode(PAYEE_DISPLAY_NAME),
            reference = reference.as_str()
        );
        Self {
            payee: payee.to_string(),
            amount,
            reference: reference.clone(),
            payment_url,
        }
    }
}

/// A successfully admitted booking plus its payment instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmittedBooking {
    /// The persisted booking.
    pub booking: Booking,
    /// How to pay for it.
    pub payment: PaymentInstruction,
}

/// The admission controller. One instance serves every front end; handlers
/// hold it behind an `Arc` and inject the store, publisher, and clock.
#[derive(Clone)]
pub struct AdmissionController {
    store: Arc<dyn BookingStore>,
    publisher: EventPublisher,
    clock: Arc<dyn Clock>,
    payee_id: String,
}

impl AdmissionController {
    /// Wire a controller to its collaborators. `payee_id` is the payment
    /// collection identifier quoted to guests.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        publisher: EventPublisher,
        clock: Arc<dyn Clock>,
        payee_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
            payee_id: payee_id.into(),
        }
    }

    /// Price a prospective stay without admitting anything. Runs the resort
    /// and date preconditions so a quote is only given for bookable input.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NotFound`], [`AdmissionError::InvalidDateRange`],
    /// or [`AdmissionError::Store`].
    pub async fn quote(
        &self,
        resort_id: ResortId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        coupon_code: Option<&str>,
    ) -> Result<PriceBreakdown, AdmissionError> {
        let resort = self.available_resort(resort_id).await?;
        self.validate_dates(check_in, check_out)?;
        self.price(&resort, check_in, check_out, coupon_code).await
    }

    /// Admit a reservation request: run the precondition pipeline, price the
    /// stay, persist the booking through the store's serialization scope,
    /// and emit `booking.created`.
    ///
    /// # Errors
    ///
    /// Returns the first failing [`AdmissionError`] in precondition order.
    pub async fn admit(&self, request: BookingRequest) -> Result<AdmittedBooking, AdmissionError> {
        let result = self.try_admit(request).await;
        match &result {
            Ok(admitted) => {
                metrics::counter!("lagoon_admissions_accepted_total").increment(1);
                tracing::info!(
                    booking_id = %admitted.booking.id,
                    reference = %admitted.booking.reference,
                    resort_id = %admitted.booking.resort_id,
                    check_in = %admitted.booking.check_in,
                    total = %admitted.booking.total_price,
                    "booking admitted"
                );
            }
            Err(error) => {
                metrics::counter!("lagoon_admissions_rejected_total", "reason" => error.code())
                    .increment(1);
                tracing::debug!(reason = error.code(), %error, "admission rejected");
            }
        }
        result
    }

    async fn try_admit(&self, request: BookingRequest) -> Result<AdmittedBooking, AdmissionError> {
        // 1. Resort exists and is available.
        let resort = self.available_resort(request.resort_id).await?;

        // 2. Valid future date window.
        self.validate_dates(request.check_in, request.check_out)?;

        // 3. Neither block list covers the check-in date.
        if self
            .store
            .is_date_blocked(resort.id, request.check_in)
            .await?
        {
            return Err(AdmissionError::DateBlocked {
                resort_name: resort.name.clone(),
                date: request.check_in,
            });
        }

        let breakdown = self
            .price(
                &resort,
                request.check_in,
                request.check_out,
                request.coupon_code.as_deref(),
            )
            .await?;

        let id = BookingId::new();
        let reference = BookingReference::derive(id);
        let status = if request.transaction_reference.is_some() {
            BookingStatus::PendingVerification
        } else {
            BookingStatus::PendingPayment
        };

        let record = NewBookingRecord {
            id,
            resort_id: resort.id,
            guest_name: request.guest_name.clone(),
            guest_email: request.guest_email.clone(),
            guest_phone: request.guest_phone.clone(),
            check_in: request.check_in,
            check_out: request.check_out,
            guests: request.guests,
            base_price: breakdown.base_price,
            platform_fee: breakdown.platform_fee,
            discount: breakdown.discount,
            total_price: breakdown.total,
            reference: reference.clone(),
            status,
            payment_status: PaymentStatus::Pending,
        };
        let proof = request.transaction_reference.map(|transaction_id| NewPaymentProof {
            booking_id: id,
            transaction_id,
            card_last_four: None,
        });
        let notification = NotificationRequest {
            booking_id: id,
            reference: reference.as_str().to_string(),
            guest_name: request.guest_name,
            guest_email: request.guest_email,
            guest_phone: request.guest_phone,
            resort_name: resort.name.clone(),
            check_in: request.check_in,
            check_out: request.check_out,
            total: breakdown.total,
        };

        // 4 + 5 run inside the store's serialization scope with the insert.
        let booking = self
            .store
            .insert_booking(record, proof, notification)
            .await
            .map_err(|error| match error {
                InsertBookingError::Conflict(AdmissionConflict::AlreadyBooked) => {
                    AdmissionError::AlreadyBooked {
                        resort_name: resort.name.clone(),
                        date: request.check_in,
                    }
                }
                InsertBookingError::Conflict(AdmissionConflict::PendingLimitExceeded) => {
                    AdmissionError::PendingLimitExceeded {
                        resort_name: resort.name.clone(),
                        date: request.check_in,
                    }
                }
                InsertBookingError::Store(store) => AdmissionError::Store(store),
            })?;

        self.publisher
            .publish(
                kinds::BOOKING_CREATED,
                serde_json::to_value(&booking).unwrap_or_default(),
            )
            .await;

        let payment = PaymentInstruction::new(&self.payee_id, booking.total_price, &booking.reference);
        Ok(AdmittedBooking { booking, payment })
    }

    /// Record a guest's payment proof: upsert the proof, move the booking to
    /// `pending_verification` when the lattice allows, emit
    /// `payment.updated`. Idempotent on identical resubmission.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::BookingNotFound`] or [`AdmissionError::Store`].
    pub async fn submit_payment_proof(
        &self,
        booking_id: BookingId,
        transaction_id: String,
        card_last_four: Option<String>,
    ) -> Result<Booking, AdmissionError> {
        let booking = self
            .store
            .record_payment_proof(booking_id, transaction_id, card_last_four)
            .await?
            .ok_or(AdmissionError::BookingNotFound { booking_id })?;

        self.publisher
            .publish(kinds::PAYMENT_UPDATED, Self::booking_event_payload(&booking))
            .await;
        tracing::info!(booking_id = %booking.id, status = booking.status.as_str(), "payment proof recorded");
        Ok(booking)
    }

    /// Reconcile a payment (operator only): `payment_status → paid`,
    /// `status → confirmed`, emit `payment.updated`.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::BookingNotFound`] or [`AdmissionError::Store`].
    pub async fn mark_paid(&self, booking_id: BookingId) -> Result<Booking, AdmissionError> {
        let booking = self
            .store
            .mark_paid(booking_id)
            .await?
            .ok_or(AdmissionError::BookingNotFound { booking_id })?;

        self.publisher
            .publish(kinds::PAYMENT_UPDATED, Self::booking_event_payload(&booking))
            .await;
        tracing::info!(booking_id = %booking.id, "payment reconciled");
        Ok(booking)
    }

    /// Cancel a booking (operator only), releasing its date claims. Emits
    /// `booking.updated`.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::BookingNotFound`] or [`AdmissionError::Store`].
    pub async fn cancel(&self, booking_id: BookingId) -> Result<Booking, AdmissionError> {
        let booking = self
            .store
            .cancel_booking(booking_id)
            .await?
            .ok_or(AdmissionError::BookingNotFound { booking_id })?;

        self.publisher
            .publish(kinds::BOOKING_UPDATED, Self::booking_event_payload(&booking))
            .await;
        tracing::info!(booking_id = %booking.id, "booking cancelled");
        Ok(booking)
    }

    async fn available_resort(&self, resort_id: ResortId) -> Result<Resort, AdmissionError> {
        self.store
            .resort(resort_id)
            .await?
            .filter(|resort| resort.available)
            .ok_or(AdmissionError::NotFound { resort_id })
    }

    fn validate_dates(&self, check_in: NaiveDate, check_out: NaiveDate) -> Result<(), AdmissionError> {
        let today = self.clock.now().date_naive();
        if check_in < today || check_out <= check_in {
            return Err(AdmissionError::InvalidDateRange { check_in, check_out });
        }
        Ok(())
    }

    async fn price(
        &self,
        resort: &Resort,
        check_in: NaiveDate,
        check_out: NaiveDate,
        coupon_code: Option<&str>,
    ) -> Result<PriceBreakdown, AdmissionError> {
        let rules = self.store.pricing_rules(resort.id).await?;
        let coupon = match coupon_code {
            Some(code) => self.store.coupon(&CouponCode::new(code)).await?,
            None => None,
        };
        Ok(PriceBreakdown::compute(
            resort.base_price,
            &rules,
            coupon.as_ref(),
            resort.id,
            check_in,
            check_out,
        ))
    }

    fn booking_event_payload(booking: &Booking) -> serde_json::Value {
        serde_json::to_value(booking).unwrap_or_else(|_| {
            json!({
                "booking_id": booking.id,
                "status": booking.status.as_str(),
            })
        })
    }
}
