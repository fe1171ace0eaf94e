//! Coupon applicability and discount computation.
//!
//! A coupon applies to a stay when its resort scope is global or matches the
//! requested resort, and its day-type restriction covers the check-in day.
//! An inapplicable coupon simply contributes no discount; it is never an
//! admission failure.

use crate::types::{Coupon, DayType, DiscountKind, Money, ResortId};
use thiserror::Error;

impl Coupon {
    /// Whether this coupon applies to a stay at `resort_id` whose check-in
    /// falls on `day`.
    #[must_use]
    pub fn applies_to(&self, resort_id: ResortId, day: DayType) -> bool {
        let resort_ok = self.resort_id.is_none_or(|scoped| scoped == resort_id);
        resort_ok && self.day_type.matches(day)
    }
}

/// Discount a coupon yields against a fee-inclusive subtotal, clamped to
/// `[0, subtotal]`. Zero when the coupon does not apply.
#[must_use]
pub fn discount_for(
    coupon: &Coupon,
    resort_id: ResortId,
    day: DayType,
    subtotal: Money,
) -> Money {
    if !coupon.applies_to(resort_id, day) {
        return Money::ZERO;
    }
    let raw = match coupon.kind {
        DiscountKind::Percentage => subtotal.percent_round(coupon.value),
        DiscountKind::Flat => Money::new(coupon.value),
    };
    raw.min(subtotal)
}

/// Rejection reasons for a new coupon definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidCoupon {
    /// Percentage coupons must discount between 1 and 100 percent.
    #[error("percentage discount must be between 1 and 100, got {0}")]
    PercentageOutOfRange(u64),
    /// Flat coupons must discount a positive amount.
    #[error("flat discount must be greater than zero")]
    ZeroFlatDiscount,
    /// Codes cannot be empty.
    #[error("coupon code must not be empty")]
    EmptyCode,
}

/// Validate a coupon definition before it is created.
///
/// # Errors
///
/// Returns [`InvalidCoupon`] when the code is empty, a percentage is outside
/// 1..=100, or a flat discount is zero.
pub fn validate_definition(code: &str, kind: DiscountKind, value: u64) -> Result<(), InvalidCoupon> {
    if code.trim().is_empty() {
        return Err(InvalidCoupon::EmptyCode);
    }
    match kind {
        DiscountKind::Percentage if value == 0 || value > 100 => {
            Err(InvalidCoupon::PercentageOutOfRange(value))
        }
        DiscountKind::Flat if value == 0 => Err(InvalidCoupon::ZeroFlatDiscount),
        _ => Ok(()),
    }
}
