//! Nightly-rate resolution and price arithmetic.
//!
//! The whole stay is priced at a single nightly rate chosen from the
//! check-in date alone: classify the check-in into a [`DayType`], use the
//! resort's dynamic-pricing rule for that class if one exists, otherwise the
//! base rate. Stay length and the check-out weekday never change the rate.
//!
//! Everything here is pure and deterministic so it can be tested against a
//! fixed calendar.

use crate::coupon;
use crate::types::{Coupon, DayType, DynamicPricingRule, Money, ResortId};
use chrono::NaiveDate;
use serde::Serialize;

/// Platform fee in thousandths of the base price (1.5%).
pub const PLATFORM_FEE_PERMILLE: u64 = 15;

/// Number of nights in a stay. Callers guarantee `check_out > check_in`;
/// the result is clamped to at least one night regardless.
#[must_use]
pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> u64 {
    let days = (check_out - check_in).num_days().max(1);
    u64::try_from(days).unwrap_or(1)
}

/// Resolve the nightly rate for a check-in date: the matching day-type rule
/// wins, otherwise the resort's base rate.
#[must_use]
pub fn resolve_nightly_rate(
    base_price: Money,
    rules: &[DynamicPricingRule],
    check_in: NaiveDate,
) -> Money {
    let day_type = DayType::classify(check_in);
    rules
        .iter()
        .find(|rule| rule.day_type == day_type)
        .map_or(base_price, |rule| rule.price)
}

/// The full price computation for one stay.
///
/// `total = base + fee - discount`, where the fee is rounded before the
/// discount is taken against the fee-inclusive subtotal, and the discount is
/// clamped to `[0, subtotal]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    /// Day class of the check-in date.
    pub day_type: DayType,
    /// Resolved nightly rate.
    pub nightly_rate: Money,
    /// Nights in the stay.
    pub nights: u64,
    /// `nightly_rate * nights`.
    pub base_price: Money,
    /// 1.5% of the base price, rounded half up.
    pub platform_fee: Money,
    /// `base_price + platform_fee`.
    pub subtotal: Money,
    /// Coupon discount, zero when no applicable coupon was given.
    pub discount: Money,
    /// Amount the guest owes.
    pub total: Money,
}

impl PriceBreakdown {
    /// Compute the breakdown for a stay at the given resort.
    ///
    /// The coupon is consulted only if it applies to the resort and the
    /// check-in day type; an inapplicable coupon contributes zero discount
    /// rather than failing the computation.
    #[must_use]
    pub fn compute(
        base_price: Money,
        rules: &[DynamicPricingRule],
        coupon: Option<&Coupon>,
        resort_id: ResortId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Self {
        let day_type = DayType::classify(check_in);
        let nightly_rate = resolve_nightly_rate(base_price, rules, check_in);
        let nights = nights_between(check_in, check_out);
        let base = nightly_rate.times(nights);
        let platform_fee = base.permille_round(PLATFORM_FEE_PERMILLE);
        let subtotal = base + platform_fee;
        let discount = coupon.map_or(Money::ZERO, |c| {
            coupon::discount_for(c, resort_id, day_type, subtotal)
        });
        let total = subtotal.saturating_sub(discount);

        Self {
            day_type,
            nightly_rate,
            nights,
            base_price: base,
            platform_fee,
            subtotal,
            discount,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CouponCode, CouponDayType, DiscountKind};
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(resort_id: ResortId, day_type: DayType, price: u64) -> DynamicPricingRule {
        DynamicPricingRule {
            resort_id,
            day_type,
            price: Money::new(price),
        }
    }

    fn percentage_coupon(value: u64) -> Coupon {
        Coupon {
            code: CouponCode::new("SAVE"),
            kind: DiscountKind::Percentage,
            value,
            day_type: CouponDayType::All,
            resort_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn weekend_rule_beats_base_rate_on_saturday() {
        let resort_id = ResortId::new();
        let rules = vec![
            rule(resort_id, DayType::Weekend, 1500),
            rule(resort_id, DayType::Friday, 1200),
        ];
        // 2025-01-11 is a Saturday.
        let nightly = resolve_nightly_rate(Money::new(1000), &rules, date(2025, 1, 11));
        assert_eq!(nightly, Money::new(1500));
    }

    #[test]
    fn base_rate_applies_when_no_rule_matches() {
        let resort_id = ResortId::new();
        let rules = vec![rule(resort_id, DayType::Weekend, 1500)];
        // 2025-01-06 is a Monday.
        let nightly = resolve_nightly_rate(Money::new(1000), &rules, date(2025, 1, 6));
        assert_eq!(nightly, Money::new(1000));
    }

    #[test]
    fn resolution_is_deterministic() {
        let resort_id = ResortId::new();
        let rules = vec![rule(resort_id, DayType::Friday, 1200)];
        let check_in = date(2025, 1, 10); // Friday
        let first = resolve_nightly_rate(Money::new(1000), &rules, check_in);
        for _ in 0..10 {
            assert_eq!(resolve_nightly_rate(Money::new(1000), &rules, check_in), first);
        }
    }

    #[test]
    fn canonical_two_night_ten_percent_breakdown() {
        // Nightly 1000, two nights, 10% coupon:
        // base 2000, fee 30, subtotal 2030, discount 203, total 1827.
        let resort_id = ResortId::new();
        let coupon = percentage_coupon(10);
        let breakdown = PriceBreakdown::compute(
            Money::new(1000),
            &[],
            Some(&coupon),
            resort_id,
            date(2025, 1, 6),
            date(2025, 1, 8),
        );
        assert_eq!(breakdown.nights, 2);
        assert_eq!(breakdown.base_price, Money::new(2000));
        assert_eq!(breakdown.platform_fee, Money::new(30));
        assert_eq!(breakdown.subtotal, Money::new(2030));
        assert_eq!(breakdown.discount, Money::new(203));
        assert_eq!(breakdown.total, Money::new(1827));
    }

    #[test]
    fn breakdown_without_coupon_has_zero_discount() {
        let breakdown = PriceBreakdown::compute(
            Money::new(1000),
            &[],
            None,
            ResortId::new(),
            date(2025, 1, 6),
            date(2025, 1, 7),
        );
        assert_eq!(breakdown.nights, 1);
        assert_eq!(breakdown.discount, Money::ZERO);
        assert_eq!(breakdown.total, Money::new(1015));
    }

    #[test]
    fn flat_coupon_never_exceeds_subtotal() {
        let resort_id = ResortId::new();
        let coupon = Coupon {
            code: CouponCode::new("HUGE"),
            kind: DiscountKind::Flat,
            value: 1_000_000,
            day_type: CouponDayType::All,
            resort_id: None,
            created_at: Utc::now(),
        };
        let breakdown = PriceBreakdown::compute(
            Money::new(500),
            &[],
            Some(&coupon),
            resort_id,
            date(2025, 1, 6),
            date(2025, 1, 8),
        );
        assert_eq!(breakdown.discount, breakdown.subtotal);
        assert_eq!(breakdown.total, Money::ZERO);
    }

    #[test]
    fn extreme_rates_clamp_instead_of_wrapping() {
        // A nightly rate near the representable maximum, priced for three
        // nights, must clamp rather than wrap into a small total. The admin
        // surface caps rates at Money::MAX_PRICE, so this only guards data
        // written around the API.
        let breakdown = PriceBreakdown::compute(
            Money::new(u64::MAX / 2),
            &[],
            None,
            ResortId::new(),
            date(2025, 1, 6),
            date(2025, 1, 9),
        );
        assert_eq!(breakdown.nights, 3);
        assert_eq!(breakdown.base_price, Money::new(u64::MAX));
        assert_eq!(breakdown.subtotal, Money::new(u64::MAX));
        assert!(breakdown.total >= breakdown.base_price.saturating_sub(breakdown.discount));
        assert!(breakdown.platform_fee <= breakdown.subtotal);
    }

    #[test]
    fn inapplicable_coupon_contributes_nothing() {
        let resort_id = ResortId::new();
        let weekend_only = Coupon {
            code: CouponCode::new("WKND"),
            kind: DiscountKind::Percentage,
            value: 50,
            day_type: CouponDayType::Weekend,
            resort_id: None,
            created_at: Utc::now(),
        };
        // Monday check-in.
        let breakdown = PriceBreakdown::compute(
            Money::new(1000),
            &[],
            Some(&weekend_only),
            resort_id,
            date(2025, 1, 6),
            date(2025, 1, 8),
        );
        assert_eq!(breakdown.discount, Money::ZERO);
        assert_eq!(breakdown.total, breakdown.subtotal);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_date() -> impl Strategy<Value = NaiveDate> {
            // Any day across several years; keeps the weekday cycle honest.
            (0i64..3650).prop_map(|offset| {
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
            })
        }

        proptest! {
            #[test]
            fn every_date_classifies(d in arb_date()) {
                // Classification is total; parse/as_str agree.
                let day = DayType::classify(d);
                prop_assert_eq!(DayType::parse(day.as_str()), Some(day));
            }

            #[test]
            fn totals_never_go_negative_and_sum_back(
                nightly in 1u64..100_000,
                extra_nights in 0i64..60,
                value in 0u64..200,
                d in arb_date(),
            ) {
                let check_in = d;
                let check_out = d + chrono::Duration::days(1 + extra_nights);
                let coupon = percentage_coupon(value);
                let b = PriceBreakdown::compute(
                    Money::new(nightly),
                    &[],
                    Some(&coupon),
                    ResortId::new(),
                    check_in,
                    check_out,
                );
                prop_assert!(b.discount <= b.subtotal);
                prop_assert_eq!(b.total + b.discount, b.subtotal);
                prop_assert_eq!(b.base_price + b.platform_fee, b.subtotal);
            }

            #[test]
            fn nights_are_at_least_one(d in arb_date(), extra in 0i64..365) {
                let nights = nights_between(d, d + chrono::Duration::days(1 + extra));
                prop_assert!(nights >= 1);
                prop_assert_eq!(nights, 1 + u64::try_from(extra).unwrap());
            }
        }
    }
}
