//! Pricing hot-path benchmarks.
//!
//! Quote computation runs on every admission and on every availability
//! widget refresh, so it has to stay allocation-free and comfortably under
//! a microsecond.
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use chrono::{NaiveDate, Utc};
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use lagoon_core::pricing::{PriceBreakdown, resolve_nightly_rate};
use lagoon_core::types::{
    Coupon, CouponCode, CouponDayType, DayType, DiscountKind, DynamicPricingRule, Money, ResortId,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid benchmark date")
}

fn full_rule_set(resort_id: ResortId) -> Vec<DynamicPricingRule> {
    [
        (DayType::Weekday, 900),
        (DayType::Friday, 1200),
        (DayType::Weekend, 1500),
    ]
    .into_iter()
    .map(|(day_type, price)| DynamicPricingRule {
        resort_id,
        day_type,
        price: Money::new(price),
    })
    .collect()
}

fn benchmark_rate_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_resolution");
    group.throughput(Throughput::Elements(1));

    let resort_id = ResortId::new();
    let rules = full_rule_set(resort_id);
    let base = Money::new(1000);

    group.bench_function("rule_hit", |b| {
        // Saturday: the weekend rule matches.
        let check_in = date(2025, 1, 11);
        b.iter(|| resolve_nightly_rate(black_box(base), black_box(&rules), black_box(check_in)));
    });

    group.bench_function("base_fallback", |b| {
        let check_in = date(2025, 1, 6);
        b.iter(|| resolve_nightly_rate(black_box(base), black_box(&[]), black_box(check_in)));
    });

    group.finish();
}

fn benchmark_quote(c: &mut Criterion) {
    let mut group = c.benchmark_group("quote");
    group.throughput(Throughput::Elements(1));

    let resort_id = ResortId::new();
    let rules = full_rule_set(resort_id);
    let coupon = Coupon {
        code: CouponCode::new("SAVE10"),
        kind: DiscountKind::Percentage,
        value: 10,
        day_type: CouponDayType::All,
        resort_id: None,
        created_at: Utc::now(),
    };

    group.bench_function("two_nights_no_coupon", |b| {
        b.iter(|| {
            PriceBreakdown::compute(
                black_box(Money::new(1000)),
                black_box(&rules),
                None,
                resort_id,
                black_box(date(2025, 1, 6)),
                black_box(date(2025, 1, 8)),
            )
        });
    });

    group.bench_function("two_nights_percentage_coupon", |b| {
        b.iter(|| {
            PriceBreakdown::compute(
                black_box(Money::new(1000)),
                black_box(&rules),
                Some(black_box(&coupon)),
                resort_id,
                black_box(date(2025, 1, 6)),
                black_box(date(2025, 1, 8)),
            )
        });
    });

    group.bench_function("month_long_stay", |b| {
        b.iter(|| {
            PriceBreakdown::compute(
                black_box(Money::new(1000)),
                black_box(&rules),
                Some(black_box(&coupon)),
                resort_id,
                black_box(date(2025, 1, 6)),
                black_box(date(2025, 2, 6)),
            )
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_rate_resolution, benchmark_quote);
criterion_main!(benches);
