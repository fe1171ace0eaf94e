//! The PostgreSQL [`BookingStore`] implementation.
//!
//! All monetary columns are `BIGINT` whole currency units; enum-ish columns
//! store the `as_str` form of their domain type and are parsed back on read
//! (an unparseable value surfaces as [`StoreError::Corrupt`], never a
//! panic).
//!
//! The guarded insert serializes per (resort, check-in date) with a
//! transaction-scoped advisory lock: every admission for the same key queues
//! behind the lock, re-runs the shared contention check against committed
//! rows, and only then inserts. Row locks alone would not close the race —
//! two first-bookings for an empty date have no rows to lock.

use chrono::NaiveDate;
use lagoon_core::admission::{CoveringBooking, check_date_contention};
use lagoon_core::store::{
    BookingStore, InsertBookingError, NewBookingRecord, NewCoupon, NewPaymentProof, NewResort,
    NotificationRequest, OutboxEntry, ResortRemoval, ResortUpdate, StoreError, StoreFuture,
};
use lagoon_core::types::{
    BlockSource, BlockedDate, Booking, BookingId, BookingReference, BookingStatus, Coupon,
    CouponCode, CouponDayType, DayType, DiscountKind, DynamicPricingRule, Money, PaymentStatus,
    Resort, ResortId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

/// PostgreSQL-backed booking store.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool with short enforced timeouts and run nothing else;
    /// callers run [`crate::run_migrations`] separately at startup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the pool cannot be created.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(db_err)?;
        Ok(Self::new(pool))
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

fn money_from_db(value: i64, column: &str) -> Result<Money, StoreError> {
    u64::try_from(value)
        .map(Money::new)
        .map_err(|_| StoreError::Corrupt(format!("negative amount in {column}: {value}")))
}

fn money_to_db(value: Money) -> Result<i64, StoreError> {
    i64::try_from(value.amount())
        .map_err(|_| StoreError::Database(format!("amount {value} exceeds bigint range")))
}

fn count_from_db(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("negative count in {column}: {value}")))
}

fn row_to_resort(row: &PgRow) -> Result<Resort, StoreError> {
    Ok(Resort {
        id: ResortId::from_uuid(row.get("id")),
        name: row.get("name"),
        location: row.get("location"),
        base_price: money_from_db(row.get("base_price"), "resorts.base_price")?,
        available: row.get("available"),
        max_guests: count_from_db(row.get("max_guests"), "resorts.max_guests")?,
        display_rank: row.get("display_rank"),
        created_at: row.get("created_at"),
    })
}

fn row_to_rule(row: &PgRow) -> Result<DynamicPricingRule, StoreError> {
    let day_type: String = row.get("day_type");
    Ok(DynamicPricingRule {
        resort_id: ResortId::from_uuid(row.get("resort_id")),
        day_type: DayType::parse(&day_type)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown day type: {day_type}")))?,
        price: money_from_db(row.get("price"), "dynamic_pricing_rules.price")?,
    })
}

fn row_to_blocked_date(row: &PgRow) -> Result<BlockedDate, StoreError> {
    let source: String = row.get("source");
    Ok(BlockedDate {
        resort_id: ResortId::from_uuid(row.get("resort_id")),
        date: row.get("date"),
        source: BlockSource::parse(&source)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown block source: {source}")))?,
    })
}

fn row_to_coupon(row: &PgRow) -> Result<Coupon, StoreError> {
    let kind: String = row.get("kind");
    let day_type: String = row.get("day_type");
    let value: i64 = row.get("value");
    Ok(Coupon {
        code: CouponCode::new(row.get::<String, _>("code")),
        kind: DiscountKind::parse(&kind)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown discount kind: {kind}")))?,
        value: u64::try_from(value)
            .map_err(|_| StoreError::Corrupt(format!("negative coupon value: {value}")))?,
        day_type: CouponDayType::parse(&day_type)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown coupon day type: {day_type}")))?,
        resort_id: row
            .get::<Option<Uuid>, _>("resort_id")
            .map(ResortId::from_uuid),
        created_at: row.get("created_at"),
    })
}

fn row_to_booking(row: &PgRow) -> Result<Booking, StoreError> {
    let status: String = row.get("status");
    let payment_status: String = row.get("payment_status");
    Ok(Booking {
        id: BookingId::from_uuid(row.get("id")),
        resort_id: ResortId::from_uuid(row.get("resort_id")),
        guest_name: row.get("guest_name"),
        guest_email: row.get("guest_email"),
        guest_phone: row.get("guest_phone"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        guests: count_from_db(row.get("guests"), "bookings.guests")?,
        base_price: money_from_db(row.get("base_price"), "bookings.base_price")?,
        platform_fee: money_from_db(row.get("platform_fee"), "bookings.platform_fee")?,
        discount: money_from_db(row.get("discount"), "bookings.discount")?,
        total_price: money_from_db(row.get("total_price"), "bookings.total_price")?,
        reference: BookingReference::from_string(row.get("reference")),
        status: BookingStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown booking status: {status}")))?,
        payment_status: PaymentStatus::parse(&payment_status).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown payment status: {payment_status}"))
        })?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_covering(row: &PgRow) -> Result<CoveringBooking, StoreError> {
    let status: String = row.get("status");
    let payment_status: String = row.get("payment_status");
    Ok(CoveringBooking {
        status: BookingStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown booking status: {status}")))?,
        payment_status: PaymentStatus::parse(&payment_status).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown payment status: {payment_status}"))
        })?,
    })
}

fn row_to_outbox_entry(row: &PgRow) -> Result<OutboxEntry, StoreError> {
    let payload: serde_json::Value = row.get("payload");
    Ok(OutboxEntry {
        id: row.get("id"),
        payload: serde_json::from_value::<NotificationRequest>(payload)
            .map_err(|e| StoreError::Corrupt(format!("undecodable outbox payload: {e}")))?,
        created_at: row.get("created_at"),
    })
}

const BOOKING_COLUMNS: &str = r"
    id, resort_id, guest_name, guest_email, guest_phone, check_in, check_out,
    guests, base_price, platform_fee, discount, total_price, reference,
    status, payment_status, created_at, updated_at
";

// ============================================================================
// The trait implementation
// ============================================================================

impl BookingStore for PostgresBookingStore {
    fn list_resorts(&self) -> StoreFuture<'_, Vec<Resort>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT id, name, location, base_price, available, max_guests,
                       display_rank, created_at
                FROM resorts
                ORDER BY display_rank ASC, name ASC
                ",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

            rows.iter().map(row_to_resort).collect()
        })
    }

    fn resort(&self, id: ResortId) -> StoreFuture<'_, Option<Resort>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT id, name, location, base_price, available, max_guests,
                       display_rank, created_at
                FROM resorts
                WHERE id = $1
                ",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

            row.as_ref().map(row_to_resort).transpose()
        })
    }

    fn create_resort(&self, resort: NewResort) -> StoreFuture<'_, Resort> {
        Box::pin(async move {
            let id = ResortId::new();
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            let row = sqlx::query(
                r"
                INSERT INTO resorts (id, name, location, base_price, available,
                                     max_guests, display_rank)
                VALUES ($1, $2, $3, $4, TRUE, $5, $6)
                RETURNING id, name, location, base_price, available, max_guests,
                          display_rank, created_at
                ",
            )
            .bind(id.as_uuid())
            .bind(&resort.name)
            .bind(&resort.location)
            .bind(money_to_db(resort.base_price)?)
            .bind(i32::try_from(resort.max_guests).unwrap_or(i32::MAX))
            .bind(resort.display_rank)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

            for rule in &resort.pricing_rules {
                sqlx::query(
                    r"
                    INSERT INTO dynamic_pricing_rules (resort_id, day_type, price)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (resort_id, day_type) DO UPDATE SET price = EXCLUDED.price
                    ",
                )
                .bind(id.as_uuid())
                .bind(rule.day_type.as_str())
                .bind(money_to_db(rule.price)?)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }

            tx.commit().await.map_err(db_err)?;
            let created = row_to_resort(&row)?;
            tracing::info!(resort_id = %created.id, name = %created.name, "resort created");
            Ok(created)
        })
    }

    fn update_resort(
        &self,
        id: ResortId,
        update: ResortUpdate,
    ) -> StoreFuture<'_, Option<Resort>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            let Some(row) = sqlx::query(
                r"
                SELECT id, name, location, base_price, available, max_guests,
                       display_rank, created_at
                FROM resorts
                WHERE id = $1
                FOR UPDATE
                ",
            )
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            else {
                return Ok(None);
            };
            let mut resort = row_to_resort(&row)?;

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

            sqlx::query(
                r"
                UPDATE resorts
                SET name = $2, location = $3, base_price = $4, available = $5,
                    max_guests = $6, display_rank = $7
                WHERE id = $1
                ",
            )
            .bind(id.as_uuid())
            .bind(&resort.name)
            .bind(&resort.location)
            .bind(money_to_db(resort.base_price)?)
            .bind(resort.available)
            .bind(i32::try_from(resort.max_guests).unwrap_or(i32::MAX))
            .bind(resort.display_rank)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            // Rule sets are replaced wholesale, never patched.
            if let Some(rules) = update.pricing_rules {
                sqlx::query(r"DELETE FROM dynamic_pricing_rules WHERE resort_id = $1")
                    .bind(id.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                for rule in &rules {
                    sqlx::query(
                        r"
                        INSERT INTO dynamic_pricing_rules (resort_id, day_type, price)
                        VALUES ($1, $2, $3)
                        ON CONFLICT (resort_id, day_type) DO UPDATE SET price = EXCLUDED.price
                        ",
                    )
                    .bind(id.as_uuid())
                    .bind(rule.day_type.as_str())
                    .bind(money_to_db(rule.price)?)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }
            }

            tx.commit().await.map_err(db_err)?;
            Ok(Some(resort))
        })
    }

    fn remove_resort(&self, id: ResortId) -> StoreFuture<'_, Option<ResortRemoval>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            let exists: Option<(Uuid,)> =
                sqlx::query_as(r"SELECT id FROM resorts WHERE id = $1 FOR UPDATE")
                    .bind(id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_err)?;
            if exists.is_none() {
                return Ok(None);
            }

            let (referencing,): (i64,) =
                sqlx::query_as(r"SELECT COUNT(*) FROM bookings WHERE resort_id = $1")
                    .bind(id.as_uuid())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_err)?;

            let removal = if referencing > 0 {
                sqlx::query(r"UPDATE resorts SET available = FALSE WHERE id = $1")
                    .bind(id.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                ResortRemoval::Disabled
            } else {
                sqlx::query(r"DELETE FROM resorts WHERE id = $1")
                    .bind(id.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                ResortRemoval::Deleted
            };

            tx.commit().await.map_err(db_err)?;
            tracing::info!(resort_id = %id, outcome = ?removal, "resort removed");
            Ok(Some(removal))
        })
    }

    fn pricing_rules(&self, resort_id: ResortId) -> StoreFuture<'_, Vec<DynamicPricingRule>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT resort_id, day_type, price
                FROM dynamic_pricing_rules
                WHERE resort_id = $1
                ",
            )
            .bind(resort_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

            rows.iter().map(row_to_rule).collect()
        })
    }

    fn blocked_dates(&self, resort_id: ResortId) -> StoreFuture<'_, Vec<BlockedDate>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT resort_id, date, source
                FROM blocked_dates
                WHERE resort_id = $1
                ORDER BY date ASC
                ",
            )
            .bind(resort_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

            rows.iter().map(row_to_blocked_date).collect()
        })
    }

    fn add_blocked_date(
        &self,
        resort_id: ResortId,
        date: NaiveDate,
        source: BlockSource,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO blocked_dates (resort_id, date, source)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(resort_id.as_uuid())
            .bind(date)
            .bind(source.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
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
            let result = sqlx::query(
                r"DELETE FROM blocked_dates WHERE resort_id = $1 AND date = $2 AND source = $3",
            )
            .bind(resort_id.as_uuid())
            .bind(date)
            .bind(source.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn is_date_blocked(&self, resort_id: ResortId, date: NaiveDate) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let row: Option<(i32,)> = sqlx::query_as(
                r"SELECT 1 FROM blocked_dates WHERE resort_id = $1 AND date = $2 LIMIT 1",
            )
            .bind(resort_id.as_uuid())
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(row.is_some())
        })
    }

    fn list_coupons(&self) -> StoreFuture<'_, Vec<Coupon>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT code, kind, value, day_type, resort_id, created_at
                FROM coupons
                ORDER BY code ASC
                ",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

            rows.iter().map(row_to_coupon).collect()
        })
    }

    fn coupon<'a>(&'a self, code: &'a CouponCode) -> StoreFuture<'a, Option<Coupon>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT code, kind, value, day_type, resort_id, created_at
                FROM coupons
                WHERE code = $1
                ",
            )
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

            row.as_ref().map(row_to_coupon).transpose()
        })
    }

    fn create_coupon(&self, coupon: NewCoupon) -> StoreFuture<'_, Coupon> {
        Box::pin(async move {
            let value = i64::try_from(coupon.value)
                .map_err(|_| StoreError::Database("coupon value exceeds bigint range".into()))?;
            let row = sqlx::query(
                r"
                INSERT INTO coupons (code, kind, value, day_type, resort_id)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING code, kind, value, day_type, resort_id, created_at
                ",
            )
            .bind(coupon.code.as_str())
            .bind(coupon.kind.as_str())
            .bind(value)
            .bind(coupon.day_type.as_str())
            .bind(coupon.resort_id.map(|id| *id.as_uuid()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate {
                        entity: "coupon",
                        key: coupon.code.as_str().to_string(),
                    }
                } else {
                    db_err(e)
                }
            })?;

            row_to_coupon(&row)
        })
    }

    fn delete_coupon<'a>(&'a self, code: &'a CouponCode) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(r"DELETE FROM coupons WHERE code = $1")
                .bind(code.as_str())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn insert_booking(
        &self,
        booking: NewBookingRecord,
        proof: Option<NewPaymentProof>,
        notification: NotificationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Booking, InsertBookingError>> + Send + '_>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            // Serialize all admissions for this (resort, check-in date).
            // The lock is transaction-scoped: released on commit or rollback.
            sqlx::query(r"SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(format!("{}:{}", booking.resort_id, booking.check_in))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            let rows = sqlx::query(
                r"
                SELECT status, payment_status
                FROM bookings
                WHERE resort_id = $1 AND check_in <= $2 AND check_out > $2
                ",
            )
            .bind(booking.resort_id.as_uuid())
            .bind(booking.check_in)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err)?;
            let covering = rows
                .iter()
                .map(row_to_covering)
                .collect::<Result<Vec<_>, _>>()?;
            check_date_contention(&covering)?;

            let row = sqlx::query(&format!(
                r"
                INSERT INTO bookings (id, resort_id, guest_name, guest_email, guest_phone,
                                      check_in, check_out, guests, base_price, platform_fee,
                                      discount, total_price, reference, status, payment_status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                RETURNING {BOOKING_COLUMNS}
                "
            ))
            .bind(booking.id.as_uuid())
            .bind(booking.resort_id.as_uuid())
            .bind(&booking.guest_name)
            .bind(&booking.guest_email)
            .bind(&booking.guest_phone)
            .bind(booking.check_in)
            .bind(booking.check_out)
            .bind(i32::try_from(booking.guests).unwrap_or(i32::MAX))
            .bind(money_to_db(booking.base_price)?)
            .bind(money_to_db(booking.platform_fee)?)
            .bind(money_to_db(booking.discount)?)
            .bind(money_to_db(booking.total_price)?)
            .bind(booking.reference.as_str())
            .bind(booking.status.as_str())
            .bind(booking.payment_status.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate {
                        entity: "booking",
                        key: booking.id.to_string(),
                    }
                } else {
                    db_err(e)
                }
            })?;

            if let Some(proof) = &proof {
                sqlx::query(
                    r"
                    INSERT INTO payment_proofs (booking_id, transaction_id, card_last_four)
                    VALUES ($1, $2, $3)
                    ",
                )
                .bind(proof.booking_id.as_uuid())
                .bind(&proof.transaction_id)
                .bind(proof.card_last_four.as_deref())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }

            // Outbox row in the same transaction: notification dispatch can
            // never observe a booking that rolled back.
            let payload = serde_json::to_value(&notification)
                .map_err(|e| StoreError::Database(format!("unencodable outbox payload: {e}")))?;
            sqlx::query(r"INSERT INTO notification_outbox (id, payload) VALUES ($1, $2)")
                .bind(Uuid::new_v4())
                .bind(payload)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            tx.commit().await.map_err(db_err)?;
            metrics::counter!("lagoon_store_bookings_inserted_total").increment(1);
            Ok(row_to_booking(&row)?)
        })
    }

    fn booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                r"SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
            ))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

            row.as_ref().map(row_to_booking).transpose()
        })
    }

    fn list_bookings(&self, resort_id: Option<ResortId>) -> StoreFuture<'_, Vec<Booking>> {
        Box::pin(async move {
            let rows = match resort_id {
                Some(resort_id) => {
                    sqlx::query(&format!(
                        r"
                        SELECT {BOOKING_COLUMNS} FROM bookings
                        WHERE resort_id = $1
                        ORDER BY created_at DESC
                        "
                    ))
                    .bind(resort_id.as_uuid())
                    .fetch_all(&self.pool)
                    .await
                }
                None => {
                    sqlx::query(&format!(
                        r"SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC"
                    ))
                    .fetch_all(&self.pool)
                    .await
                }
            }
            .map_err(db_err)?;

            rows.iter().map(row_to_booking).collect()
        })
    }

    fn record_payment_proof(
        &self,
        booking_id: BookingId,
        transaction_id: String,
        card_last_four: Option<String>,
    ) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            let Some(row) = sqlx::query(&format!(
                r"SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
            ))
            .bind(booking_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            else {
                return Ok(None);
            };
            let mut booking = row_to_booking(&row)?;

            // Forward-only: a confirmed or cancelled booking keeps its state;
            // the proof is still recorded for the reconciler.
            if booking
                .status
                .can_transition_to(BookingStatus::PendingVerification)
            {
                let updated = sqlx::query(&format!(
                    r"
                    UPDATE bookings SET status = $2, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {BOOKING_COLUMNS}
                    "
                ))
                .bind(booking_id.as_uuid())
                .bind(BookingStatus::PendingVerification.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
                booking = row_to_booking(&updated)?;
            }

            // 0-or-1 proof per booking: resubmission replaces.
            sqlx::query(
                r"
                INSERT INTO payment_proofs (booking_id, transaction_id, card_last_four)
                VALUES ($1, $2, $3)
                ON CONFLICT (booking_id) DO UPDATE
                    SET transaction_id = EXCLUDED.transaction_id,
                        card_last_four = EXCLUDED.card_last_four,
                        created_at = NOW()
                ",
            )
            .bind(booking_id.as_uuid())
            .bind(&transaction_id)
            .bind(card_last_four.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            tx.commit().await.map_err(db_err)?;
            Ok(Some(booking))
        })
    }

    fn mark_paid(&self, booking_id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                r"
                UPDATE bookings
                SET payment_status = $2,
                    status = CASE WHEN status IN ($3, $4) THEN $5 ELSE status END,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING {BOOKING_COLUMNS}
                "
            ))
            .bind(booking_id.as_uuid())
            .bind(PaymentStatus::Paid.as_str())
            .bind(BookingStatus::PendingPayment.as_str())
            .bind(BookingStatus::PendingVerification.as_str())
            .bind(BookingStatus::Confirmed.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

            row.as_ref().map(row_to_booking).transpose()
        })
    }

    fn cancel_booking(&self, booking_id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                r"
                UPDATE bookings
                SET status = CASE WHEN status <> $2 THEN $2 ELSE status END,
                    updated_at = CASE WHEN status <> $2 THEN NOW() ELSE updated_at END
                WHERE id = $1
                RETURNING {BOOKING_COLUMNS}
                "
            ))
            .bind(booking_id.as_uuid())
            .bind(BookingStatus::Cancelled.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

            row.as_ref().map(row_to_booking).transpose()
        })
    }

    fn pending_notifications(&self, limit: u32) -> StoreFuture<'_, Vec<OutboxEntry>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT id, payload, created_at
                FROM notification_outbox
                WHERE dispatched_at IS NULL
                ORDER BY created_at ASC
                LIMIT $1
                ",
            )
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

            rows.iter().map(row_to_outbox_entry).collect()
        })
    }

    fn mark_notification_dispatched(&self, id: Uuid) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(r"UPDATE notification_outbox SET dispatched_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            Ok(())
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(r"SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            Ok(())
        })
    }
}
