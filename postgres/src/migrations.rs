//! Versioned, idempotent schema migrations.
//!
//! Migrations are an ordered list; each runs in its own transaction and
//! records its version in `schema_migrations`, so a restart re-applies
//! nothing and a new deployment applies only what it is missing.

use lagoon_core::store::StoreError;
use sqlx::PgPool;

/// One schema change. Statements run in order inside one transaction
/// together with the version bookkeeping row.
struct Migration {
    version: i64,
    name: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_resorts",
        statements: &[
            r"
            CREATE TABLE IF NOT EXISTS resorts (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                location TEXT NOT NULL,
                base_price BIGINT NOT NULL,
                available BOOLEAN NOT NULL DEFAULT TRUE,
                max_guests INTEGER NOT NULL,
                display_rank INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS dynamic_pricing_rules (
                resort_id UUID NOT NULL REFERENCES resorts(id) ON DELETE CASCADE,
                day_type TEXT NOT NULL,
                price BIGINT NOT NULL,
                PRIMARY KEY (resort_id, day_type)
            )
            ",
        ],
    },
    Migration {
        version: 2,
        name: "create_blocked_dates",
        statements: &[
            r"
            CREATE TABLE IF NOT EXISTS blocked_dates (
                resort_id UUID NOT NULL REFERENCES resorts(id) ON DELETE CASCADE,
                date DATE NOT NULL,
                source TEXT NOT NULL,
                PRIMARY KEY (resort_id, date, source)
            )
            ",
        ],
    },
    Migration {
        version: 3,
        name: "create_coupons",
        statements: &[
            r"
            CREATE TABLE IF NOT EXISTS coupons (
                code TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                value BIGINT NOT NULL,
                day_type TEXT NOT NULL,
                resort_id UUID REFERENCES resorts(id) ON DELETE SET NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        ],
    },
    Migration {
        version: 4,
        name: "create_bookings",
        statements: &[
            r"
            CREATE TABLE IF NOT EXISTS bookings (
                id UUID PRIMARY KEY,
                resort_id UUID NOT NULL REFERENCES resorts(id),
                guest_name TEXT NOT NULL,
                guest_email TEXT NOT NULL,
                guest_phone TEXT NOT NULL,
                check_in DATE NOT NULL,
                check_out DATE NOT NULL,
                guests INTEGER NOT NULL,
                base_price BIGINT NOT NULL,
                platform_fee BIGINT NOT NULL,
                discount BIGINT NOT NULL,
                total_price BIGINT NOT NULL,
                reference TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL,
                payment_status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT valid_stay CHECK (check_out > check_in)
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_bookings_resort_checkin
                ON bookings (resort_id, check_in)
            ",
        ],
    },
    Migration {
        version: 5,
        name: "create_payment_proofs",
        statements: &[
            r"
            CREATE TABLE IF NOT EXISTS payment_proofs (
                booking_id UUID PRIMARY KEY REFERENCES bookings(id) ON DELETE CASCADE,
                transaction_id TEXT NOT NULL,
                card_last_four TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        ],
    },
    Migration {
        version: 6,
        name: "create_notification_outbox",
        statements: &[
            r"
            CREATE TABLE IF NOT EXISTS notification_outbox (
                id UUID PRIMARY KEY,
                payload JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                dispatched_at TIMESTAMPTZ
            )
            ",
            r"
            CREATE INDEX IF NOT EXISTS idx_outbox_pending
                ON notification_outbox (created_at) WHERE dispatched_at IS NULL
            ",
        ],
    },
];

/// Apply every migration that has not yet run, in version order.
///
/// Safe to call on every startup; applied versions are skipped.
///
/// # Errors
///
/// Returns [`StoreError::Database`] when a statement fails; the failing
/// migration's transaction rolls back and its version is not recorded.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        ",
    )
    .execute(pool)
    .await
    .map_err(db_err)?;

    for migration in MIGRATIONS {
        let already_applied: Option<(i64,)> =
            sqlx::query_as(r"SELECT version FROM schema_migrations WHERE version = $1")
                .bind(migration.version)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?;
        if already_applied.is_some() {
            continue;
        }

        let mut tx = pool.begin().await.map_err(db_err)?;
        for statement in migration.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        sqlx::query(r"INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        tracing::info!(
            version = migration.version,
            name = migration.name,
            "schema migration applied"
        );
    }

    Ok(())
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_strictly_increasing() {
        let versions: Vec<i64> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted, "migration versions must be unique and ordered");
    }

    #[test]
    fn every_migration_has_statements() {
        for migration in MIGRATIONS {
            assert!(
                !migration.statements.is_empty(),
                "migration {} has no statements",
                migration.name
            );
        }
    }
}
