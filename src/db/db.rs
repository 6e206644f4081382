// db/db.rs
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    db::store::{MarketStore, MarketTx},
    models::propertymodel::{ListingMode, PropertyStatus},
};

const SWEEP_LEASE_NAME: &str = "deadline_sweeper";

#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .finish()
    }
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Email addresses for the given users, used by the mail notifier.
    pub async fn get_user_emails(
        &self,
        user_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, String)>, sqlx::Error> {
        sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, email FROM users WHERE id = ANY($1)"
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await
    }
}

/// One Postgres transaction. Dropping it without `commit` rolls back.
pub struct PgMarketTx {
    pub(crate) tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl MarketTx for PgMarketTx {
    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}

#[async_trait]
impl MarketStore for DBClient {
    async fn begin(&self) -> Result<Box<dyn MarketTx>, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgMarketTx { tx }))
    }

    async fn lapsed_bidding_properties(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM properties
            WHERE listing_mode = $1
            AND status = $2
            AND is_bidding = TRUE
            AND bidding_deadline IS NOT NULL
            AND bidding_deadline < $3
            ORDER BY bidding_deadline ASC
            "#
        )
        .bind(ListingMode::Bidding)
        .bind(PropertyStatus::Available)
        .bind(now)
        .fetch_all(&self.pool)
        .await
    }

    async fn claim_sweep(&self, instance_id: Uuid, lease: Duration) -> Result<bool, sqlx::Error> {
        let holder = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO sweeper_leases (name, holder_id, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            ON CONFLICT (name) DO UPDATE
            SET holder_id = EXCLUDED.holder_id, expires_at = EXCLUDED.expires_at
            WHERE sweeper_leases.expires_at < NOW()
            OR sweeper_leases.holder_id = EXCLUDED.holder_id
            RETURNING holder_id
            "#
        )
        .bind(SWEEP_LEASE_NAME)
        .bind(instance_id)
        .bind(lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(holder == Some(instance_id))
    }
}
