use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::db::PgMarketTx,
    models::offermodel::{Bid, BidStatus},
};

#[async_trait]
pub trait BidExt: Send {
    async fn get_bid(
        &mut self,
        bid_id: Uuid,
    ) -> Result<Option<Bid>, sqlx::Error>;

    async fn get_active_bids(
        &mut self,
        property_id: Uuid,
    ) -> Result<Vec<Bid>, sqlx::Error>;

    async fn insert_bid(
        &mut self,
        property_id: Uuid,
        bidder_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Bid, sqlx::Error>;

    async fn update_bid_amount(
        &mut self,
        bid_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Bid, sqlx::Error>;

    async fn set_bid_status(
        &mut self,
        bid_id: Uuid,
        status: BidStatus,
    ) -> Result<Bid, sqlx::Error>;

    /// Rejects every active bid on the property except `keep`.
    async fn reject_active_bids(
        &mut self,
        property_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, sqlx::Error>;
}

#[async_trait]
impl BidExt for PgMarketTx {
    async fn get_bid(
        &mut self,
        bid_id: Uuid,
    ) -> Result<Option<Bid>, sqlx::Error> {
        sqlx::query_as::<_, Bid>(
            r#"
            SELECT id, property_id, bidder_id, amount, status, created_at, updated_at
            FROM bids
            WHERE id = $1
            "#
        )
        .bind(bid_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn get_active_bids(
        &mut self,
        property_id: Uuid,
    ) -> Result<Vec<Bid>, sqlx::Error> {
        sqlx::query_as::<_, Bid>(
            r#"
            SELECT id, property_id, bidder_id, amount, status, created_at, updated_at
            FROM bids
            WHERE property_id = $1 AND status = $2
            ORDER BY amount DESC, created_at ASC
            "#
        )
        .bind(property_id)
        .bind(BidStatus::Active)
        .fetch_all(&mut *self.tx)
        .await
    }

    async fn insert_bid(
        &mut self,
        property_id: Uuid,
        bidder_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Bid, sqlx::Error> {
        sqlx::query_as::<_, Bid>(
            r#"
            INSERT INTO bids (property_id, bidder_id, amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, property_id, bidder_id, amount, status, created_at, updated_at
            "#
        )
        .bind(property_id)
        .bind(bidder_id)
        .bind(amount)
        .bind(BidStatus::Active)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn update_bid_amount(
        &mut self,
        bid_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Bid, sqlx::Error> {
        sqlx::query_as::<_, Bid>(
            r#"
            UPDATE bids
            SET amount = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, property_id, bidder_id, amount, status, created_at, updated_at
            "#
        )
        .bind(bid_id)
        .bind(amount)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn set_bid_status(
        &mut self,
        bid_id: Uuid,
        status: BidStatus,
    ) -> Result<Bid, sqlx::Error> {
        sqlx::query_as::<_, Bid>(
            r#"
            UPDATE bids
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, property_id, bidder_id, amount, status, created_at, updated_at
            "#
        )
        .bind(bid_id)
        .bind(status)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn reject_active_bids(
        &mut self,
        property_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE bids
            SET status = $2, updated_at = NOW()
            WHERE property_id = $1
            AND status = $3
            AND ($4::uuid IS NULL OR id <> $4)
            "#
        )
        .bind(property_id)
        .bind(BidStatus::Rejected)
        .bind(BidStatus::Active)
        .bind(keep)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }
}
