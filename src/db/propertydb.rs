use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::db::PgMarketTx,
    models::propertymodel::{ListingMode, Property, PropertyStatus},
};

/// Listing store operations the core is allowed to perform.
#[async_trait]
pub trait PropertyExt: Send {
    async fn get_property(
        &mut self,
        property_id: Uuid,
    ) -> Result<Option<Property>, sqlx::Error>;

    /// Locking read. Holds the row until the unit of work ends.
    async fn lock_property(
        &mut self,
        property_id: Uuid,
    ) -> Result<Option<Property>, sqlx::Error>;

    async fn set_property_status(
        &mut self,
        property_id: Uuid,
        status: PropertyStatus,
    ) -> Result<Property, sqlx::Error>;

    async fn set_bidding_window(
        &mut self,
        property_id: Uuid,
        is_bidding: bool,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Property, sqlx::Error>;

    async fn set_listing_mode(
        &mut self,
        property_id: Uuid,
        mode: ListingMode,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Property, sqlx::Error>;

    /// Bids and appointments ever recorded against the property, in any status.
    async fn count_offers(
        &mut self,
        property_id: Uuid,
    ) -> Result<i64, sqlx::Error>;
}

#[async_trait]
impl PropertyExt for PgMarketTx {
    async fn get_property(
        &mut self,
        property_id: Uuid,
    ) -> Result<Option<Property>, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            r#"
            SELECT
                id, owner_id, title, listing_mode, listed_for, status,
                base_price, is_bidding, bidding_deadline, created_at, updated_at
            FROM properties
            WHERE id = $1
            "#
        )
        .bind(property_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn lock_property(
        &mut self,
        property_id: Uuid,
    ) -> Result<Option<Property>, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            r#"
            SELECT
                id, owner_id, title, listing_mode, listed_for, status,
                base_price, is_bidding, bidding_deadline, created_at, updated_at
            FROM properties
            WHERE id = $1
            FOR UPDATE
            "#
        )
        .bind(property_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn set_property_status(
        &mut self,
        property_id: Uuid,
        status: PropertyStatus,
    ) -> Result<Property, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, owner_id, title, listing_mode, listed_for, status,
                base_price, is_bidding, bidding_deadline, created_at, updated_at
            "#
        )
        .bind(property_id)
        .bind(status)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn set_bidding_window(
        &mut self,
        property_id: Uuid,
        is_bidding: bool,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Property, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties
            SET is_bidding = $2, bidding_deadline = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, owner_id, title, listing_mode, listed_for, status,
                base_price, is_bidding, bidding_deadline, created_at, updated_at
            "#
        )
        .bind(property_id)
        .bind(is_bidding)
        .bind(deadline)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn set_listing_mode(
        &mut self,
        property_id: Uuid,
        mode: ListingMode,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Property, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties
            SET listing_mode = $2,
                is_bidding = ($2 = 'bidding'::listing_mode),
                bidding_deadline = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, owner_id, title, listing_mode, listed_for, status,
                base_price, is_bidding, bidding_deadline, created_at, updated_at
            "#
        )
        .bind(property_id)
        .bind(mode)
        .bind(deadline)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn count_offers(
        &mut self,
        property_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM bids WHERE property_id = $1)
                + (SELECT COUNT(*) FROM appointments WHERE property_id = $1)
            "#
        )
        .bind(property_id)
        .fetch_one(&mut *self.tx)
        .await
    }
}
