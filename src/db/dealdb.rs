use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::db::PgMarketTx,
    models::dealmodel::{Deal, NewDeal},
};

#[async_trait]
pub trait DealExt: Send {
    async fn insert_deal(
        &mut self,
        deal: NewDeal,
    ) -> Result<Deal, sqlx::Error>;

    async fn get_deal_for_property(
        &mut self,
        property_id: Uuid,
    ) -> Result<Option<Deal>, sqlx::Error>;
}

#[async_trait]
impl DealExt for PgMarketTx {
    async fn insert_deal(
        &mut self,
        deal: NewDeal,
    ) -> Result<Deal, sqlx::Error> {
        // deals.property_id is unique, a second insert fails the transaction
        sqlx::query_as::<_, Deal>(
            r#"
            INSERT INTO deals (property_id, seller_id, buyer_id, final_price, deal_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, property_id, seller_id, buyer_id, final_price, deal_type, created_at
            "#
        )
        .bind(deal.property_id)
        .bind(deal.seller_id)
        .bind(deal.buyer_id)
        .bind(deal.final_price)
        .bind(deal.deal_type)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn get_deal_for_property(
        &mut self,
        property_id: Uuid,
    ) -> Result<Option<Deal>, sqlx::Error> {
        sqlx::query_as::<_, Deal>(
            r#"
            SELECT id, property_id, seller_id, buyer_id, final_price, deal_type, created_at
            FROM deals
            WHERE property_id = $1
            "#
        )
        .bind(property_id)
        .fetch_optional(&mut *self.tx)
        .await
    }
}
