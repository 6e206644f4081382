use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::propertymodel::ListingPurpose;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "deal_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DealType {
    Sale,
    Rent,
}

impl From<ListingPurpose> for DealType {
    fn from(purpose: ListingPurpose) -> Self {
        match purpose {
            ListingPurpose::Sell => DealType::Sale,
            ListingPurpose::Rent => DealType::Rent,
        }
    }
}

// Written once by finalization, never updated
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Deal {
    pub id: Uuid,
    pub property_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub final_price: i64,
    pub deal_type: DealType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDeal {
    pub property_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub final_price: i64,
    pub deal_type: DealType,
}
