use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "property_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    Available,
    Unavailable, // Disabled by the owner, can be re-opened
    Sold,
    Rented,
}

impl PropertyStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PropertyStatus::Sold | PropertyStatus::Rented)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "listing_mode", rename_all = "snake_case")]
#[serde(rename_all = "kebab-case")]
pub enum ListingMode {
    Bidding,
    AppointmentBased,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "listing_purpose", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingPurpose {
    Sell,
    Rent,
}

impl ListingPurpose {
    /// Status a property ends in once a deal closes it.
    pub fn closed_status(&self) -> PropertyStatus {
        match self {
            ListingPurpose::Sell => PropertyStatus::Sold,
            ListingPurpose::Rent => PropertyStatus::Rented,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub listing_mode: ListingMode,
    pub listed_for: ListingPurpose,
    pub status: PropertyStatus,
    pub base_price: i64,

    // Bidding window, only meaningful for ListingMode::Bidding
    pub is_bidding: bool,
    pub bidding_deadline: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    pub fn is_available(&self) -> bool {
        self.status == PropertyStatus::Available
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.bidding_deadline.map_or(false, |deadline| now > deadline)
    }
}
