use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{dealmodel::Deal, propertymodel::ListingMode};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeListingModeDto {
    pub listing_mode: ListingMode,
    pub bidding_deadline: Option<DateTime<Utc>>,
}

/// Answer to an owner who asked to end bidding after the property closed.
#[derive(Debug, Serialize)]
pub struct AlreadyClosedDto {
    pub status: &'static str,
    pub message: String,
    pub deal: Option<Deal>,
}
