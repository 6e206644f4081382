use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::service::offer_ledger::RankedBid;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubmitBidDto {
    #[validate(range(min = 1, message = "Bid amount must be positive"))]
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceAppointmentDto {
    pub appointment_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedBidsDto {
    pub property_id: Uuid,
    pub results: usize,
    pub bids: Vec<RankedBid>,
}
