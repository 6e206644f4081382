// Winner selection. Pure reads over offers already loaded by the caller.
use std::cmp::Ordering;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    models::{
        offermodel::{Appointment, AppointmentStatus, Bid, BidStatus},
        propertymodel::{ListingMode, Property},
    },
    service::error::MarketError,
};

/// The counterparty chosen to receive a property.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    HighestBid(Bid),
    ChosenAppointment(Appointment),
}

impl Selection {
    pub fn buyer_id(&self) -> Uuid {
        match self {
            Selection::HighestBid(bid) => bid.bidder_id,
            Selection::ChosenAppointment(appointment) => appointment.requester_id,
        }
    }

    pub fn property_id(&self) -> Uuid {
        match self {
            Selection::HighestBid(bid) => bid.property_id,
            Selection::ChosenAppointment(appointment) => appointment.property_id,
        }
    }

    pub fn mode(&self) -> ListingMode {
        match self {
            Selection::HighestBid(_) => ListingMode::Bidding,
            Selection::ChosenAppointment(_) => ListingMode::AppointmentBased,
        }
    }

    /// Winning bid amount, or the listed price when the owner picked an appointment.
    pub fn final_price(&self, property: &Property) -> i64 {
        match self {
            Selection::HighestBid(bid) => bid.amount,
            Selection::ChosenAppointment(_) => property.base_price,
        }
    }
}

/// Highest amount first, earliest submission breaks ties.
pub fn compare_bids(a: &Bid, b: &Bid) -> Ordering {
    b.amount
        .cmp(&a.amount)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn rank_bids(bids: &[Bid]) -> Vec<Bid> {
    let mut ranked: Vec<Bid> = bids
        .iter()
        .filter(|bid| bid.status == BidStatus::Active)
        .cloned()
        .collect();
    ranked.sort_by(compare_bids);
    ranked
}

/// 1-based position of `bid_id` among the active bids.
pub fn bid_rank(bids: &[Bid], bid_id: Uuid) -> Option<usize> {
    rank_bids(bids)
        .iter()
        .position(|bid| bid.id == bid_id)
        .map(|index| index + 1)
}

pub fn current_max_amount(bids: &[Bid]) -> Option<i64> {
    bids.iter()
        .filter(|bid| bid.status == BidStatus::Active)
        .map(|bid| bid.amount)
        .max()
}

pub fn select_highest_bid(property_id: Uuid, bids: &[Bid]) -> Result<Selection, MarketError> {
    rank_bids(bids)
        .into_iter()
        .next()
        .map(Selection::HighestBid)
        .ok_or(MarketError::NoWinner(property_id))
}

/// The owner's choice is authoritative in appointment mode; this only checks
/// that the choice is one that can win.
pub fn select_appointment(
    property: &Property,
    appointment: Appointment,
) -> Result<Selection, MarketError> {
    if appointment.property_id != property.id {
        return Err(MarketError::InvalidState(
            "Appointment does not belong to this property".to_string(),
        ));
    }
    if appointment.status != AppointmentStatus::Completed {
        return Err(MarketError::InvalidState(format!(
            "Appointment must be completed before it can win, it is {:?}",
            appointment.status
        )));
    }
    Ok(Selection::ChosenAppointment(appointment))
}
