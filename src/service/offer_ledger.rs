use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::store::MarketStore,
    models::{
        dealmodel::Deal,
        offermodel::{Appointment, AppointmentStatus, Bid, BidStatus},
        propertymodel::ListingMode,
    },
    service::{
        error::MarketError,
        finalization::FinalizationService,
        ranking,
    },
};

#[derive(Debug, Clone, Serialize)]
pub struct RankedBid {
    pub rank: usize,
    pub bid: Bid,
}

#[derive(Debug, Clone, Serialize)]
pub struct BidPlacement {
    pub bid: Bid,
    /// Position at the time of placing, for display only.
    pub rank: usize,
    pub replaced_existing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentRequest {
    pub appointment: Appointment,
    pub reactivated: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceOutcome {
    pub appointment: Appointment,
    pub is_finalized: bool,
    pub deal: Option<Deal>,
}

/// Accepts and validates bids and appointments. Every operation locks the
/// property row before reading offers, so checks like "higher than the
/// current maximum" are made against state no one else can change mid-way.
#[derive(Debug, Clone)]
pub struct OfferLedger {
    store: Arc<dyn MarketStore>,
    finalization: Arc<FinalizationService>,
}

impl OfferLedger {
    pub fn new(store: Arc<dyn MarketStore>, finalization: Arc<FinalizationService>) -> Self {
        Self { store, finalization }
    }

    pub async fn submit_bid(
        &self,
        property_id: Uuid,
        bidder_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<BidPlacement, MarketError> {
        if amount <= 0 {
            return Err(MarketError::Validation("Bid amount must be positive".to_string()));
        }

        let mut tx = self.store.begin().await?;

        let property = tx
            .lock_property(property_id)
            .await?
            .ok_or(MarketError::NotFound("Property", property_id))?;

        if property.is_owned_by(bidder_id) {
            return Err(MarketError::Unauthorized(
                "Owners cannot bid on their own property".to_string(),
            ));
        }
        if property.listing_mode != ListingMode::Bidding {
            return Err(MarketError::InvalidState(
                "Property is not listed for bidding".to_string(),
            ));
        }
        if !property.is_available() {
            return Err(MarketError::InvalidState("Property is not available".to_string()));
        }
        if property.deadline_passed(now) {
            return Err(MarketError::DeadlinePassed);
        }
        if !property.is_bidding {
            return Err(MarketError::InvalidState(
                "Property is not accepting bids".to_string(),
            ));
        }

        let active = tx.get_active_bids(property_id).await?;
        if let Some(current_max) = ranking::current_max_amount(&active) {
            if amount <= current_max {
                return Err(MarketError::BidTooLow { amount, current_max });
            }
        }

        let existing = active.iter().find(|bid| bid.bidder_id == bidder_id);
        let replaced_existing = existing.is_some();
        let bid = match existing {
            Some(existing) => tx.update_bid_amount(existing.id, amount, now).await?,
            None => tx.insert_bid(property_id, bidder_id, amount, now).await?,
        };

        let active = tx.get_active_bids(property_id).await?;
        let rank = ranking::bid_rank(&active, bid.id).unwrap_or(1);

        tx.commit().await?;

        tracing::info!(
            "Bid {} on property {}: {} (rank {})",
            bid.id,
            property_id,
            amount,
            rank
        );

        Ok(BidPlacement { bid, rank, replaced_existing })
    }

    /// Bidders withdraw their own bid; owners remove any bid on their property.
    pub async fn remove_bid(&self, bid_id: Uuid, caller: Uuid) -> Result<Bid, MarketError> {
        let mut tx = self.store.begin().await?;

        let bid = tx
            .get_bid(bid_id)
            .await?
            .ok_or(MarketError::NotFound("Bid", bid_id))?;

        let property = tx
            .lock_property(bid.property_id)
            .await?
            .ok_or(MarketError::NotFound("Property", bid.property_id))?;

        // Re-read now that the property is locked
        let bid = tx
            .get_bid(bid_id)
            .await?
            .filter(|bid| bid.status == BidStatus::Active)
            .ok_or(MarketError::NotFound("Bid", bid_id))?;

        let status = if bid.bidder_id == caller {
            BidStatus::Withdrawn
        } else if property.is_owned_by(caller) {
            BidStatus::Rejected
        } else {
            return Err(MarketError::Unauthorized(
                "Only the bidder or the property owner can remove this bid".to_string(),
            ));
        };

        if !property.is_available() {
            return Err(MarketError::InvalidState(
                "Bids can only be removed while the property is available".to_string(),
            ));
        }

        let bid = tx.set_bid_status(bid_id, status).await?;
        tx.commit().await?;

        tracing::info!("Bid {} on property {} marked {:?}", bid_id, bid.property_id, status);
        Ok(bid)
    }

    pub async fn ranked_bids(&self, property_id: Uuid) -> Result<Vec<RankedBid>, MarketError> {
        let mut tx = self.store.begin().await?;

        tx.get_property(property_id)
            .await?
            .ok_or(MarketError::NotFound("Property", property_id))?;

        let active = tx.get_active_bids(property_id).await?;
        tx.commit().await?;

        Ok(ranking::rank_bids(&active)
            .into_iter()
            .enumerate()
            .map(|(index, bid)| RankedBid { rank: index + 1, bid })
            .collect())
    }

    pub async fn request_appointment(
        &self,
        property_id: Uuid,
        requester_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AppointmentRequest, MarketError> {
        let mut tx = self.store.begin().await?;

        let property = tx
            .lock_property(property_id)
            .await?
            .ok_or(MarketError::NotFound("Property", property_id))?;

        if property.is_owned_by(requester_id) {
            return Err(MarketError::Unauthorized(
                "Owners cannot book appointments on their own property".to_string(),
            ));
        }
        if property.listing_mode != ListingMode::AppointmentBased {
            return Err(MarketError::InvalidState(
                "Property does not take appointments".to_string(),
            ));
        }
        if !property.is_available() {
            return Err(MarketError::InvalidState("Property is not available".to_string()));
        }

        let existing = tx
            .get_latest_appointment_for_requester(property_id, requester_id)
            .await?;

        let request = match existing {
            Some(existing) if existing.status.is_open() => {
                return Err(MarketError::DuplicateActive);
            }
            Some(cancelled) => AppointmentRequest {
                appointment: tx
                    .set_appointment_status(cancelled.id, AppointmentStatus::Pending, now)
                    .await?,
                reactivated: true,
            },
            None => AppointmentRequest {
                appointment: tx.insert_appointment(property_id, requester_id, now).await?,
                reactivated: false,
            },
        };

        tx.commit().await?;

        tracing::info!(
            "Appointment {} requested on property {} by {}",
            request.appointment.id,
            property_id,
            requester_id
        );
        Ok(request)
    }

    /// Moves an appointment one step forward. Advancing a completed
    /// appointment closes the property with its requester as buyer.
    pub async fn advance_appointment(
        &self,
        appointment_id: Uuid,
        caller: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, MarketError> {
        let mut tx = self.store.begin().await?;

        let appointment = tx
            .get_appointment(appointment_id)
            .await?
            .ok_or(MarketError::NotFound("Appointment", appointment_id))?;

        let property = tx
            .lock_property(appointment.property_id)
            .await?
            .ok_or(MarketError::NotFound("Property", appointment.property_id))?;

        if !property.is_owned_by(caller) {
            return Err(MarketError::Unauthorized(
                "Only the property owner can advance appointments".to_string(),
            ));
        }

        let appointment = tx
            .get_appointment(appointment_id)
            .await?
            .ok_or(MarketError::NotFound("Appointment", appointment_id))?;

        match (appointment.status, appointment.status.next()) {
            (AppointmentStatus::Cancelled, _) => Err(MarketError::InvalidState(
                "Cancelled appointments cannot be advanced".to_string(),
            )),
            (AppointmentStatus::Completed, _) => {
                let selection = ranking::select_appointment(&property, appointment.clone())?;
                let finalized =
                    FinalizationService::finalize_in(tx.as_mut(), property.id, &selection).await?;
                tx.commit().await?;

                tracing::info!(
                    "Property {} closed from appointment {}: deal {}",
                    property.id,
                    appointment_id,
                    finalized.deal.id
                );
                self.finalization.announce(&finalized);

                Ok(AdvanceOutcome {
                    appointment,
                    is_finalized: true,
                    deal: Some(finalized.deal),
                })
            }
            (_, Some(next)) => {
                if !property.is_available() {
                    return Err(MarketError::InvalidState(
                        "Property is not available".to_string(),
                    ));
                }

                let appointment = tx.set_appointment_status(appointment_id, next, now).await?;
                tx.commit().await?;

                tracing::info!("Appointment {} advanced to {:?}", appointment_id, next);
                Ok(AdvanceOutcome {
                    appointment,
                    is_finalized: false,
                    deal: None,
                })
            }
            (status, None) => Err(MarketError::InvalidState(format!(
                "Appointment cannot advance from {:?}",
                status
            ))),
        }
    }

    /// Either party may cancel a pending or confirmed appointment; anyone
    /// else is refused.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        caller: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, MarketError> {
        let mut tx = self.store.begin().await?;

        let appointment = tx
            .get_appointment(appointment_id)
            .await?
            .ok_or(MarketError::NotFound("Appointment", appointment_id))?;

        let property = tx
            .lock_property(appointment.property_id)
            .await?
            .ok_or(MarketError::NotFound("Property", appointment.property_id))?;

        if appointment.requester_id != caller && !property.is_owned_by(caller) {
            return Err(MarketError::Unauthorized(
                "Only the requester or the property owner can cancel this appointment".to_string(),
            ));
        }

        let appointment = tx
            .get_appointment(appointment_id)
            .await?
            .ok_or(MarketError::NotFound("Appointment", appointment_id))?;

        match appointment.status {
            AppointmentStatus::Cancelled => {
                return Err(MarketError::InvalidState(
                    "Appointment is already cancelled".to_string(),
                ));
            }
            AppointmentStatus::Completed => {
                return Err(MarketError::InvalidState(
                    "Completed appointments cannot be cancelled".to_string(),
                ));
            }
            _ => {}
        }
        if !property.is_available() {
            return Err(MarketError::InvalidState(
                "Property is no longer available".to_string(),
            ));
        }

        let appointment = tx
            .set_appointment_status(appointment_id, AppointmentStatus::Cancelled, now)
            .await?;
        tx.commit().await?;

        tracing::info!("Appointment {} cancelled by {}", appointment_id, caller);
        Ok(appointment)
    }

    pub async fn property_appointments(
        &self,
        property_id: Uuid,
        caller: Uuid,
    ) -> Result<Vec<Appointment>, MarketError> {
        let mut tx = self.store.begin().await?;

        let property = tx
            .get_property(property_id)
            .await?
            .ok_or(MarketError::NotFound("Property", property_id))?;

        if !property.is_owned_by(caller) {
            return Err(MarketError::Unauthorized(
                "Only the property owner can list its appointments".to_string(),
            ));
        }

        let appointments = tx.get_property_appointments(property_id).await?;
        tx.commit().await?;
        Ok(appointments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::memory::{appointment_property, bidding_property},
        models::{dealmodel::DealType, propertymodel::{ListingPurpose, PropertyStatus}},
        service::{finalization::CloseTrigger, test_support::TestMarket},
    };
    use chrono::Duration;

    #[tokio::test]
    async fn equal_bid_from_another_bidder_is_too_low() {
        let market = TestMarket::new();
        let now = Utc::now();
        let property = market
            .store
            .insert_property(bidding_property(Uuid::new_v4(), now + Duration::hours(1)))
            .await;

        market.ledger.submit_bid(property.id, Uuid::new_v4(), 1000, now).await.unwrap();
        let tie = market.ledger.submit_bid(property.id, Uuid::new_v4(), 1000, now).await;

        assert!(matches!(tie, Err(MarketError::BidTooLow { amount: 1000, current_max: 1000 })));
    }

    #[tokio::test]
    async fn raising_a_bid_updates_it_in_place() {
        let market = TestMarket::new();
        let now = Utc::now();
        let bidder = Uuid::new_v4();
        let property = market
            .store
            .insert_property(bidding_property(Uuid::new_v4(), now + Duration::hours(1)))
            .await;

        let first = market.ledger.submit_bid(property.id, bidder, 1000, now).await.unwrap();
        let raised = market.ledger.submit_bid(property.id, bidder, 1200, now).await.unwrap();

        assert!(raised.replaced_existing);
        assert_eq!(raised.bid.id, first.bid.id);
        assert_eq!(raised.bid.amount, 1200);
        assert_eq!(market.store.snapshot().await.bids.len(), 1);
    }

    #[tokio::test]
    async fn bids_after_the_deadline_are_refused() {
        let market = TestMarket::new();
        let now = Utc::now();
        let property = market
            .store
            .insert_property(bidding_property(Uuid::new_v4(), now - Duration::minutes(1)))
            .await;

        let late = market.ledger.submit_bid(property.id, Uuid::new_v4(), 1000, now).await;
        assert!(matches!(late, Err(MarketError::DeadlinePassed)));
    }

    #[tokio::test]
    async fn bidding_on_wrong_mode_or_missing_property() {
        let market = TestMarket::new();
        let now = Utc::now();
        let property = market
            .store
            .insert_property(appointment_property(Uuid::new_v4(), ListingPurpose::Rent))
            .await;

        let wrong_mode = market.ledger.submit_bid(property.id, Uuid::new_v4(), 1000, now).await;
        assert!(matches!(wrong_mode, Err(MarketError::InvalidState(_))));

        let missing = market.ledger.submit_bid(Uuid::new_v4(), Uuid::new_v4(), 1000, now).await;
        assert!(matches!(missing, Err(MarketError::NotFound("Property", _))));
    }

    #[tokio::test]
    async fn withdrawing_twice_reports_not_found() {
        let market = TestMarket::new();
        let now = Utc::now();
        let bidder = Uuid::new_v4();
        let property = market
            .store
            .insert_property(bidding_property(Uuid::new_v4(), now + Duration::hours(1)))
            .await;
        let placed = market.ledger.submit_bid(property.id, bidder, 1000, now).await.unwrap();

        let stranger = market.ledger.remove_bid(placed.bid.id, Uuid::new_v4()).await;
        assert!(matches!(stranger, Err(MarketError::Unauthorized(_))));

        let withdrawn = market.ledger.remove_bid(placed.bid.id, bidder).await.unwrap();
        assert_eq!(withdrawn.status, BidStatus::Withdrawn);

        let again = market.ledger.remove_bid(placed.bid.id, bidder).await;
        assert!(matches!(again, Err(MarketError::NotFound("Bid", _))));

        // A withdrawn bidder may bid again, starting a fresh bid
        let fresh = market.ledger.submit_bid(property.id, bidder, 900, now).await.unwrap();
        assert!(!fresh.replaced_existing);
        assert_ne!(fresh.bid.id, placed.bid.id);
    }

    #[tokio::test]
    async fn owner_removal_rejects_the_bid() {
        let market = TestMarket::new();
        let now = Utc::now();
        let owner = Uuid::new_v4();
        let property = market
            .store
            .insert_property(bidding_property(owner, now + Duration::hours(1)))
            .await;
        let placed = market
            .ledger
            .submit_bid(property.id, Uuid::new_v4(), 1000, now)
            .await
            .unwrap();

        let removed = market.ledger.remove_bid(placed.bid.id, owner).await.unwrap();
        assert_eq!(removed.status, BidStatus::Rejected);
        assert!(market.ledger.ranked_bids(property.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn appointment_walkthrough_closes_the_property() {
        let market = TestMarket::new();
        let now = Utc::now();
        let owner = Uuid::new_v4();
        let (requester, other) = (Uuid::new_v4(), Uuid::new_v4());
        let property = market
            .store
            .insert_property(appointment_property(owner, ListingPurpose::Rent))
            .await;

        let chosen = market.ledger.request_appointment(property.id, requester, now).await.unwrap();
        let rival = market.ledger.request_appointment(property.id, other, now).await.unwrap();
        assert_eq!(chosen.appointment.status, AppointmentStatus::Pending);

        let id = chosen.appointment.id;
        let step = market.ledger.advance_appointment(id, owner, now).await.unwrap();
        assert_eq!(step.appointment.status, AppointmentStatus::Confirmed);
        assert!(!step.is_finalized);

        let step = market.ledger.advance_appointment(id, owner, now).await.unwrap();
        assert_eq!(step.appointment.status, AppointmentStatus::Completed);
        assert!(!step.is_finalized);

        let done = market.ledger.advance_appointment(id, owner, now).await.unwrap();
        assert!(done.is_finalized);
        let deal = done.deal.unwrap();
        assert_eq!(deal.buyer_id, requester);
        assert_eq!(deal.final_price, property.base_price);
        assert_eq!(deal.deal_type, DealType::Rent);

        let state = market.store.snapshot().await;
        assert_eq!(state.properties[&property.id].status, PropertyStatus::Rented);
        let rival = state.appointments.iter().find(|a| a.id == rival.appointment.id).unwrap();
        assert_eq!(rival.status, AppointmentStatus::Cancelled);
        let winner = state.appointments.iter().find(|a| a.id == id).unwrap();
        assert_eq!(winner.status, AppointmentStatus::Completed);

        let again = market.ledger.advance_appointment(id, owner, now).await;
        assert!(matches!(again, Err(MarketError::AlreadyFinalized(_))));
    }

    #[tokio::test]
    async fn only_the_owner_advances() {
        let market = TestMarket::new();
        let now = Utc::now();
        let requester = Uuid::new_v4();
        let property = market
            .store
            .insert_property(appointment_property(Uuid::new_v4(), ListingPurpose::Sell))
            .await;
        let request = market.ledger.request_appointment(property.id, requester, now).await.unwrap();

        let result = market
            .ledger
            .advance_appointment(request.appointment.id, requester, now)
            .await;
        assert!(matches!(result, Err(MarketError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn duplicate_requests_and_reactivation() {
        let market = TestMarket::new();
        let now = Utc::now();
        let requester = Uuid::new_v4();
        let property = market
            .store
            .insert_property(appointment_property(Uuid::new_v4(), ListingPurpose::Sell))
            .await;

        let first = market.ledger.request_appointment(property.id, requester, now).await.unwrap();
        let duplicate = market.ledger.request_appointment(property.id, requester, now).await;
        assert!(matches!(duplicate, Err(MarketError::DuplicateActive)));

        market
            .ledger
            .cancel_appointment(first.appointment.id, requester, now)
            .await
            .unwrap();
        let again = market.ledger.request_appointment(property.id, requester, now).await.unwrap();
        assert!(again.reactivated);
        assert_eq!(again.appointment.id, first.appointment.id);
        assert_eq!(again.appointment.status, AppointmentStatus::Pending);
        assert_eq!(market.store.snapshot().await.appointments.len(), 1);
    }

    #[tokio::test]
    async fn third_parties_cannot_cancel() {
        let market = TestMarket::new();
        let now = Utc::now();
        let owner = Uuid::new_v4();
        let property = market
            .store
            .insert_property(appointment_property(owner, ListingPurpose::Sell))
            .await;
        let request = market
            .ledger
            .request_appointment(property.id, Uuid::new_v4(), now)
            .await
            .unwrap();

        let stranger = market
            .ledger
            .cancel_appointment(request.appointment.id, Uuid::new_v4(), now)
            .await;
        assert!(matches!(stranger, Err(MarketError::Unauthorized(_))));

        let by_owner = market
            .ledger
            .cancel_appointment(request.appointment.id, owner, now)
            .await
            .unwrap();
        assert_eq!(by_owner.status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn completed_appointments_cannot_be_cancelled() {
        let market = TestMarket::new();
        let now = Utc::now();
        let owner = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let property = market
            .store
            .insert_property(appointment_property(owner, ListingPurpose::Sell))
            .await;
        let request = market.ledger.request_appointment(property.id, requester, now).await.unwrap();
        let id = request.appointment.id;
        market.ledger.advance_appointment(id, owner, now).await.unwrap();
        market.ledger.advance_appointment(id, owner, now).await.unwrap();

        let by_requester = market.ledger.cancel_appointment(id, requester, now).await;
        assert!(matches!(by_requester, Err(MarketError::InvalidState(_))));
        let by_owner = market.ledger.cancel_appointment(id, owner, now).await;
        assert!(matches!(by_owner, Err(MarketError::InvalidState(_))));

        let state = market.store.snapshot().await;
        let stored = state.appointments.iter().find(|a| a.id == id).unwrap();
        assert_eq!(stored.status, AppointmentStatus::Completed);

        let done = market.ledger.advance_appointment(id, owner, now).await.unwrap();
        assert!(done.is_finalized);
    }

    #[tokio::test]
    async fn late_bid_after_the_sweep_is_past_the_deadline() {
        let market = TestMarket::new();
        let now = Utc::now();
        let property = market
            .store
            .insert_property(bidding_property(Uuid::new_v4(), now - Duration::minutes(5)))
            .await;

        let swept = market
            .finalization
            .end_bidding(property.id, CloseTrigger::Deadline(now))
            .await;
        assert!(matches!(swept, Err(MarketError::NoWinner(_))));
        assert!(!market.store.property(property.id).await.is_bidding);

        let late = market.ledger.submit_bid(property.id, Uuid::new_v4(), 900, now).await;
        assert!(matches!(late, Err(MarketError::DeadlinePassed)));
    }
}
