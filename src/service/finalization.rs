use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::store::{MarketStore, MarketTx},
    models::{
        dealmodel::{Deal, DealType, NewDeal},
        offermodel::{AppointmentStatus, BidStatus},
        propertymodel::{ListingMode, Property},
    },
    service::{
        error::MarketError,
        notification_service::{dispatch_bidding_lapsed, dispatch_deal_closed, Notifier},
        ranking::{self, Selection},
    },
};

/// Who asked for bidding to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    /// The owner ending bidding early, or on time, by hand.
    Owner(Uuid),
    /// The sweeper, acting on deadlines that passed before this instant.
    Deadline(DateTime<Utc>),
}

#[derive(Debug, Clone, Serialize)]
pub struct Finalized {
    pub deal: Deal,
    pub property: Property,
    pub winner: Selection,
}

/// Turns a selected winner into a Deal. Every path that closes a property
/// (appointment completion, owner ending bidding, the deadline sweeper) goes
/// through [`FinalizationService::finalize_in`].
#[derive(Debug, Clone)]
pub struct FinalizationService {
    store: Arc<dyn MarketStore>,
    notifier: Arc<dyn Notifier>,
}

impl FinalizationService {
    pub fn new(store: Arc<dyn MarketStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Records `selection` as the outcome for the property inside `tx`.
    ///
    /// Re-reads the property under lock first; a property that is no longer
    /// available yields `AlreadyFinalized` before anything is written. The
    /// caller commits. On any error the caller must drop `tx` so nothing
    /// written here survives.
    pub async fn finalize_in(
        tx: &mut dyn MarketTx,
        property_id: Uuid,
        selection: &Selection,
    ) -> Result<Finalized, MarketError> {
        let property = tx
            .lock_property(property_id)
            .await?
            .ok_or(MarketError::NotFound("Property", property_id))?;

        if !property.is_available() {
            return Err(MarketError::AlreadyFinalized(property_id));
        }

        if selection.property_id() != property.id || selection.mode() != property.listing_mode {
            return Err(MarketError::InvalidState(
                "Selected offer does not match this listing".to_string(),
            ));
        }

        // The selection may have been computed from a stale read
        match selection {
            Selection::HighestBid(bid) => {
                let current = tx
                    .get_bid(bid.id)
                    .await?
                    .ok_or(MarketError::NotFound("Bid", bid.id))?;
                if current.status != BidStatus::Active || current.amount != bid.amount {
                    return Err(MarketError::InvalidState(
                        "Winning bid changed before it could be accepted".to_string(),
                    ));
                }
            }
            Selection::ChosenAppointment(appointment) => {
                let current = tx
                    .get_appointment(appointment.id)
                    .await?
                    .ok_or(MarketError::NotFound("Appointment", appointment.id))?;
                if current.status != AppointmentStatus::Completed {
                    return Err(MarketError::InvalidState(
                        "Chosen appointment is no longer completed".to_string(),
                    ));
                }
            }
        }

        let deal = tx
            .insert_deal(NewDeal {
                property_id: property.id,
                seller_id: property.owner_id,
                buyer_id: selection.buyer_id(),
                final_price: selection.final_price(&property),
                deal_type: DealType::from(property.listed_for),
            })
            .await?;

        match selection {
            Selection::HighestBid(bid) => {
                tx.set_bid_status(bid.id, BidStatus::Accepted).await?;
                let rejected = tx.reject_active_bids(property.id, Some(bid.id)).await?;
                tracing::debug!("Rejected {} losing bids on property {}", rejected, property.id);
            }
            Selection::ChosenAppointment(appointment) => {
                let cancelled = tx
                    .cancel_open_appointments(property.id, Some(appointment.id))
                    .await?;
                tracing::debug!(
                    "Cancelled {} other appointments on property {}",
                    cancelled,
                    property.id
                );
            }
        }

        if property.listing_mode == ListingMode::Bidding {
            tx.set_bidding_window(property.id, false, property.bidding_deadline)
                .await?;
        }
        let property = tx
            .set_property_status(property.id, property.listed_for.closed_status())
            .await?;

        Ok(Finalized {
            deal,
            property,
            winner: selection.clone(),
        })
    }

    /// Ends bidding on a property and closes it with the highest active bid.
    ///
    /// Ranking happens after the property is locked, so the accepted bid is
    /// the highest one at the moment of closing.
    pub async fn end_bidding(
        &self,
        property_id: Uuid,
        trigger: CloseTrigger,
    ) -> Result<Finalized, MarketError> {
        let mut tx = self.store.begin().await?;

        let property = tx
            .lock_property(property_id)
            .await?
            .ok_or(MarketError::NotFound("Property", property_id))?;

        if let CloseTrigger::Owner(caller) = trigger {
            if !property.is_owned_by(caller) {
                return Err(MarketError::Unauthorized(
                    "Only the owner can end bidding on this property".to_string(),
                ));
            }
        }

        // The listing may have changed since the sweeper listed it
        if let CloseTrigger::Deadline(now) = trigger {
            if !property.is_available() {
                return Err(MarketError::AlreadyFinalized(property_id));
            }
            if property.listing_mode != ListingMode::Bidding
                || !property.is_bidding
                || !property.deadline_passed(now)
            {
                return Err(MarketError::NotDue(property_id));
            }
        }

        if property.listing_mode != ListingMode::Bidding {
            return Err(MarketError::InvalidState(
                "Property is not listed for bidding".to_string(),
            ));
        }

        if !property.is_available() {
            return Err(MarketError::AlreadyFinalized(property_id));
        }

        let bids = tx.get_active_bids(property_id).await?;
        let selection = match ranking::select_highest_bid(property_id, &bids) {
            Ok(selection) => selection,
            Err(MarketError::NoWinner(_)) => {
                // Listing stays available, only the bidding window closes
                let property = tx
                    .set_bidding_window(property_id, false, property.bidding_deadline)
                    .await?;
                tx.commit().await?;

                tracing::info!("Bidding on property {} ended with no bids", property_id);
                if let CloseTrigger::Deadline(_) = trigger {
                    dispatch_bidding_lapsed(self.notifier.clone(), property);
                }
                return Err(MarketError::NoWinner(property_id));
            }
            Err(e) => return Err(e),
        };

        let finalized = Self::finalize_in(tx.as_mut(), property_id, &selection).await?;
        tx.commit().await?;

        tracing::info!(
            "Property {} closed by {}: deal {} with buyer {} at {}",
            property_id,
            match trigger {
                CloseTrigger::Owner(_) => "owner",
                CloseTrigger::Deadline(_) => "deadline sweep",
            },
            finalized.deal.id,
            finalized.deal.buyer_id,
            finalized.deal.final_price
        );
        self.announce(&finalized);

        Ok(finalized)
    }

    /// Sends the post-commit notifications for a closed property.
    pub fn announce(&self, finalized: &Finalized) {
        dispatch_deal_closed(
            self.notifier.clone(),
            finalized.property.clone(),
            finalized.deal.clone(),
        );
    }

    pub async fn deal_for_property(&self, property_id: Uuid) -> Result<Option<Deal>, MarketError> {
        let mut tx = self.store.begin().await?;
        let deal = tx.get_deal_for_property(property_id).await?;
        tx.commit().await?;
        Ok(deal)
    }
}
