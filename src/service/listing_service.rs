use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::store::{MarketStore, MarketTx},
    models::propertymodel::{ListingMode, Property, PropertyStatus},
    service::error::MarketError,
};

#[derive(Debug, Clone, Serialize)]
pub struct DisableOutcome {
    pub property: Property,
    pub rejected_bids: u64,
    pub cancelled_appointments: u64,
}

/// Owner switches on a listing: disabling, re-enabling, changing mode.
#[derive(Debug, Clone)]
pub struct ListingService {
    store: Arc<dyn MarketStore>,
    reopen_extension: Duration,
}

impl ListingService {
    pub fn new(store: Arc<dyn MarketStore>, reopen_extension: Duration) -> Self {
        Self { store, reopen_extension }
    }

    async fn lock_owned(
        tx: &mut dyn MarketTx,
        property_id: Uuid,
        caller: Uuid,
    ) -> Result<Property, MarketError> {
        let property = tx
            .lock_property(property_id)
            .await?
            .ok_or(MarketError::NotFound("Property", property_id))?;

        if !property.is_owned_by(caller) {
            return Err(MarketError::Unauthorized(
                "Only the owner can change this listing".to_string(),
            ));
        }
        Ok(property)
    }

    /// Takes the listing off the market without a deal. Every active bid is
    /// rejected and every open appointment cancelled.
    pub async fn disable_property(
        &self,
        property_id: Uuid,
        caller: Uuid,
    ) -> Result<DisableOutcome, MarketError> {
        let mut tx = self.store.begin().await?;
        let property = Self::lock_owned(tx.as_mut(), property_id, caller).await?;

        if property.status != PropertyStatus::Available {
            return Err(MarketError::InvalidState(format!(
                "Only available properties can be disabled, this one is {:?}",
                property.status
            )));
        }

        let rejected_bids = tx.reject_active_bids(property_id, None).await?;
        let cancelled_appointments = tx.cancel_open_appointments(property_id, None).await?;
        tx.set_bidding_window(property_id, false, property.bidding_deadline)
            .await?;
        let property = tx
            .set_property_status(property_id, PropertyStatus::Unavailable)
            .await?;
        tx.commit().await?;

        tracing::info!(
            "Property {} disabled: {} bids rejected, {} appointments cancelled",
            property_id,
            rejected_bids,
            cancelled_appointments
        );

        Ok(DisableOutcome {
            property,
            rejected_bids,
            cancelled_appointments,
        })
    }

    /// Puts a disabled listing back on the market. Also reopens bidding on an
    /// available listing whose window closed without a winner. A deadline
    /// that is missing or already past moves to `now + reopen_extension`.
    pub async fn enable_property(
        &self,
        property_id: Uuid,
        caller: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Property, MarketError> {
        let mut tx = self.store.begin().await?;
        let property = Self::lock_owned(tx.as_mut(), property_id, caller).await?;

        let reopening_bidding = property.listing_mode == ListingMode::Bidding;
        match property.status {
            PropertyStatus::Unavailable => {}
            PropertyStatus::Available if reopening_bidding && !property.is_bidding => {}
            PropertyStatus::Available => {
                return Err(MarketError::InvalidState(
                    "Property is already available".to_string(),
                ));
            }
            PropertyStatus::Sold | PropertyStatus::Rented => {
                return Err(MarketError::InvalidState(
                    "Closed properties cannot be re-opened".to_string(),
                ));
            }
        }

        if reopening_bidding {
            let deadline = match property.bidding_deadline {
                Some(deadline) if deadline > now => deadline,
                _ => now + self.reopen_extension,
            };
            tx.set_bidding_window(property_id, true, Some(deadline)).await?;
            tracing::info!("Bidding on property {} reopened until {}", property_id, deadline);
        }

        let property = tx
            .set_property_status(property_id, PropertyStatus::Available)
            .await?;
        tx.commit().await?;

        tracing::info!("Property {} enabled", property_id);
        Ok(property)
    }

    /// Listing mode is fixed once any bid or appointment has been recorded.
    pub async fn change_listing_mode(
        &self,
        property_id: Uuid,
        caller: Uuid,
        mode: ListingMode,
        bidding_deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Property, MarketError> {
        let mut tx = self.store.begin().await?;
        let property = Self::lock_owned(tx.as_mut(), property_id, caller).await?;

        if property.status.is_terminal() {
            return Err(MarketError::InvalidState(
                "Closed properties cannot change listing mode".to_string(),
            ));
        }
        if tx.count_offers(property_id).await? > 0 {
            return Err(MarketError::InvalidState(
                "Listing mode cannot change once offers exist".to_string(),
            ));
        }

        let deadline = match mode {
            ListingMode::Bidding => match bidding_deadline {
                Some(deadline) if deadline > now => Some(deadline),
                Some(_) => {
                    return Err(MarketError::Validation(
                        "Bidding deadline must be in the future".to_string(),
                    ))
                }
                None => {
                    return Err(MarketError::Validation(
                        "A bidding deadline is required for bidding listings".to_string(),
                    ))
                }
            },
            ListingMode::AppointmentBased => None,
        };

        let property = tx.set_listing_mode(property_id, mode, deadline).await?;
        tx.commit().await?;

        tracing::info!("Property {} listing mode set to {:?}", property_id, mode);
        Ok(property)
    }
}
