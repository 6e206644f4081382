// In-memory store for tests. A unit of work holds the state lock for its
// whole lifetime and edits a copy that is written back only on commit.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    db::{
        appointmentdb::AppointmentExt,
        biddb::BidExt,
        dealdb::DealExt,
        propertydb::PropertyExt,
        store::{MarketStore, MarketTx},
    },
    models::{
        dealmodel::{Deal, NewDeal},
        offermodel::{Appointment, AppointmentStatus, Bid, BidStatus},
        propertymodel::{ListingMode, ListingPurpose, Property, PropertyStatus},
    },
};

#[derive(Debug, Default, Clone)]
pub struct MemoryState {
    pub properties: HashMap<Uuid, Property>,
    pub bids: Vec<Bid>,
    pub appointments: Vec<Appointment>,
    pub deals: Vec<Deal>,
    pub sweep_lease: Option<(Uuid, DateTime<Utc>)>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_deal_insert: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_property(&self, property: Property) -> Property {
        let mut state = self.state.lock().await;
        state.properties.insert(property.id, property.clone());
        property
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn property(&self, property_id: Uuid) -> Property {
        self.snapshot().await.properties[&property_id].clone()
    }

    pub async fn bid(&self, bid_id: Uuid) -> Bid {
        self.snapshot()
            .await
            .bids
            .into_iter()
            .find(|b| b.id == bid_id)
            .expect("bid exists")
    }

    /// Makes every following deal insert fail, to exercise rollback.
    pub fn fail_deal_inserts(&self, fail: bool) {
        self.fail_deal_insert.store(fail, Ordering::SeqCst);
    }
}

pub fn bidding_property(owner_id: Uuid, deadline: DateTime<Utc>) -> Property {
    let now = Utc::now();
    Property {
        id: Uuid::new_v4(),
        owner_id,
        title: "Three bedroom duplex".to_string(),
        listing_mode: ListingMode::Bidding,
        listed_for: ListingPurpose::Sell,
        status: PropertyStatus::Available,
        base_price: 500,
        is_bidding: true,
        bidding_deadline: Some(deadline),
        created_at: now,
        updated_at: now,
    }
}

pub fn appointment_property(owner_id: Uuid, listed_for: ListingPurpose) -> Property {
    let now = Utc::now();
    Property {
        id: Uuid::new_v4(),
        owner_id,
        title: "Studio apartment".to_string(),
        listing_mode: ListingMode::AppointmentBased,
        listed_for,
        status: PropertyStatus::Available,
        base_price: 2500,
        is_bidding: false,
        bidding_deadline: None,
        created_at: now,
        updated_at: now,
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_deal_insert: Arc<AtomicBool>,
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn MarketTx>, sqlx::Error> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            fail_deal_insert: self.fail_deal_insert.clone(),
        }))
    }

    async fn lapsed_bidding_properties(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let state = self.state.lock().await;
        let mut lapsed: Vec<&Property> = state
            .properties
            .values()
            .filter(|p| {
                p.listing_mode == ListingMode::Bidding
                    && p.status == PropertyStatus::Available
                    && p.is_bidding
                    && p.bidding_deadline.map_or(false, |d| d < now)
            })
            .collect();
        lapsed.sort_by_key(|p| p.bidding_deadline);
        Ok(lapsed.into_iter().map(|p| p.id).collect())
    }

    async fn claim_sweep(&self, instance_id: Uuid, lease: Duration) -> Result<bool, sqlx::Error> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let claimable = match state.sweep_lease {
            None => true,
            Some((holder, expires_at)) => holder == instance_id || expires_at < now,
        };
        if claimable {
            let lease = chrono::Duration::from_std(lease)
                .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
            state.sweep_lease = Some((instance_id, now + lease));
        }
        Ok(claimable)
    }
}

#[async_trait]
impl MarketTx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        let MemoryTx { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }
}

impl MemoryTx {
    fn property_mut(&mut self, property_id: Uuid) -> Result<&mut Property, sqlx::Error> {
        self.working
            .properties
            .get_mut(&property_id)
            .ok_or(sqlx::Error::RowNotFound)
    }

    fn bid_mut(&mut self, bid_id: Uuid) -> Result<&mut Bid, sqlx::Error> {
        self.working
            .bids
            .iter_mut()
            .find(|b| b.id == bid_id)
            .ok_or(sqlx::Error::RowNotFound)
    }

    fn appointment_mut(&mut self, appointment_id: Uuid) -> Result<&mut Appointment, sqlx::Error> {
        self.working
            .appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .ok_or(sqlx::Error::RowNotFound)
    }
}

#[async_trait]
impl PropertyExt for MemoryTx {
    async fn get_property(&mut self, property_id: Uuid) -> Result<Option<Property>, sqlx::Error> {
        Ok(self.working.properties.get(&property_id).cloned())
    }

    async fn lock_property(&mut self, property_id: Uuid) -> Result<Option<Property>, sqlx::Error> {
        // The whole state is already held by this unit of work
        self.get_property(property_id).await
    }

    async fn set_property_status(
        &mut self,
        property_id: Uuid,
        status: PropertyStatus,
    ) -> Result<Property, sqlx::Error> {
        let property = self.property_mut(property_id)?;
        property.status = status;
        property.updated_at = Utc::now();
        Ok(property.clone())
    }

    async fn set_bidding_window(
        &mut self,
        property_id: Uuid,
        is_bidding: bool,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Property, sqlx::Error> {
        let property = self.property_mut(property_id)?;
        property.is_bidding = is_bidding;
        property.bidding_deadline = deadline;
        property.updated_at = Utc::now();
        Ok(property.clone())
    }

    async fn set_listing_mode(
        &mut self,
        property_id: Uuid,
        mode: ListingMode,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Property, sqlx::Error> {
        let property = self.property_mut(property_id)?;
        property.listing_mode = mode;
        property.is_bidding = mode == ListingMode::Bidding;
        property.bidding_deadline = deadline;
        property.updated_at = Utc::now();
        Ok(property.clone())
    }

    async fn count_offers(&mut self, property_id: Uuid) -> Result<i64, sqlx::Error> {
        let bids = self.working.bids.iter().filter(|b| b.property_id == property_id).count();
        let appointments = self
            .working
            .appointments
            .iter()
            .filter(|a| a.property_id == property_id)
            .count();
        Ok((bids + appointments) as i64)
    }
}

#[async_trait]
impl BidExt for MemoryTx {
    async fn get_bid(&mut self, bid_id: Uuid) -> Result<Option<Bid>, sqlx::Error> {
        Ok(self.working.bids.iter().find(|b| b.id == bid_id).cloned())
    }

    async fn get_active_bids(&mut self, property_id: Uuid) -> Result<Vec<Bid>, sqlx::Error> {
        Ok(self
            .working
            .bids
            .iter()
            .filter(|b| b.property_id == property_id && b.status == BidStatus::Active)
            .cloned()
            .collect())
    }

    async fn insert_bid(
        &mut self,
        property_id: Uuid,
        bidder_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Bid, sqlx::Error> {
        let bid = Bid {
            id: Uuid::new_v4(),
            property_id,
            bidder_id,
            amount,
            status: BidStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.working.bids.push(bid.clone());
        Ok(bid)
    }

    async fn update_bid_amount(
        &mut self,
        bid_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Bid, sqlx::Error> {
        let bid = self.bid_mut(bid_id)?;
        bid.amount = amount;
        bid.updated_at = now;
        Ok(bid.clone())
    }

    async fn set_bid_status(&mut self, bid_id: Uuid, status: BidStatus) -> Result<Bid, sqlx::Error> {
        let bid = self.bid_mut(bid_id)?;
        bid.status = status;
        bid.updated_at = Utc::now();
        Ok(bid.clone())
    }

    async fn reject_active_bids(
        &mut self,
        property_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, sqlx::Error> {
        let mut rejected = 0;
        for bid in self.working.bids.iter_mut() {
            if bid.property_id == property_id
                && bid.status == BidStatus::Active
                && Some(bid.id) != keep
            {
                bid.status = BidStatus::Rejected;
                bid.updated_at = Utc::now();
                rejected += 1;
            }
        }
        Ok(rejected)
    }
}

#[async_trait]
impl AppointmentExt for MemoryTx {
    async fn get_appointment(
        &mut self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        Ok(self
            .working
            .appointments
            .iter()
            .find(|a| a.id == appointment_id)
            .cloned())
    }

    async fn get_latest_appointment_for_requester(
        &mut self,
        property_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        Ok(self
            .working
            .appointments
            .iter()
            .filter(|a| a.property_id == property_id && a.requester_id == requester_id)
            .max_by_key(|a| (a.status.is_open(), a.updated_at))
            .cloned())
    }

    async fn get_property_appointments(
        &mut self,
        property_id: Uuid,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        Ok(self
            .working
            .appointments
            .iter()
            .filter(|a| a.property_id == property_id)
            .cloned()
            .collect())
    }

    async fn insert_appointment(
        &mut self,
        property_id: Uuid,
        requester_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, sqlx::Error> {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            property_id,
            requester_id,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.working.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn set_appointment_status(
        &mut self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, sqlx::Error> {
        let appointment = self.appointment_mut(appointment_id)?;
        appointment.status = status;
        appointment.updated_at = now;
        Ok(appointment.clone())
    }

    async fn cancel_open_appointments(
        &mut self,
        property_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, sqlx::Error> {
        let mut cancelled = 0;
        for appointment in self.working.appointments.iter_mut() {
            if appointment.property_id == property_id
                && appointment.status.is_open()
                && Some(appointment.id) != keep
            {
                appointment.status = AppointmentStatus::Cancelled;
                appointment.updated_at = Utc::now();
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }
}

#[async_trait]
impl DealExt for MemoryTx {
    async fn insert_deal(&mut self, deal: NewDeal) -> Result<Deal, sqlx::Error> {
        if self.fail_deal_insert.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("injected deal insert failure".to_string()));
        }
        if self.working.deals.iter().any(|d| d.property_id == deal.property_id) {
            return Err(sqlx::Error::Protocol(format!(
                "duplicate deal for property {}",
                deal.property_id
            )));
        }

        let deal = Deal {
            id: Uuid::new_v4(),
            property_id: deal.property_id,
            seller_id: deal.seller_id,
            buyer_id: deal.buyer_id,
            final_price: deal.final_price,
            deal_type: deal.deal_type,
            created_at: Utc::now(),
        };
        self.working.deals.push(deal.clone());
        Ok(deal)
    }

    async fn get_deal_for_property(&mut self, property_id: Uuid) -> Result<Option<Deal>, sqlx::Error> {
        Ok(self
            .working
            .deals
            .iter()
            .find(|d| d.property_id == property_id)
            .cloned())
    }
}
