use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{
    appointmentdb::AppointmentExt,
    biddb::BidExt,
    dealdb::DealExt,
    propertydb::PropertyExt,
};

/// Persistent home of properties, offers and deals.
///
/// Every change to marketplace state happens inside a [`MarketTx`]. Callers
/// lock the property row first with `lock_property`, which orders all writers
/// on the same property behind each other.
#[async_trait]
pub trait MarketStore: Send + Sync + std::fmt::Debug {
    async fn begin(&self) -> Result<Box<dyn MarketTx>, sqlx::Error>;

    /// Ids of bidding properties that are still open but whose deadline is
    /// before `now`.
    async fn lapsed_bidding_properties(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error>;

    /// Tries to take (or renew) the sweeper lease for `instance_id`.
    /// Returns false while another instance holds an unexpired lease.
    async fn claim_sweep(&self, instance_id: Uuid, lease: Duration) -> Result<bool, sqlx::Error>;
}

/// A unit of work. Nothing is visible to other callers until `commit`.
#[async_trait]
pub trait MarketTx: PropertyExt + BidExt + AppointmentExt + DealExt + Send {
    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error>;
}
