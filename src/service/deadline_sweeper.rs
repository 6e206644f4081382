// service/deadline_sweeper.rs
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::{
    sync::watch,
    time::{interval, Interval, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{
    db::store::MarketStore,
    service::{
        error::MarketError,
        finalization::{CloseTrigger, FinalizationService, Finalized},
    },
};

/// Decides when the sweeper wakes up. Returning `None` stops it.
#[async_trait]
pub trait SweepScheduler: Send {
    async fn next_tick(&mut self) -> Option<DateTime<Utc>>;
}

/// Fixed-period ticks until the shutdown channel flips or its sender is dropped.
pub struct IntervalScheduler {
    interval: Interval,
    shutdown: watch::Receiver<bool>,
}

impl IntervalScheduler {
    pub fn new(period: Duration, shutdown: watch::Receiver<bool>) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, shutdown }
    }
}

#[async_trait]
impl SweepScheduler for IntervalScheduler {
    async fn next_tick(&mut self) -> Option<DateTime<Utc>> {
        if *self.shutdown.borrow() {
            return None;
        }
        tokio::select! {
            _ = self.interval.tick() => Some(Utc::now()),
            _ = self.shutdown.changed() => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub finalized: usize,
    pub no_winner: usize,
    pub already_closed: usize,
    pub failed: usize,
    /// Another instance held the sweep lease.
    pub skipped: bool,
}

impl SweepReport {
    pub fn touched(&self) -> usize {
        self.finalized + self.no_winner + self.already_closed + self.failed
    }

    fn record(&mut self, property_id: Uuid, outcome: Result<Finalized, MarketError>) {
        match outcome {
            Ok(_) => self.finalized += 1,
            Err(MarketError::NoWinner(_)) => self.no_winner += 1,
            // Closed or reopened between the query and the lock
            Err(MarketError::AlreadyFinalized(_)) | Err(MarketError::NotDue(_)) => {
                self.already_closed += 1
            }
            Err(e) => {
                tracing::error!("Sweeper failed to close property {}: {}", property_id, e);
                self.failed += 1;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeadlineSweeper {
    store: Arc<dyn MarketStore>,
    finalization: Arc<FinalizationService>,
    instance_id: Uuid,
    lease: Duration,
    concurrency: usize,
}

impl DeadlineSweeper {
    pub fn new(
        store: Arc<dyn MarketStore>,
        finalization: Arc<FinalizationService>,
        lease: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            finalization,
            instance_id: Uuid::new_v4(),
            lease,
            concurrency: concurrency.max(1),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Closes every bidding listing whose deadline passed before `now`.
    ///
    /// Each property is finalized in its own transaction, so one failure
    /// never blocks the rest of the batch.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport, MarketError> {
        if !self.store.claim_sweep(self.instance_id, self.lease).await? {
            tracing::debug!("Sweep lease held elsewhere, instance {} skipping", self.instance_id);
            return Ok(SweepReport {
                skipped: true,
                ..Default::default()
            });
        }

        let lapsed = self.store.lapsed_bidding_properties(now).await?;
        if lapsed.is_empty() {
            return Ok(SweepReport::default());
        }
        tracing::debug!("Sweeping {} lapsed bidding properties", lapsed.len());

        let outcomes: Vec<(Uuid, Result<Finalized, MarketError>)> = stream::iter(lapsed)
            .map(|property_id| {
                let finalization = self.finalization.clone();
                async move {
                    let outcome = finalization
                        .end_bidding(property_id, CloseTrigger::Deadline(now))
                        .await;
                    (property_id, outcome)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = SweepReport::default();
        for (property_id, outcome) in outcomes {
            report.record(property_id, outcome);
        }

        Ok(report)
    }

    pub async fn run<S: SweepScheduler>(self, mut scheduler: S) {
        tracing::info!("Deadline sweeper {} started", self.instance_id());

        while let Some(now) = scheduler.next_tick().await {
            match self.sweep_once(now).await {
                Ok(report) if report.touched() > 0 => tracing::info!(
                    "Sweep done: {} finalized, {} without bids, {} already closed, {} failed",
                    report.finalized,
                    report.no_winner,
                    report.already_closed,
                    report.failed
                ),
                Ok(_) => {}
                Err(e) => tracing::error!("Sweep failed: {}", e),
            }
        }

        tracing::info!("Deadline sweeper {} stopped", self.instance_id);
    }
}
