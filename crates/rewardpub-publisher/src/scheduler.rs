//! Scheduler loop.
//!
//! Each tick either finishes the oldest unconfirmed epoch or starts the next due one,
//! never both. Epochs are therefore published strictly in order, and a stuck epoch
//! blocks everything after it until it is confirmed.
//!
//! **Shutdown:** cancellation wins over a pending tick and also interrupts a drive in
//! progress at its next step, backoff or confirmation poll. A network call that is in
//! flight completes (or times out) first.

use chrono::{DateTime, Utc};
use rewardpub_clock::EpochClock;
use rewardpub_store::PublishStateStore;
use rewardpub_types::{EpochId, PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::publisher::{DriveOutcome, Publisher};

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Nothing due
    Idle,
    Drove {
        epoch_id: EpochId,
        outcome: DriveOutcome,
    },
}

pub struct Scheduler {
    clock: EpochClock,
    publisher: Arc<Publisher>,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(clock: EpochClock, publisher: Arc<Publisher>, tick_interval: Duration) -> Self {
        Self {
            clock,
            publisher,
            tick_interval,
        }
    }

    fn store(&self) -> &Arc<dyn PublishStateStore> {
        self.publisher.store()
    }

    /// One pass of the loop at time `now`
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        self.tick_until(now, &CancellationToken::new()).await
    }

    async fn tick_until(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<TickOutcome> {
        let incomplete = self
            .store()
            .list_incomplete()
            .map_err(PipelineError::from)?;

        let epoch = match incomplete.first() {
            Some(record) => {
                if incomplete.len() > 1 {
                    debug!(
                        waiting = incomplete.len() - 1,
                        "later epochs wait for epoch {}", record.epoch_id
                    );
                }
                record.epoch()
            }
            None => {
                let last_known = self.store().last_epoch_id().map_err(PipelineError::from)?;
                match self.clock.current_due_epoch(now, last_known) {
                    Some(epoch) => {
                        info!(epoch_id = epoch.epoch_id, "epoch due");
                        epoch
                    }
                    None => return Ok(TickOutcome::Idle),
                }
            }
        };

        let outcome = self.publisher.drive_until(&epoch, cancel).await?;
        Ok(TickOutcome::Drove {
            epoch_id: epoch.epoch_id,
            outcome,
        })
    }

    /// Tick every `tick_interval` until `cancellation_token` fires.
    /// Per-epoch failures keep the loop going; a store outage stops it with an error.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        info!(tick_interval = ?self.tick_interval, "scheduler started");
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    info!("scheduler stopped");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }
            if cancellation_token.is_cancelled() {
                info!("scheduler stopped");
                return Ok(());
            }

            match self.tick_until(Utc::now(), &cancellation_token).await {
                Ok(TickOutcome::Idle) => debug!("nothing due"),
                Ok(TickOutcome::Drove {
                    epoch_id,
                    outcome: DriveOutcome::Failed(reason),
                }) => warn!(epoch_id, reason = %reason, "epoch failed, re-driving next tick"),
                Ok(TickOutcome::Drove { epoch_id, outcome }) => {
                    debug!(epoch_id, ?outcome, "tick done")
                }
                Err(err) => {
                    error!(error = %err, "scheduler halted");
                    return Err(err);
                }
            }
        }
    }
}
