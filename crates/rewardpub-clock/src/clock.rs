use chrono::{DateTime, Duration, Utc};
use rewardpub_types::{Epoch, EpochId, PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Default reward cadence
pub const WEEK: std::time::Duration = std::time::Duration::from_secs(7 * 24 * 60 * 60);

/// Maps wall-clock time to reward epochs.
///
/// Epoch `n` covers `[anchor + n * cadence, anchor + (n + 1) * cadence)`. The clock holds
/// no mutable state: the last known epoch is always passed in from the state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochClock {
    anchor: DateTime<Utc>,
    cadence_ms: i64,
    start_epoch: Option<EpochId>,
}

impl EpochClock {
    /// Create a clock with the given anchor and cadence
    pub fn new(anchor: DateTime<Utc>, cadence: std::time::Duration) -> Result<Self> {
        let cadence_ms = i64::try_from(cadence.as_millis())
            .map_err(|_| PipelineError::Config("epoch cadence too large".to_string()))?;
        if cadence_ms <= 0 {
            return Err(PipelineError::Config(
                "epoch cadence must be at least one millisecond".to_string(),
            ));
        }
        Ok(EpochClock {
            anchor,
            cadence_ms,
            start_epoch: None,
        })
    }

    /// Weekly clock anchored at `anchor`
    pub fn weekly(anchor: DateTime<Utc>) -> Self {
        EpochClock {
            anchor,
            cadence_ms: WEEK.as_millis() as i64,
            start_epoch: None,
        }
    }

    /// First epoch to publish when the state store is empty
    pub fn with_start_epoch(mut self, start_epoch: Option<EpochId>) -> Self {
        self.start_epoch = start_epoch;
        self
    }

    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }

    pub fn cadence(&self) -> Duration {
        Duration::milliseconds(self.cadence_ms)
    }

    pub fn start_epoch(&self) -> Option<EpochId> {
        self.start_epoch
    }

    /// Period boundaries of `epoch_id`
    pub fn epoch_at(&self, epoch_id: EpochId) -> Result<Epoch> {
        let out_of_range =
            || PipelineError::Config(format!("epoch {} is out of the clock's range", epoch_id));
        let offset = i64::try_from(epoch_id)
            .ok()
            .and_then(|id| id.checked_mul(self.cadence_ms))
            .ok_or_else(out_of_range)?;
        let period_start = self
            .anchor
            .checked_add_signed(Duration::milliseconds(offset))
            .ok_or_else(out_of_range)?;
        let period_end = period_start
            .checked_add_signed(self.cadence())
            .ok_or_else(out_of_range)?;
        Ok(Epoch::new(epoch_id, period_start, period_end))
    }

    /// Epoch whose period contains `now`, `None` before the anchor
    pub fn epoch_containing(&self, now: DateTime<Utc>) -> Option<EpochId> {
        if now < self.anchor {
            return None;
        }
        let elapsed = (now - self.anchor).num_milliseconds();
        Some((elapsed / self.cadence_ms) as EpochId)
    }

    /// Latest epoch whose `period_end` is at or before `now`
    pub fn latest_completed(&self, now: DateTime<Utc>) -> Option<Epoch> {
        let current = self.epoch_containing(now)?;
        let completed = current.checked_sub(1)?;
        self.epoch_at(completed).ok()
    }

    /// Next epoch to publish, if its period has ended.
    ///
    /// Epochs are never skipped: after `last_known` the only candidate is
    /// `last_known + 1`. With an empty store the configured start epoch is used, or the
    /// latest completed epoch when none is configured.
    pub fn current_due_epoch(
        &self,
        now: DateTime<Utc>,
        last_known: Option<EpochId>,
    ) -> Option<Epoch> {
        let next = match (last_known, self.start_epoch) {
            (Some(last), _) => last.checked_add(1)?,
            (None, Some(start)) => start,
            (None, None) => self.latest_completed(now)?.epoch_id,
        };
        let epoch = self.epoch_at(next).ok()?;
        epoch.has_ended(now).then_some(epoch)
    }
}
