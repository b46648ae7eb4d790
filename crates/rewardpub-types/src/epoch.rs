use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Epoch identifier (sequential counter from the anchor)
pub type EpochId = u64;

/// One reward cycle covering the half-open interval `[period_start, period_end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Epoch {
    pub epoch_id: EpochId,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl Epoch {
    pub fn new(epoch_id: EpochId, period_start: DateTime<Utc>, period_end: DateTime<Utc>) -> Self {
        Epoch {
            epoch_id,
            period_start,
            period_end,
        }
    }

    /// Whether `at` falls inside the period
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.period_start <= at && at < self.period_end
    }

    /// Whether the period is over at `now`
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.period_end <= now
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch {} [{}, {})",
            self.epoch_id,
            self.period_start.to_rfc3339(),
            self.period_end.to_rfc3339()
        )
    }
}
