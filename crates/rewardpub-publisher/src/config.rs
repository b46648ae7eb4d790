use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where a confirmed commitment ends up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishTarget {
    /// Signed and handed to an off-chain consumer
    #[default]
    OffChain,
    /// Submitted as a transaction and confirmed on chain
    OnChain,
}

/// Bounded retries inside one drive of an epoch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Consecutive failures in one state before the epoch is parked in `Failed`
    pub max_attempts: u32,

    /// Wait after the first failure
    pub initial_backoff: Duration,

    /// Growth factor between consecutive waits
    pub multiplier: u32,

    /// Upper bound of a single wait
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Wait before the attempt following failure number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2,
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// How long and how often to poll for confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    /// Blocks on top of the inclusion block (inclusive) for on-chain targets
    pub required_confirmations: u64,

    pub poll_interval: Duration,

    /// Overall budget for one confirmation wait
    pub confirmation_timeout: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            required_confirmations: 12,
            poll_interval: Duration::from_secs(15),
            confirmation_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Configuration for the publisher
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub target: PublishTarget,
    pub retry: RetryPolicy,
    pub confirmation: ConfirmationPolicy,
}
