use async_trait::async_trait;
use rewardpub_types::{Amount, Epoch, RecipientId, Result};
use serde::{Deserialize, Serialize};

/// One payout as delivered by the data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEntry {
    pub recipient: RecipientId,
    pub amount: Amount,
}

impl From<(RecipientId, Amount)> for RewardEntry {
    fn from((recipient, amount): (RecipientId, Amount)) -> Self {
        RewardEntry { recipient, amount }
    }
}

/// What the data source knows about an epoch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceResponse {
    /// Final payouts, in whatever order the source produced them
    Finalized(Vec<RewardEntry>),
    /// The epoch's rewards are not final yet
    NotFinalized,
}

/// External source of finalized reward data.
/// Must be idempotent: the same epoch always yields the same payouts.
#[async_trait]
pub trait RewardSource: Send + Sync {
    /// Fetch the payouts for an epoch.
    /// Network failures and timeouts are reported as `DataSourceUnavailable`.
    async fn fetch(&self, epoch: &Epoch) -> Result<SourceResponse>;
}
