use rewardpub_types::{
    CanonicalEncoding, Commitment, Epoch, PipelineError, Result, RewardSet,
};
use std::sync::Arc;
use tracing::debug;

use crate::canonical::compute_digest;
use crate::source::{RewardSource, SourceResponse};

/// Fetches an epoch's finalized rewards and turns them into a commitment
#[derive(Clone)]
pub struct CommitmentBuilder {
    source: Arc<dyn RewardSource>,
    encoding: CanonicalEncoding,
}

impl CommitmentBuilder {
    pub fn new(source: Arc<dyn RewardSource>, encoding: CanonicalEncoding) -> Self {
        Self { source, encoding }
    }

    pub fn encoding(&self) -> CanonicalEncoding {
        self.encoding
    }

    /// Fetch and canonicalize the reward set of `epoch`.
    /// `IncompleteData` when the source has not finalized it yet.
    pub async fn fetch_reward_set(&self, epoch: &Epoch) -> Result<RewardSet> {
        match self.source.fetch(epoch).await? {
            SourceResponse::NotFinalized => Err(PipelineError::IncompleteData(epoch.epoch_id)),
            SourceResponse::Finalized(entries) => RewardSet::from_entries(
                epoch.epoch_id,
                entries.into_iter().map(|e| (e.recipient, e.amount)),
            ),
        }
    }

    /// Build the commitment for `epoch`. Read-only.
    pub async fn build(&self, epoch: &Epoch) -> Result<Commitment> {
        let set = self.fetch_reward_set(epoch).await?;
        let commitment = commit(&set, self.encoding)?;
        debug!(
            epoch_id = epoch.epoch_id,
            recipients = commitment.recipient_count,
            digest = %commitment.digest,
            "built commitment"
        );
        Ok(commitment)
    }
}

/// Pure commitment of an already canonical reward set
pub fn commit(set: &RewardSet, encoding: CanonicalEncoding) -> Result<Commitment> {
    let recipient_count = u32::try_from(set.len())
        .map_err(|_| PipelineError::InvalidRewardSet("too many recipients".to_string()))?;
    Ok(Commitment {
        epoch_id: set.epoch_id(),
        digest: compute_digest(set, encoding)?,
        canonical_encoding_version: encoding.version(),
        recipient_count,
        total_amount: set.total()?,
    })
}
