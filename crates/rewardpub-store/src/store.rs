use rewardpub_types::{EpochId, PublicationRecord};

use crate::error::{Result, StoreError};

/// Durable home of every publication record.
/// Provides an abstraction that can be implemented in memory or on disk.
///
/// Every `upsert` is an atomic whole-record replacement and is visible to the
/// next read from the same process.
pub trait PublishStateStore: Send + Sync {
    /// Record for an epoch, if one was ever created
    fn get(&self, epoch_id: EpochId) -> Result<Option<PublicationRecord>>;

    /// Create a record or move an existing one forward.
    /// Rejects regressions and any write to a confirmed record.
    fn upsert(&self, record: &PublicationRecord) -> Result<()>;

    /// Records that are not yet confirmed, ascending by epoch
    fn list_incomplete(&self) -> Result<Vec<PublicationRecord>>;

    /// Highest epoch that has a record
    fn last_epoch_id(&self) -> Result<Option<EpochId>>;

    /// Newest records first, at most `limit`
    fn list(&self, limit: usize) -> Result<Vec<PublicationRecord>>;
}

/// Write validation shared by every backend
pub fn check_upsert(existing: Option<&PublicationRecord>, next: &PublicationRecord) -> Result<()> {
    let Some(current) = existing else {
        return Ok(());
    };

    let reject = |reason: String| StoreError::Rejected {
        epoch_id: next.epoch_id,
        reason,
    };

    if current.is_terminal() {
        return Err(reject("record is already confirmed".to_string()));
    }
    if !current.state.can_transition_to(&next.state) {
        return Err(reject(format!("{} -> {}", current.state, next.state)));
    }
    if current.commitment_digest.is_some() && current.commitment_digest != next.commitment_digest {
        return Err(reject("commitment digest cannot change once recorded".to_string()));
    }
    if current.signature_or_tx_ref.is_some()
        && current.signature_or_tx_ref != next.signature_or_tx_ref
    {
        return Err(reject("authorization cannot change once recorded".to_string()));
    }
    Ok(())
}
