use async_trait::async_trait;
use rewardpub_types::{AuthorizationRef, Commitment, EpochId, Result};
use serde::{Deserialize, Serialize};

/// What the publication target reports about an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmationStatus {
    /// Not seen yet
    Unknown,
    /// Seen but not final; `depth` counts confirmations so far
    Pending { depth: u64 },
    Confirmed,
}

/// Destination that makes a commitment visible to consumers
#[async_trait]
pub trait PublicationEndpoint: Send + Sync {
    /// Hand the authorized commitment over. Must tolerate being called again for
    /// the same epoch.
    async fn deliver(&self, commitment: &Commitment, authorization: &AuthorizationRef)
        -> Result<()>;

    /// Current confirmation status of an earlier delivery
    async fn confirmation(
        &self,
        epoch_id: EpochId,
        authorization: &AuthorizationRef,
    ) -> Result<ConfirmationStatus>;
}
