use rewardpub_types::{EpochId, PipelineError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record for epoch {epoch_id}: {reason}")]
    Corrupt { epoch_id: EpochId, reason: String },

    #[error("rejected write for epoch {epoch_id}: {reason}")]
    Rejected { epoch_id: EpochId, reason: String },
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected { .. } => PipelineError::InvalidTransition(err.to_string()),
            StoreError::Unavailable(_) | StoreError::Corrupt { .. } => {
                PipelineError::StateStoreUnavailable(err.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
