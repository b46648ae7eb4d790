use thiserror::Error;

use crate::epoch::EpochId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),

    #[error("Incomplete data: epoch {0} is not finalized")]
    IncompleteData(EpochId),

    #[error("Key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Signing rejected: {0}")]
    SigningRejected(String),

    #[error("Publish rejected: {0}")]
    PublishRejected(String),

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("Confirmation timeout: {0}")]
    ConfirmationTimeout(String),

    #[error("State store unavailable: {0}")]
    StateStoreUnavailable(String),

    #[error("Invalid reward set: {0}")]
    InvalidRewardSet(String),

    #[error("Reward set mismatch for epoch {epoch_id}: stored {stored}, rebuilt {rebuilt}")]
    RewardSetMismatch {
        epoch_id: EpochId,
        stored: String,
        rebuilt: String,
    },

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// How the pipeline reacts to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry in the same state after backoff
    Retryable,
    /// Epoch not ready yet; leave it and try again next tick
    NotReady,
    /// Check the state store for an existing reference before anything else
    Reconcile,
    /// Give up for this tick and re-drive on the next one
    Deferred,
    /// Needs an operator; the epoch moves to `Failed` immediately
    Intervention,
    /// Stop the scheduler loop
    Fatal,
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::DataSourceUnavailable(_)
            | PipelineError::KeyUnavailable(_)
            | PipelineError::PublishRejected(_) => ErrorClass::Retryable,
            PipelineError::IncompleteData(_) => ErrorClass::NotReady,
            PipelineError::SigningRejected(_) => ErrorClass::Reconcile,
            PipelineError::ConfirmationTimeout(_) => ErrorClass::Deferred,
            PipelineError::InvalidRewardSet(_)
            | PipelineError::RewardSetMismatch { .. }
            | PipelineError::InvalidTransition(_)
            | PipelineError::TransactionReverted(_)
            | PipelineError::Config(_) => ErrorClass::Intervention,
            PipelineError::StateStoreUnavailable(_) => ErrorClass::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
