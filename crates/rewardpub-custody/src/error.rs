use rewardpub_types::PipelineError;
use thiserror::Error;

/// Failures reported by a key custody backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    /// Backend unreachable, timed out or key not loaded; safe to retry
    #[error("key unavailable: {0}")]
    KeyUnavailable(String),

    /// Policy rejection, replay or nonce conflict; reconcile before retrying
    #[error("signing rejected: {0}")]
    SigningRejected(String),
}

impl From<CustodyError> for PipelineError {
    fn from(err: CustodyError) -> Self {
        match err {
            CustodyError::KeyUnavailable(msg) => PipelineError::KeyUnavailable(msg),
            CustodyError::SigningRejected(msg) => PipelineError::SigningRejected(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, CustodyError>;
