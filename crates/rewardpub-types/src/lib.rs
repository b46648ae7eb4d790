mod amount;
mod recipient;
mod epoch;
mod digest;
mod reward_set;
mod commitment;
mod publication;
mod error;
mod hex_bytes;
mod base_url;

pub use amount::Amount;
pub use recipient::RecipientId;
pub use epoch::{Epoch, EpochId};
pub use digest::Digest;
pub use reward_set::RewardSet;
pub use commitment::{CanonicalEncoding, Commitment};
pub use publication::{
    AttemptEntry, AuthorizationRef, PublicationRecord, PublicationState, Stage, HISTORY_LIMIT,
};
pub use error::{ErrorClass, PipelineError, Result};
pub use base_url::with_trailing_slash;

#[cfg(test)]
mod tests;
