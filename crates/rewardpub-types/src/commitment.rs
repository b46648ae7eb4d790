use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::digest::Digest;
use crate::epoch::EpochId;
use crate::error::{PipelineError, Result};

/// Canonical encoding scheme used to derive a commitment digest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanonicalEncoding {
    /// SHA-256 over the full canonical byte stream
    #[default]
    FlatV1,
    /// Merkle root over per-recipient leaves (allows inclusion proofs)
    MerkleV2,
}

impl CanonicalEncoding {
    pub const fn version(&self) -> u16 {
        match self {
            CanonicalEncoding::FlatV1 => 1,
            CanonicalEncoding::MerkleV2 => 2,
        }
    }

    pub fn from_version(version: u16) -> Result<Self> {
        match version {
            1 => Ok(CanonicalEncoding::FlatV1),
            2 => Ok(CanonicalEncoding::MerkleV2),
            other => Err(PipelineError::Config(format!(
                "unknown canonical encoding version {}",
                other
            ))),
        }
    }
}

/// Deterministic digest of a RewardSet, the payload that gets signed or submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub epoch_id: EpochId,
    pub digest: Digest,
    pub canonical_encoding_version: u16,
    pub recipient_count: u32,
    pub total_amount: Amount,
}

impl Commitment {
    /// Key handed to custody backends so they can detect replays
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.epoch_id, self.digest.to_hex())
    }
}
