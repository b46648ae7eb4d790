mod source;
mod mock;
mod http;
mod canonical;
mod merkle;
mod builder;

pub use source::{RewardEntry, RewardSource, SourceResponse};
pub use mock::MockRewardSource;
pub use http::{HttpRewardSource, CHECKSUM_HEADER};
pub use canonical::{canonical_bytes, compute_digest, DOMAIN_TAG};
pub use merkle::{merkle_proof, merkle_root, MerkleProof, ProofStep};
pub use builder::{commit, CommitmentBuilder};

#[cfg(test)]
mod tests;
