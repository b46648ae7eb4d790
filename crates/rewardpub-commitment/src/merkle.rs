//! Merkle commitment over per-recipient leaves.
//!
//! leaf = H(0x00 | epoch | len | recipient | amount), node = H(0x01 | left | right).
//! An odd node at the end of a level is promoted unchanged.

use rewardpub_types::{Amount, Digest, EpochId, RecipientId, Result, RewardSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::canonical::{encode_entry, epoch_prefix};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// One level of an inclusion proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Digest,
    pub sibling_on_left: bool,
}

/// Inclusion proof for a single recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: Digest,
    pub index: usize,
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Recompute the root from the leaf and compare
    pub fn verify(&self, root: &Digest) -> bool {
        let folded = self.steps.iter().fold(self.leaf, |acc, step| {
            if step.sibling_on_left {
                node_hash(&step.sibling, &acc)
            } else {
                node_hash(&acc, &step.sibling)
            }
        });
        folded == *root
    }
}

fn leaf_hash(epoch_id: EpochId, recipient: &RecipientId, amount: &Amount) -> Result<Digest> {
    let mut buf = vec![LEAF_PREFIX];
    buf.extend_from_slice(&epoch_prefix(epoch_id));
    encode_entry(&mut buf, recipient, amount)?;
    Ok(Digest(Sha256::digest(&buf).into()))
}

fn node_hash(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest(hasher.finalize().into())
}

fn empty_root(epoch_id: EpochId) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(epoch_prefix(epoch_id));
    Digest(hasher.finalize().into())
}

fn leaves(set: &RewardSet) -> Result<Vec<Digest>> {
    set.iter()
        .map(|(recipient, amount)| leaf_hash(set.epoch_id(), recipient, amount))
        .collect()
}

fn next_level(level: &[Digest]) -> Vec<Digest> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => node_hash(left, right),
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Merkle root of a reward set in canonical order
pub fn merkle_root(set: &RewardSet) -> Result<Digest> {
    let mut level = leaves(set)?;
    if level.is_empty() {
        return Ok(empty_root(set.epoch_id()));
    }
    while level.len() > 1 {
        level = next_level(&level);
    }
    Ok(level[0])
}

/// Inclusion proof for `recipient`, `None` if it is not in the set
pub fn merkle_proof(set: &RewardSet, recipient: &RecipientId) -> Result<Option<MerkleProof>> {
    let Some(index) = set.iter().position(|(r, _)| r == recipient) else {
        return Ok(None);
    };

    let mut level = leaves(set)?;
    let leaf = level[index];
    let mut position = index;
    let mut steps = Vec::new();
    while level.len() > 1 {
        let sibling = position ^ 1;
        if sibling < level.len() {
            steps.push(ProofStep {
                sibling: level[sibling],
                sibling_on_left: sibling < position,
            });
        }
        level = next_level(&level);
        position /= 2;
    }

    Ok(Some(MerkleProof { leaf, index, steps }))
}
