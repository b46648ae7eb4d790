use rewardpub_types::{
    Amount, CanonicalEncoding, Digest, EpochId, PipelineError, RecipientId, Result, RewardSet,
};
use sha2::{Digest as _, Sha256};

use crate::merkle::merkle_root;

/// Prefix of every canonical encoding
pub const DOMAIN_TAG: &[u8] = b"rewardpub/rewardset";

/// Canonical byte stream of a reward set:
/// tag, version u16, epoch u64, count u32, then `len u32 | recipient | amount u128`
/// per entry in ascending recipient order, all integers big-endian.
pub fn canonical_bytes(set: &RewardSet, encoding: CanonicalEncoding) -> Result<Vec<u8>> {
    let count = u32::try_from(set.len())
        .map_err(|_| PipelineError::InvalidRewardSet("too many recipients".to_string()))?;

    let mut buf = Vec::with_capacity(DOMAIN_TAG.len() + 14 + set.len() * 64);
    buf.extend_from_slice(DOMAIN_TAG);
    buf.extend_from_slice(&encoding.version().to_be_bytes());
    buf.extend_from_slice(&set.epoch_id().to_be_bytes());
    buf.extend_from_slice(&count.to_be_bytes());
    for (recipient, amount) in set.iter() {
        encode_entry(&mut buf, recipient, amount)?;
    }
    Ok(buf)
}

/// Digest of a reward set under the given encoding
pub fn compute_digest(set: &RewardSet, encoding: CanonicalEncoding) -> Result<Digest> {
    match encoding {
        CanonicalEncoding::FlatV1 => {
            let bytes = canonical_bytes(set, encoding)?;
            Ok(Digest(Sha256::digest(&bytes).into()))
        }
        CanonicalEncoding::MerkleV2 => merkle_root(set),
    }
}

pub(crate) fn encode_entry(buf: &mut Vec<u8>, recipient: &RecipientId, amount: &Amount) -> Result<()> {
    let len = u32::try_from(recipient.as_bytes().len()).map_err(|_| {
        PipelineError::InvalidRewardSet(format!("recipient id too long: {}", recipient))
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(recipient.as_bytes());
    buf.extend_from_slice(&amount.to_be_bytes());
    Ok(())
}

pub(crate) fn epoch_prefix(epoch_id: EpochId) -> [u8; 8] {
    epoch_id.to_be_bytes()
}
