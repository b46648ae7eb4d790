use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::amount::Amount;
use crate::epoch::EpochId;
use crate::error::{PipelineError, Result};
use crate::recipient::RecipientId;

/// Finalized payout data for one epoch
/// Entries are held in canonical (byte-wise recipient) order regardless of source order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSet {
    epoch_id: EpochId,
    rewards: BTreeMap<RecipientId, Amount>,
}

impl RewardSet {
    /// Build from source entries; a recipient listed twice is an error, not a merge
    pub fn from_entries<I>(epoch_id: EpochId, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (RecipientId, Amount)>,
    {
        let mut rewards = BTreeMap::new();
        for (recipient, amount) in entries {
            if rewards.contains_key(&recipient) {
                return Err(PipelineError::InvalidRewardSet(format!(
                    "duplicate recipient {} in epoch {}",
                    recipient, epoch_id
                )));
            }
            rewards.insert(recipient, amount);
        }
        Ok(RewardSet { epoch_id, rewards })
    }

    pub fn epoch_id(&self) -> EpochId {
        self.epoch_id
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn get(&self, recipient: &RecipientId) -> Option<Amount> {
        self.rewards.get(recipient).copied()
    }

    /// Entries in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&RecipientId, &Amount)> {
        self.rewards.iter()
    }

    /// Sum of all payouts
    pub fn total(&self) -> Result<Amount> {
        self.rewards
            .values()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(*amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_recipient_rejected() {
        let result = RewardSet::from_entries(
            1,
            vec![
                (RecipientId::new("0xaa"), Amount::new(1)),
                (RecipientId::new("0xaa"), Amount::new(2)),
            ],
        );
        assert!(matches!(result, Err(PipelineError::InvalidRewardSet(_))));
    }

    #[test]
    fn test_canonical_order() {
        let set = RewardSet::from_entries(
            7,
            vec![
                (RecipientId::new("0xcc"), Amount::new(3)),
                (RecipientId::new("0xaa"), Amount::new(1)),
                (RecipientId::new("0xbb"), Amount::new(2)),
            ],
        )
        .unwrap();

        let order: Vec<&str> = set.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(order, vec!["0xaa", "0xbb", "0xcc"]);
        assert_eq!(set.total().unwrap(), Amount::new(6));
    }
}
