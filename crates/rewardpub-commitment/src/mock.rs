use async_trait::async_trait;
use rewardpub_types::{Amount, Epoch, EpochId, PipelineError, RecipientId, Result};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::source::{RewardEntry, RewardSource, SourceResponse};

/// In-memory reward source with scriptable failures.
/// Epochs without configured rewards report `NotFinalized`.
#[derive(Debug, Clone, Default)]
pub struct MockRewardSource {
    rewards: Arc<Mutex<BTreeMap<EpochId, Vec<RewardEntry>>>>,
    failures: Arc<Mutex<BTreeMap<EpochId, VecDeque<PipelineError>>>>,
    fetches: Arc<AtomicUsize>,
}

impl MockRewardSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`MockRewardSource::set_rewards`]
    pub fn with_rewards<I, R>(self, epoch_id: EpochId, entries: I) -> Self
    where
        I: IntoIterator<Item = (R, u128)>,
        R: Into<RecipientId>,
    {
        self.set_rewards(epoch_id, entries);
        self
    }

    /// Finalize an epoch with the given payouts (kept in the given order)
    pub fn set_rewards<I, R>(&self, epoch_id: EpochId, entries: I)
    where
        I: IntoIterator<Item = (R, u128)>,
        R: Into<RecipientId>,
    {
        let entries = entries
            .into_iter()
            .map(|(recipient, amount)| RewardEntry {
                recipient: recipient.into(),
                amount: Amount::new(amount),
            })
            .collect();
        self.rewards
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(epoch_id, entries);
    }

    /// Make the next `times` fetches of `epoch_id` fail with `error`
    pub fn fail_next(&self, epoch_id: EpochId, error: PipelineError, times: usize) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = failures.entry(epoch_id).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// Number of fetch calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RewardSource for MockRewardSource {
    async fn fetch(&self, epoch: &Epoch) -> Result<SourceResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let scripted = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&epoch.epoch_id)
            .and_then(|queue| queue.pop_front());
        if let Some(error) = scripted {
            return Err(error);
        }

        let rewards = self.rewards.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(match rewards.get(&epoch.epoch_id) {
            Some(entries) => SourceResponse::Finalized(entries.clone()),
            None => SourceResponse::NotFinalized,
        })
    }
}
