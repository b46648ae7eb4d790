use async_trait::async_trait;
use rewardpub_types::{AuthorizationRef, Commitment, EpochId, PipelineError, Result};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::endpoint::{ConfirmationStatus, PublicationEndpoint};

/// Endpoint for tests. Confirms an epoch after a configurable number of polls.
/// Clones share all state.
#[derive(Debug, Clone, Default)]
pub struct MockEndpoint {
    delivered: Arc<Mutex<BTreeMap<EpochId, Commitment>>>,
    polls: Arc<Mutex<BTreeMap<EpochId, usize>>>,
    failures: Arc<Mutex<VecDeque<PipelineError>>>,
    deliveries: Arc<AtomicUsize>,
    pending_polls: Arc<AtomicUsize>,
    never_confirm: Arc<AtomicBool>,
}

impl MockEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `Pending` for the first `polls` confirmation checks of each epoch
    pub fn confirm_after(self, polls: usize) -> Self {
        self.pending_polls.store(polls, Ordering::SeqCst);
        self
    }

    pub fn set_never_confirm(&self, never: bool) {
        self.never_confirm.store(never, Ordering::SeqCst);
    }

    /// Fail the next `times` deliveries with `error`
    pub fn fail_next(&self, error: PipelineError, times: usize) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..times {
            failures.push_back(error.clone());
        }
    }

    /// Calls to `deliver`, failed ones included
    pub fn delivery_count(&self) -> usize {
        self.deliveries.load(Ordering::SeqCst)
    }

    pub fn delivered(&self, epoch_id: EpochId) -> Option<Commitment> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&epoch_id)
            .cloned()
    }
}

#[async_trait]
impl PublicationEndpoint for MockEndpoint {
    async fn deliver(
        &self,
        commitment: &Commitment,
        _authorization: &AuthorizationRef,
    ) -> Result<()> {
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = scripted {
            return Err(error);
        }
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(commitment.epoch_id, commitment.clone());
        Ok(())
    }

    async fn confirmation(
        &self,
        epoch_id: EpochId,
        _authorization: &AuthorizationRef,
    ) -> Result<ConfirmationStatus> {
        let delivered = self
            .delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&epoch_id);
        if !delivered {
            return Ok(ConfirmationStatus::Unknown);
        }
        if self.never_confirm.load(Ordering::SeqCst) {
            return Ok(ConfirmationStatus::Pending { depth: 0 });
        }

        let mut polls = self.polls.lock().unwrap_or_else(PoisonError::into_inner);
        let seen = polls.entry(epoch_id).or_insert(0);
        *seen += 1;
        let required = self.pending_polls.load(Ordering::SeqCst);
        Ok(if *seen > required {
            ConfirmationStatus::Confirmed
        } else {
            ConfirmationStatus::Pending { depth: *seen as u64 }
        })
    }
}
