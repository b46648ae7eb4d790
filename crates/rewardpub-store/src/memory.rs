use rewardpub_types::{EpochId, PublicationRecord};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, StoreError};
use crate::store::{check_upsert, PublishStateStore};

/// In-memory store implementation.
/// Suitable for testing and dry runs. Clones share the same records, which lets a
/// test drop a publisher and build a new one over the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    records: Arc<Mutex<BTreeMap<EpochId, PublicationRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `Unavailable` until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }

    fn records(&self) -> std::sync::MutexGuard<'_, BTreeMap<EpochId, PublicationRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PublishStateStore for MemoryStateStore {
    fn get(&self, epoch_id: EpochId) -> Result<Option<PublicationRecord>> {
        self.check_available()?;
        Ok(self.records().get(&epoch_id).cloned())
    }

    fn upsert(&self, record: &PublicationRecord) -> Result<()> {
        self.check_available()?;
        let mut records = self.records();
        check_upsert(records.get(&record.epoch_id), record)?;
        records.insert(record.epoch_id, record.clone());
        Ok(())
    }

    fn list_incomplete(&self) -> Result<Vec<PublicationRecord>> {
        self.check_available()?;
        Ok(self
            .records()
            .values()
            .filter(|r| !r.is_terminal())
            .cloned()
            .collect())
    }

    fn last_epoch_id(&self) -> Result<Option<EpochId>> {
        self.check_available()?;
        Ok(self.records().keys().next_back().copied())
    }

    fn list(&self, limit: usize) -> Result<Vec<PublicationRecord>> {
        self.check_available()?;
        Ok(self.records().values().rev().take(limit).cloned().collect())
    }
}
