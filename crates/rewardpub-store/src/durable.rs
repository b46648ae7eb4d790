use rewardpub_types::{EpochId, PublicationRecord};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::store::{check_upsert, PublishStateStore};

const PUBLICATIONS_TREE: &str = "publications";

/// sled-backed store. One tree keyed by big-endian epoch id so iteration order
/// matches epoch order; values are JSON-encoded records.
#[derive(Debug, Clone)]
pub struct SledStateStore {
    db: sled::Db,
    publications: sled::Tree,
}

fn key(epoch_id: EpochId) -> [u8; 8] {
    epoch_id.to_be_bytes()
}

fn epoch_of(key: &[u8]) -> Result<EpochId> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| StoreError::Corrupt {
        epoch_id: 0,
        reason: format!("key of length {}", key.len()),
    })?;
    Ok(EpochId::from_be_bytes(bytes))
}

fn decode(epoch_id: EpochId, bytes: &[u8]) -> Result<PublicationRecord> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        epoch_id,
        reason: e.to_string(),
    })
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        let publications = db.open_tree(PUBLICATIONS_TREE)?;
        info!(path = %path.display(), records = publications.len(), "opened state store");
        Ok(Self { db, publications })
    }

    fn decode_entry(entry: sled::Result<(sled::IVec, sled::IVec)>) -> Result<PublicationRecord> {
        let (k, v) = entry?;
        decode(epoch_of(&k)?, &v)
    }
}

impl PublishStateStore for SledStateStore {
    fn get(&self, epoch_id: EpochId) -> Result<Option<PublicationRecord>> {
        self.publications
            .get(key(epoch_id))?
            .map(|bytes| decode(epoch_id, &bytes))
            .transpose()
    }

    fn upsert(&self, record: &PublicationRecord) -> Result<()> {
        let k = key(record.epoch_id);
        let encoded = serde_json::to_vec(record).map_err(|e| StoreError::Corrupt {
            epoch_id: record.epoch_id,
            reason: e.to_string(),
        })?;

        // Validate against what is stored and swap only if it is still there
        loop {
            let current = self.publications.get(k)?;
            let existing = current
                .as_deref()
                .map(|bytes| decode(record.epoch_id, bytes))
                .transpose()?;
            check_upsert(existing.as_ref(), record)?;

            match self
                .publications
                .compare_and_swap(k, current, Some(encoded.clone()))?
            {
                Ok(()) => break,
                Err(_) => debug!(epoch_id = record.epoch_id, "record changed underneath, retrying"),
            }
        }

        self.db.flush()?;
        Ok(())
    }

    fn list_incomplete(&self) -> Result<Vec<PublicationRecord>> {
        let mut incomplete = Vec::new();
        for entry in self.publications.iter() {
            let record = Self::decode_entry(entry)?;
            if !record.is_terminal() {
                incomplete.push(record);
            }
        }
        Ok(incomplete)
    }

    fn last_epoch_id(&self) -> Result<Option<EpochId>> {
        self.publications
            .last()?
            .map(|(k, _)| epoch_of(&k))
            .transpose()
    }

    fn list(&self, limit: usize) -> Result<Vec<PublicationRecord>> {
        self.publications
            .iter()
            .rev()
            .take(limit)
            .map(Self::decode_entry)
            .collect()
    }
}
