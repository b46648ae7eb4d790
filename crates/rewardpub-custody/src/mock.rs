use async_trait::async_trait;
use rewardpub_types::Commitment;
use sha2::{Digest as _, Sha256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::custodian::{signing_message, KeyCustodian, SignatureRef, SigningDomain, TransactionRef};
use crate::error::{CustodyError, Result};
use crate::relay::TransactionRelay;

pub const MOCK_SIGNER: &str = "mock-signer";

/// Deterministic custodian for tests. Clones share counters and scripted failures.
#[derive(Debug, Clone, Default)]
pub struct MockCustodian {
    domain: SigningDomain,
    failures: Arc<Mutex<VecDeque<CustodyError>>>,
    signs: Arc<AtomicUsize>,
    submits: Arc<AtomicUsize>,
}

impl MockCustodian {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` sign or submit calls with `error`
    pub fn fail_next(&self, error: CustodyError, times: usize) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..times {
            failures.push_back(error.clone());
        }
    }

    /// Calls to `sign`, failed ones included
    pub fn sign_count(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }

    /// Calls to `submit`, failed ones included
    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self) -> Result<()> {
        match self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fingerprint(&self, commitment: &Commitment) -> [u8; 32] {
        Sha256::digest(signing_message(&self.domain, commitment)).into()
    }
}

#[async_trait]
impl KeyCustodian for MockCustodian {
    async fn sign(&self, commitment: &Commitment) -> Result<SignatureRef> {
        self.signs.fetch_add(1, Ordering::SeqCst);
        self.scripted_failure()?;
        Ok(SignatureRef {
            signer: MOCK_SIGNER.to_string(),
            signature: self.fingerprint(commitment).to_vec(),
        })
    }

    async fn submit(&self, commitment: &Commitment) -> Result<TransactionRef> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.scripted_failure()?;
        Ok(TransactionRef {
            tx_ref: format!("0x{}", hex::encode(self.fingerprint(commitment))),
        })
    }

    fn signer_id(&self) -> String {
        MOCK_SIGNER.to_string()
    }
}

/// Relay that records calldata instead of broadcasting it.
/// The returned hash is the SHA-256 of the calldata.
#[derive(Debug, Clone, Default)]
pub struct MockRelay {
    sent: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(tx_hash, calldata)` of every send, oldest first
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TransactionRelay for MockRelay {
    async fn send(&self, calldata: Vec<u8>) -> Result<String> {
        let tx_hash = format!("0x{}", hex::encode(Sha256::digest(&calldata)));
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((tx_hash.clone(), calldata));
        Ok(tx_hash)
    }
}
