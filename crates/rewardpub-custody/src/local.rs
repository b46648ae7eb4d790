use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use rewardpub_types::{Commitment, Digest, EpochId};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::custodian::{signing_message, KeyCustodian, SignatureRef, SigningDomain, TransactionRef};
use crate::error::{CustodyError, Result};
use crate::relay::TransactionRelay;

/// secp256k1 key loaded from a local key file.
/// Meant for development and single-host deployments; production keys belong behind
/// the remote signer.
pub struct LocalKeyCustodian {
    signer: PrivateKeySigner,
    domain: SigningDomain,
    relay: Option<Arc<dyn TransactionRelay>>,
    /// Transactions sent by this process, by epoch
    submitted: Mutex<BTreeMap<EpochId, (Digest, String)>>,
}

impl LocalKeyCustodian {
    pub fn from_secret_bytes(secret: &[u8; 32], domain: SigningDomain) -> Result<Self> {
        let signer = PrivateKeySigner::from_bytes(&B256::from(*secret))
            .map_err(|e| CustodyError::KeyUnavailable(format!("invalid secp256k1 key: {}", e)))?;
        Ok(Self {
            signer,
            domain,
            relay: None,
            submitted: Mutex::new(BTreeMap::new()),
        })
    }

    /// Load a hex-encoded 32 byte secret (optionally `0x`-prefixed) from `path`
    pub fn from_key_file(path: &Path, domain: SigningDomain) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CustodyError::KeyUnavailable(format!("cannot read key file {}: {}", path.display(), e))
        })?;
        let trimmed = contents.trim();
        let raw = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
            .map_err(|_| CustodyError::KeyUnavailable("key file is not valid hex".to_string()))?;
        let secret: [u8; 32] = raw.try_into().map_err(|raw: Vec<u8>| {
            CustodyError::KeyUnavailable(format!("key must be 32 bytes, got {}", raw.len()))
        })?;

        let custodian = Self::from_secret_bytes(&secret, domain)?;
        info!(signer = %custodian.signer_id(), "loaded local signing key");
        Ok(custodian)
    }

    /// Relay used by [`KeyCustodian::submit`]
    pub fn with_relay(mut self, relay: Arc<dyn TransactionRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Wallet over the same key, for signing the transactions a relay sends
    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl fmt::Debug for LocalKeyCustodian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeyCustodian")
            .field("signer", &self.signer_id())
            .field("domain", &self.domain)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl KeyCustodian for LocalKeyCustodian {
    async fn sign(&self, commitment: &Commitment) -> Result<SignatureRef> {
        let message = signing_message(&self.domain, commitment);
        let signature = self
            .signer
            .sign_message_sync(&message)
            .map_err(|e| CustodyError::KeyUnavailable(format!("local signing failed: {}", e)))?;
        debug!(epoch_id = commitment.epoch_id, "signed commitment locally");
        Ok(SignatureRef {
            signer: self.signer_id(),
            signature: signature.as_bytes().to_vec(),
        })
    }

    async fn submit(&self, commitment: &Commitment) -> Result<TransactionRef> {
        let relay = self.relay.as_ref().ok_or_else(|| {
            CustodyError::KeyUnavailable("no transaction relay configured".to_string())
        })?;

        {
            let submitted = self.submitted.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((digest, tx_hash)) = submitted.get(&commitment.epoch_id) {
                if *digest != commitment.digest {
                    return Err(CustodyError::SigningRejected(format!(
                        "epoch {} already submitted with digest {}",
                        commitment.epoch_id, digest
                    )));
                }
                debug!(epoch_id = commitment.epoch_id, tx_hash = %tx_hash, "already submitted");
                return Ok(TransactionRef {
                    tx_ref: tx_hash.clone(),
                });
            }
        }

        let tx_hash = relay.send(signing_message(&self.domain, commitment)).await?;

        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(commitment.epoch_id, (commitment.digest, tx_hash.clone()));
        info!(epoch_id = commitment.epoch_id, tx_hash = %tx_hash, "sent commitment transaction");
        Ok(TransactionRef { tx_ref: tx_hash })
    }

    /// EIP-55 checksummed address of the key
    fn signer_id(&self) -> String {
        self.address().to_checksum(None)
    }
}
