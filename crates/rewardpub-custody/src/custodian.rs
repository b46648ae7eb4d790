use async_trait::async_trait;
use rewardpub_types::{AuthorizationRef, Commitment};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix of every signed commitment message
pub const MESSAGE_TAG: &[u8] = b"rewardpub/commitment/v1";

/// Binds a signature to one deployment so it cannot be replayed elsewhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningDomain {
    pub name: String,
    pub chain_id: u64,
}

impl SigningDomain {
    pub fn new(name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            chain_id,
        }
    }
}

impl Default for SigningDomain {
    fn default() -> Self {
        Self::new("rewardpub", 1)
    }
}

/// Bytes a custodian signs for `commitment`:
/// tag, domain name, chain id u64, epoch u64, encoding version u16, digest.
pub fn signing_message(domain: &SigningDomain, commitment: &Commitment) -> Vec<u8> {
    let mut message = Vec::with_capacity(MESSAGE_TAG.len() + domain.name.len() + 50);
    message.extend_from_slice(MESSAGE_TAG);
    message.extend_from_slice(domain.name.as_bytes());
    message.extend_from_slice(&domain.chain_id.to_be_bytes());
    message.extend_from_slice(&commitment.epoch_id.to_be_bytes());
    message.extend_from_slice(&commitment.canonical_encoding_version.to_be_bytes());
    message.extend_from_slice(commitment.digest.as_bytes());
    message
}

/// Off-chain signature over a commitment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRef {
    pub signer: String,
    pub signature: Vec<u8>,
}

/// Handle of a submitted on-chain transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRef {
    pub tx_ref: String,
}

impl From<SignatureRef> for AuthorizationRef {
    fn from(sig: SignatureRef) -> Self {
        AuthorizationRef::Signature {
            signer: sig.signer,
            signature: sig.signature,
        }
    }
}

impl From<TransactionRef> for AuthorizationRef {
    fn from(tx: TransactionRef) -> Self {
        AuthorizationRef::Transaction { tx_ref: tx.tx_ref }
    }
}

/// Holds the signing key and authorizes commitments with it.
/// Key material never leaves the implementation.
#[async_trait]
pub trait KeyCustodian: Send + Sync {
    /// Sign the commitment for off-chain publication
    async fn sign(&self, commitment: &Commitment) -> Result<SignatureRef>;

    /// Sign and submit the commitment as an on-chain transaction
    async fn submit(&self, commitment: &Commitment) -> Result<TransactionRef>;

    /// Public identity of the key
    fn signer_id(&self) -> String;
}
