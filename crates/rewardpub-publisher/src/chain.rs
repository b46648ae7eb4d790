use alloy::network::ReceiptResponse;
use alloy::primitives::TxHash;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::transports::TransportError;
use async_trait::async_trait;
use rewardpub_types::{AuthorizationRef, Commitment, EpochId, PipelineError, Result};
use std::sync::Arc;
use tracing::debug;

use crate::endpoint::{ConfirmationStatus, PublicationEndpoint};

/// Where a transaction landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inclusion {
    /// `None` while the receipt is not attached to a block yet
    pub block_number: Option<u64>,
    pub succeeded: bool,
}

/// Read access to a chain: receipts and the current head
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn inclusion(&self, tx_hash: TxHash) -> Result<Option<Inclusion>>;

    async fn head(&self) -> Result<u64>;
}

fn node_error(err: TransportError) -> PipelineError {
    PipelineError::PublishRejected(format!("chain node: {}", err))
}

#[async_trait]
impl ChainReader for DynProvider {
    async fn inclusion(&self, tx_hash: TxHash) -> Result<Option<Inclusion>> {
        let receipt = self
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(node_error)?;
        Ok(receipt.map(|receipt| Inclusion {
            block_number: ReceiptResponse::block_number(&receipt),
            succeeded: ReceiptResponse::status(&receipt),
        }))
    }

    async fn head(&self) -> Result<u64> {
        self.get_block_number().await.map_err(node_error)
    }
}

/// On-chain target. The custodian already broadcast the transaction, so delivery is a
/// no-op and confirmation is the receipt's depth below the head.
pub struct ChainEndpoint {
    reader: Arc<dyn ChainReader>,
    required_confirmations: u64,
}

impl ChainEndpoint {
    pub fn new(reader: Arc<dyn ChainReader>, required_confirmations: u64) -> Self {
        Self {
            reader,
            required_confirmations: required_confirmations.max(1),
        }
    }

    /// Read-only provider over `client`
    pub fn connect(client: RpcClient, required_confirmations: u64) -> Self {
        let provider = ProviderBuilder::new().connect_client(client).erased();
        Self::new(Arc::new(provider), required_confirmations)
    }
}

fn tx_hash(authorization: &AuthorizationRef) -> Result<TxHash> {
    match authorization {
        AuthorizationRef::Transaction { tx_ref } => tx_ref.parse().map_err(|_| {
            PipelineError::Config(format!("{} is not a transaction hash", tx_ref))
        }),
        AuthorizationRef::Signature { .. } => Err(PipelineError::Config(
            "on-chain target needs a submitted transaction, got a signature".to_string(),
        )),
    }
}

#[async_trait]
impl PublicationEndpoint for ChainEndpoint {
    async fn deliver(
        &self,
        _commitment: &Commitment,
        authorization: &AuthorizationRef,
    ) -> Result<()> {
        tx_hash(authorization).map(|_| ())
    }

    async fn confirmation(
        &self,
        epoch_id: EpochId,
        authorization: &AuthorizationRef,
    ) -> Result<ConfirmationStatus> {
        let tx_hash = tx_hash(authorization)?;

        let Some(inclusion) = self.reader.inclusion(tx_hash).await? else {
            return Ok(ConfirmationStatus::Unknown);
        };
        let Some(block) = inclusion.block_number else {
            return Ok(ConfirmationStatus::Pending { depth: 0 });
        };
        if !inclusion.succeeded {
            return Err(PipelineError::TransactionReverted(format!(
                "transaction {} for epoch {} reverted in block {}",
                tx_hash, epoch_id, block
            )));
        }

        let head = self.reader.head().await?;
        let depth = head.saturating_sub(block).saturating_add(1);
        debug!(epoch_id, tx_hash = %tx_hash, block, depth, "transaction receipt found");

        Ok(if depth >= self.required_confirmations {
            ConfirmationStatus::Confirmed
        } else {
            ConfirmationStatus::Pending { depth }
        })
    }
}
