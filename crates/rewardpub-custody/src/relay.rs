use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::TransactionRequest;
use alloy::transports::http::Http;
use alloy::transports::TransportError;
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

use crate::error::{CustodyError, Result};

/// Sends a signed transaction carrying `calldata` and returns the node's transaction hash
#[async_trait]
pub trait TransactionRelay: Send + Sync {
    async fn send(&self, calldata: Vec<u8>) -> Result<String>;
}

/// JSON-RPC client over HTTP with a request timeout
pub fn http_rpc_client(url: Url, timeout: Duration) -> reqwest::Result<RpcClient> {
    let client = reqwest::ClientBuilder::new().timeout(timeout).build()?;
    Ok(RpcClient::new(Http::with_client(client, url), false))
}

/// Relay that signs with a local wallet and broadcasts through an Ethereum node.
/// Nonce, gas and chain id are filled in by the provider.
pub struct AlloyRelay {
    provider: DynProvider,
    to: Address,
}

impl AlloyRelay {
    pub fn new(client: RpcClient, wallet: EthereumWallet, to: Address) -> Self {
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_client(client)
            .erased();
        Self { provider, to }
    }
}

fn send_error(err: TransportError) -> CustodyError {
    match err.as_error_resp() {
        Some(payload) => CustodyError::SigningRejected(format!(
            "node rejected transaction: {} (code {})",
            payload.message, payload.code
        )),
        None => CustodyError::KeyUnavailable(format!("cannot reach chain node: {}", err)),
    }
}

#[async_trait]
impl TransactionRelay for AlloyRelay {
    async fn send(&self, calldata: Vec<u8>) -> Result<String> {
        let tx = TransactionRequest::default()
            .with_to(self.to)
            .with_input(calldata);
        let pending = self.provider.send_transaction(tx).await.map_err(send_error)?;
        let tx_hash = pending.tx_hash().to_string();
        debug!(to = %self.to, tx_hash = %tx_hash, "transaction accepted by node");
        Ok(tx_hash)
    }
}
