use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode, Url};
use rewardpub_types::{with_trailing_slash, Commitment, EpochId};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::custodian::{signing_message, KeyCustodian, SignatureRef, SigningDomain, TransactionRef};
use crate::error::{CustodyError, Result};

/// Custodian backed by an HTTP signing service (fronting an HSM or cloud KMS).
///
/// `POST {base_url}v1/sign` and `POST {base_url}v1/submit`. Every request carries an
/// idempotency key so the service can deduplicate replays. `409` and `422` are policy
/// rejections; everything else that fails is treated as the key being unavailable.
pub struct RemoteSignerCustodian {
    client: HttpClient,
    base_url: Url,
    token: Option<String>,
    signer_id: String,
    domain: SigningDomain,
}

#[derive(Debug, Serialize)]
struct SignerRequest {
    epoch_id: EpochId,
    digest: String,
    encoding_version: u16,
    idempotency_key: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    signer: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    tx_ref: String,
}

impl RemoteSignerCustodian {
    pub fn new(
        base_url: Url,
        token: Option<String>,
        signer_id: impl Into<String>,
        domain: SigningDomain,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| CustodyError::KeyUnavailable(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: with_trailing_slash(base_url),
            token,
            signer_id: signer_id.into(),
            domain,
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, commitment: &Commitment) -> Result<T> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| CustodyError::KeyUnavailable(format!("invalid signer url: {}", e)))?;
        let body = SignerRequest {
            epoch_id: commitment.epoch_id,
            digest: commitment.digest.to_hex(),
            encoding_version: commitment.canonical_encoding_version,
            idempotency_key: commitment.idempotency_key(),
            message: format!("0x{}", hex::encode(signing_message(&self.domain, commitment))),
        };

        let mut request = self.client.post(url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| CustodyError::KeyUnavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| CustodyError::KeyUnavailable(format!("malformed signer response: {}", e)));
        }

        let text = response.text().await.unwrap_or_default();
        debug!("Unsuccessful response text: {}", text);
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            Err(CustodyError::SigningRejected(format!("{}: {}", status, text)))
        } else {
            Err(CustodyError::KeyUnavailable(format!(
                "unsuccessful status code: {}",
                status
            )))
        }
    }
}

#[async_trait]
impl KeyCustodian for RemoteSignerCustodian {
    async fn sign(&self, commitment: &Commitment) -> Result<SignatureRef> {
        let response: SignResponse = self.post("v1/sign", commitment).await?;
        let hex_sig = response.signature.trim_start_matches("0x");
        let signature = hex::decode(hex_sig).map_err(|_| {
            CustodyError::KeyUnavailable("signer returned a non-hex signature".to_string())
        })?;
        Ok(SignatureRef {
            signer: response.signer,
            signature,
        })
    }

    async fn submit(&self, commitment: &Commitment) -> Result<TransactionRef> {
        let response: SubmitResponse = self.post("v1/submit", commitment).await?;
        Ok(TransactionRef {
            tx_ref: response.tx_ref,
        })
    }

    fn signer_id(&self) -> String {
        self.signer_id.clone()
    }
}
