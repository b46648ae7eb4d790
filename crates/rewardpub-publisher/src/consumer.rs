use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode, Url};
use rewardpub_types::{
    with_trailing_slash, Amount, AuthorizationRef, Commitment, Digest, EpochId, PipelineError,
    Result,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::endpoint::{ConfirmationStatus, PublicationEndpoint};

/// Off-chain reward consumer reached through its admin API.
///
/// Delivery stages the signed commitment (`POST admin/stage`) and then publishes the
/// epoch (`POST admin/publish?epochId=`). `GET admin/published?epochId=` reports
/// whether the consumer serves it.
pub struct HttpConsumerEndpoint {
    client: HttpClient,
    base_url: Url,
    token: Option<String>,
}

/// Body of `admin/stage`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedCommitment {
    pub epoch_id: EpochId,
    pub digest: Digest,
    pub encoding_version: u16,
    pub recipient_count: u32,
    pub total_amount: Amount,
    pub signer: String,
    /// 0x-prefixed hex
    pub signature: String,
}

#[derive(Debug, Deserialize)]
struct PublishedResponse {
    published: bool,
}

impl HttpConsumerEndpoint {
    pub fn new(base_url: Url, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: with_trailing_slash(base_url),
            token,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PipelineError::Config(format!("invalid consumer url: {}", e)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| PipelineError::PublishRejected(format!("{}: {}", what, e)))?;
        Ok(response)
    }

    async fn expect_success(response: reqwest::Response, what: &str) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        debug!("Unsuccessful response text: {}", text);
        Err(PipelineError::PublishRejected(format!(
            "{}: unsuccessful status code: {}",
            what, status
        )))
    }
}

#[async_trait]
impl PublicationEndpoint for HttpConsumerEndpoint {
    async fn deliver(
        &self,
        commitment: &Commitment,
        authorization: &AuthorizationRef,
    ) -> Result<()> {
        let AuthorizationRef::Signature { signer, signature } = authorization else {
            return Err(PipelineError::Config(
                "off-chain consumer needs a signature, got a transaction".to_string(),
            ));
        };

        let staged = StagedCommitment {
            epoch_id: commitment.epoch_id,
            digest: commitment.digest,
            encoding_version: commitment.canonical_encoding_version,
            recipient_count: commitment.recipient_count,
            total_amount: commitment.total_amount,
            signer: signer.clone(),
            signature: format!("0x{}", hex::encode(signature)),
        };

        let stage = self.client.post(self.url("admin/stage")?).json(&staged);
        let response = self.send(stage, "stage").await?;
        // Already staged by an earlier delivery
        if response.status() != StatusCode::CONFLICT {
            Self::expect_success(response, "stage").await?;
        }

        let publish = self
            .client
            .post(self.url("admin/publish")?)
            .query(&[("epochId", commitment.epoch_id)]);
        let response = self.send(publish, "publish").await?;
        Self::expect_success(response, "publish").await?;

        debug!(epoch_id = commitment.epoch_id, "delivered commitment to consumer");
        Ok(())
    }

    async fn confirmation(
        &self,
        epoch_id: EpochId,
        _authorization: &AuthorizationRef,
    ) -> Result<ConfirmationStatus> {
        let request = self
            .client
            .get(self.url("admin/published")?)
            .query(&[("epochId", epoch_id)]);
        let response = self.send(request, "published").await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(ConfirmationStatus::Unknown);
        }
        if !response.status().is_success() {
            Self::expect_success(response, "published").await?;
            return Ok(ConfirmationStatus::Unknown);
        }

        let body: PublishedResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::PublishRejected(format!("malformed published response: {}", e)))?;
        Ok(if body.published {
            ConfirmationStatus::Confirmed
        } else {
            ConfirmationStatus::Unknown
        })
    }
}
