use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode, Url};
use rewardpub_types::{with_trailing_slash, Epoch, EpochId, PipelineError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::time::Duration;
use tracing::debug;

use crate::source::{RewardEntry, RewardSource, SourceResponse};

/// Optional response header carrying the hex SHA-256 of the body
pub const CHECKSUM_HEADER: &str = "x-content-sha256";

/// Reward data source behind an HTTP API.
///
/// `GET {base_url}epochs/{epoch_id}/rewards` with an optional bearer token.
/// `404` and `425` mean the epoch is not finalized yet.
pub struct HttpRewardSource {
    client: HttpClient,
    base_url: Url,
    token: Option<String>,
}

/// Wire format of the rewards endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsResponse {
    pub epoch_id: EpochId,
    pub finalized: bool,
    #[serde(default)]
    pub rewards: Vec<RewardEntry>,
}

impl HttpRewardSource {
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

    fn rewards_url(&self, epoch_id: EpochId) -> Result<Url> {
        self.base_url
            .join(&format!("epochs/{}/rewards", epoch_id))
            .map_err(|e| PipelineError::Config(format!("invalid data source url: {}", e)))
    }
}

#[async_trait]
impl RewardSource for HttpRewardSource {
    async fn fetch(&self, epoch: &Epoch) -> Result<SourceResponse> {
        let url = self.rewards_url(epoch.epoch_id)?;
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::DataSourceUnavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::TOO_EARLY {
            return Ok(SourceResponse::NotFinalized);
        }

        let checksum = response
            .headers()
            .get(CHECKSUM_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim_start_matches("0x").to_lowercase());
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::DataSourceUnavailable(e.to_string()))?;

        if !status.is_success() {
            debug!("Unsuccessful response text: {}", body);
            return Err(PipelineError::DataSourceUnavailable(format!(
                "unsuccessful status code: {}",
                status
            )));
        }

        if let Some(expected) = checksum {
            let actual = hex::encode(Sha256::digest(body.as_bytes()));
            if expected != actual {
                return Err(PipelineError::DataSourceUnavailable(format!(
                    "body checksum mismatch: expected: {}; actual: {}",
                    expected, actual
                )));
            }
        }

        let parsed: RewardsResponse = serde_json::from_str(&body).map_err(|e| {
            PipelineError::InvalidRewardSet(format!("malformed rewards response: {}", e))
        })?;

        if parsed.epoch_id != epoch.epoch_id {
            return Err(PipelineError::InvalidRewardSet(format!(
                "asked for epoch {}, source answered for epoch {}",
                epoch.epoch_id, parsed.epoch_id
            )));
        }
        if !parsed.finalized {
            return Ok(SourceResponse::NotFinalized);
        }

        debug!(
            epoch_id = epoch.epoch_id,
            entries = parsed.rewards.len(),
            "fetched finalized rewards"
        );
        Ok(SourceResponse::Finalized(parsed.rewards))
    }
}
