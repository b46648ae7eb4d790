//! Configuration for the rewardpub service.
//!
//! Every option can be given on the command line or through its `REWARDPUB_*`
//! environment variable. Durations use humantime syntax (`90s`, `5min`, `7days`).

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use alloy::primitives::Address;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use reqwest::Url;
use rewardpub_publisher::{ConfirmationPolicy, PublishTarget, PublisherConfig, RetryPolicy};
use rewardpub_types::CanonicalEncoding;

/// Where commitments are published
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    /// Sign and hand to the off-chain reward consumer
    OffChain,
    /// Submit a transaction and wait for chain confirmations
    OnChain,
}

/// Which key custody backend holds the signing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CustodyBackend {
    /// secp256k1 key read from a local file (development)
    Local,
    /// HTTP signer service in front of an HSM or KMS (production)
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Encoding {
    FlatV1,
    MerkleV2,
}

impl From<Encoding> for CanonicalEncoding {
    fn from(encoding: Encoding) -> Self {
        match encoding {
            Encoding::FlatV1 => CanonicalEncoding::FlatV1,
            Encoding::MerkleV2 => CanonicalEncoding::MerkleV2,
        }
    }
}

/// The configuration of the rewardpub service.
///
/// Loaded once at startup; [`ServiceConfig::validate`] rejects inconsistent
/// combinations before anything runs.
#[derive(Parser)]
#[clap(name = "rewardpub", about = "Signs and publishes reward epoch commitments")]
pub struct ServiceConfig {
    /// Start of epoch 0 (RFC 3339)
    #[clap(long, env = "REWARDPUB_ANCHOR")]
    pub anchor: DateTime<Utc>,

    /// Length of one epoch
    #[clap(
        long,
        env = "REWARDPUB_CADENCE",
        default_value = "7days",
        value_parser = humantime::parse_duration
    )]
    pub cadence: Duration,

    /// First epoch to publish when the state store is empty.
    /// Defaults to the latest completed epoch.
    #[clap(long, env = "REWARDPUB_START_EPOCH")]
    pub start_epoch: Option<u64>,

    /// Time between scheduler ticks
    #[clap(
        long,
        env = "REWARDPUB_TICK_INTERVAL",
        default_value = "5min",
        value_parser = humantime::parse_duration
    )]
    pub tick_interval: Duration,

    /// Consecutive failures in one state before an epoch is marked failed
    #[clap(long, env = "REWARDPUB_MAX_ATTEMPTS", default_value = "5")]
    pub max_attempts: u32,

    #[clap(
        long,
        env = "REWARDPUB_INITIAL_BACKOFF",
        default_value = "2s",
        value_parser = humantime::parse_duration
    )]
    pub initial_backoff: Duration,

    #[clap(long, env = "REWARDPUB_BACKOFF_MULTIPLIER", default_value = "2")]
    pub backoff_multiplier: u32,

    #[clap(
        long,
        env = "REWARDPUB_MAX_BACKOFF",
        default_value = "1min",
        value_parser = humantime::parse_duration
    )]
    pub max_backoff: Duration,

    /// Confirmations required for on-chain publication
    #[clap(long, env = "REWARDPUB_REQUIRED_CONFIRMATIONS", default_value = "12")]
    pub required_confirmations: u64,

    #[clap(
        long,
        env = "REWARDPUB_POLL_INTERVAL",
        default_value = "15s",
        value_parser = humantime::parse_duration
    )]
    pub poll_interval: Duration,

    #[clap(
        long,
        env = "REWARDPUB_CONFIRMATION_TIMEOUT",
        default_value = "30min",
        value_parser = humantime::parse_duration
    )]
    pub confirmation_timeout: Duration,

    #[clap(long, env = "REWARDPUB_TARGET", value_enum, default_value = "off-chain")]
    pub target: Target,

    /// Canonical encoding for new commitments
    #[clap(long, env = "REWARDPUB_ENCODING", value_enum, default_value = "flat-v1")]
    pub encoding: Encoding,

    /// Base URL of the reward data API
    #[clap(long, env = "REWARDPUB_DATA_SOURCE_URL")]
    pub data_source_url: Url,

    #[clap(long, env = "REWARDPUB_DATA_SOURCE_TOKEN", hide_env_values = true)]
    pub data_source_token: Option<String>,

    #[clap(long, env = "REWARDPUB_CUSTODY", value_enum, default_value = "local")]
    pub custody: CustodyBackend,

    /// Hex-encoded secp256k1 secret for the local backend
    #[clap(long, env = "REWARDPUB_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    #[clap(long, env = "REWARDPUB_SIGNER_URL")]
    pub signer_url: Option<Url>,

    #[clap(long, env = "REWARDPUB_SIGNER_TOKEN", hide_env_values = true)]
    pub signer_token: Option<String>,

    /// Public identity reported for the remote signer's key
    #[clap(long, env = "REWARDPUB_SIGNER_ID", default_value = "remote-signer")]
    pub signer_id: String,

    /// Admin API of the off-chain reward consumer
    #[clap(long, env = "REWARDPUB_ENDPOINT_URL")]
    pub endpoint_url: Option<Url>,

    #[clap(long, env = "REWARDPUB_ENDPOINT_TOKEN", hide_env_values = true)]
    pub endpoint_token: Option<String>,

    /// JSON-RPC node for on-chain publication
    #[clap(long, env = "REWARDPUB_CHAIN_RPC_URL")]
    pub chain_rpc_url: Option<Url>,

    /// Contract that receives commitment transactions from the local key
    #[clap(long, env = "REWARDPUB_COMMITMENT_ADDRESS")]
    pub commitment_address: Option<Address>,

    #[clap(long, env = "REWARDPUB_CHAIN_ID", default_value = "1")]
    pub chain_id: u64,

    /// Domain name mixed into every signed message
    #[clap(long, env = "REWARDPUB_DOMAIN_NAME", default_value = "rewardpub")]
    pub domain_name: String,

    /// Directory of the durable state store
    #[clap(long, env = "REWARDPUB_STATE_PATH", default_value = "rewardpub-state")]
    pub state_path: PathBuf,

    /// Bind address of the audit API
    #[clap(long, env = "REWARDPUB_API_BIND", default_value = "127.0.0.1:8080")]
    pub api_bind: SocketAddr,

    /// Timeout of every outbound HTTP call
    #[clap(
        long,
        env = "REWARDPUB_HTTP_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub http_timeout: Duration,
}

impl ServiceConfig {
    /// Reject combinations that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.cadence.is_zero() {
            bail!("cadence must be positive");
        }
        if self.tick_interval.is_zero() {
            bail!("tick interval must be positive");
        }
        if self.max_attempts == 0 {
            bail!("max attempts must be at least 1");
        }
        match self.custody {
            CustodyBackend::Local if self.key_file.is_none() => {
                bail!("local custody needs --key-file")
            }
            CustodyBackend::Remote if self.signer_url.is_none() => {
                bail!("remote custody needs --signer-url")
            }
            _ => {}
        }
        match self.target {
            Target::OffChain if self.endpoint_url.is_none() => {
                bail!("off-chain publication needs --endpoint-url")
            }
            Target::OnChain if self.chain_rpc_url.is_none() => {
                bail!("on-chain publication needs --chain-rpc-url")
            }
            _ => {}
        }
        if self.target == Target::OnChain
            && self.custody == CustodyBackend::Local
            && self.commitment_address.is_none()
        {
            bail!("on-chain publication with a local key needs --commitment-address");
        }
        Ok(())
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            target: match self.target {
                Target::OffChain => PublishTarget::OffChain,
                Target::OnChain => PublishTarget::OnChain,
            },
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                initial_backoff: self.initial_backoff,
                multiplier: self.backoff_multiplier,
                max_backoff: self.max_backoff,
            },
            confirmation: ConfirmationPolicy {
                required_confirmations: self.required_confirmations,
                poll_interval: self.poll_interval,
                confirmation_timeout: self.confirmation_timeout,
            },
        }
    }
}
