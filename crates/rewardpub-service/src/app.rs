//! Builds the pipeline components selected by [`ServiceConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use rewardpub_clock::EpochClock;
use rewardpub_commitment::{CommitmentBuilder, HttpRewardSource, RewardSource};
use alloy::rpc::client::RpcClient;
use rewardpub_custody::{
    http_rpc_client, AlloyRelay, KeyCustodian, LocalKeyCustodian, RemoteSignerCustodian,
    SigningDomain,
};
use rewardpub_publisher::{ChainEndpoint, HttpConsumerEndpoint, PublicationEndpoint, Publisher};
use rewardpub_store::PublishStateStore;
use tracing::info;

use crate::config::{CustodyBackend, ServiceConfig, Target};

pub fn build_clock(config: &ServiceConfig) -> Result<EpochClock> {
    let clock = EpochClock::new(config.anchor, config.cadence)
        .context("invalid epoch schedule")?
        .with_start_epoch(config.start_epoch);
    Ok(clock)
}

pub fn build_source(config: &ServiceConfig) -> Result<Arc<dyn RewardSource>> {
    let source = HttpRewardSource::new(
        config.data_source_url.clone(),
        config.data_source_token.clone(),
        config.http_timeout,
    )?;
    Ok(Arc::new(source))
}

fn chain_rpc(config: &ServiceConfig) -> Result<RpcClient> {
    let url = config
        .chain_rpc_url
        .clone()
        .context("--chain-rpc-url is required")?;
    http_rpc_client(url, config.http_timeout).context("cannot build chain RPC client")
}

pub fn build_custodian(config: &ServiceConfig) -> Result<Arc<dyn KeyCustodian>> {
    let domain = SigningDomain::new(config.domain_name.clone(), config.chain_id);
    let custodian: Arc<dyn KeyCustodian> = match config.custody {
        CustodyBackend::Local => {
            let path = config.key_file.as_ref().context("--key-file is required")?;
            let mut local = LocalKeyCustodian::from_key_file(path, domain)?;
            if config.target == Target::OnChain {
                let to = config
                    .commitment_address
                    .context("--commitment-address is required")?;
                let relay = AlloyRelay::new(chain_rpc(config)?, local.wallet(), to);
                local = local.with_relay(Arc::new(relay));
            }
            Arc::new(local)
        }
        CustodyBackend::Remote => {
            let url = config.signer_url.clone().context("--signer-url is required")?;
            Arc::new(RemoteSignerCustodian::new(
                url,
                config.signer_token.clone(),
                config.signer_id.clone(),
                domain,
                config.http_timeout,
            )?)
        }
    };
    info!(signer = %custodian.signer_id(), backend = ?config.custody, "key custodian ready");
    Ok(custodian)
}

pub fn build_endpoint(config: &ServiceConfig) -> Result<Arc<dyn PublicationEndpoint>> {
    let endpoint: Arc<dyn PublicationEndpoint> = match config.target {
        Target::OffChain => {
            let url = config
                .endpoint_url
                .clone()
                .context("--endpoint-url is required")?;
            Arc::new(HttpConsumerEndpoint::new(
                url,
                config.endpoint_token.clone(),
                config.http_timeout,
            )?)
        }
        Target::OnChain => Arc::new(ChainEndpoint::connect(
            chain_rpc(config)?,
            config.required_confirmations,
        )),
    };
    Ok(endpoint)
}

pub fn build_publisher(
    config: &ServiceConfig,
    store: Arc<dyn PublishStateStore>,
) -> Result<Publisher> {
    let builder = CommitmentBuilder::new(build_source(config)?, config.encoding.into());
    Ok(Publisher::new(
        builder,
        build_custodian(config)?,
        build_endpoint(config)?,
        store,
        config.publisher_config(),
    ))
}
