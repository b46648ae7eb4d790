use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rewardpub_api::{create_app, AppState};
use rewardpub_publisher::Scheduler;
use rewardpub_service::{app, shutdown::shutdown_signal, ServiceConfig};
use rewardpub_store::{PublishStateStore, SledStateStore};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig::parse();
    config.validate()?;
    info!(
        anchor = %config.anchor,
        cadence = %humantime::format_duration(config.cadence),
        target = ?config.target,
        custody = ?config.custody,
        state_path = %config.state_path.display(),
        "starting rewardpub"
    );

    let store: Arc<dyn PublishStateStore> = Arc::new(
        SledStateStore::open(&config.state_path)
            .with_context(|| format!("cannot open state store at {}", config.state_path.display()))?,
    );
    let clock = app::build_clock(&config)?;
    let publisher = Arc::new(app::build_publisher(&config, store.clone())?);
    let scheduler = Scheduler::new(clock, publisher, config.tick_interval);

    let cancellation_token = CancellationToken::new();
    tokio::spawn({
        let token = cancellation_token.clone();
        let shutdown = shutdown_signal();
        async move {
            shutdown.await;
            info!("shutdown requested");
            token.cancel();
        }
    });

    let listener = tokio::net::TcpListener::bind(config.api_bind)
        .await
        .with_context(|| format!("cannot bind audit API to {}", config.api_bind))?;
    info!(addr = %config.api_bind, "audit API listening");
    let api = tokio::spawn({
        let token = cancellation_token.clone();
        let app = create_app(AppState::new(store));
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        }
    });

    let result = scheduler.run(cancellation_token.clone()).await;
    cancellation_token.cancel();
    api.await??;
    result?;
    info!("rewardpub stopped");
    Ok(())
}

