//! Shared fixtures for the cross-crate scenarios in `tests/`.

use chrono::{DateTime, TimeZone, Utc};
use rewardpub_clock::EpochClock;
use rewardpub_commitment::{CommitmentBuilder, MockRewardSource};
use rewardpub_custody::{KeyCustodian, LocalKeyCustodian, SigningDomain};
use rewardpub_publisher::{
    ConfirmationPolicy, MockEndpoint, PublishTarget, Publisher, PublisherConfig, RetryPolicy,
};
use rewardpub_store::PublishStateStore;
use rewardpub_types::CanonicalEncoding;
use std::sync::Arc;
use std::time::Duration;

pub const SECRET: [u8; 32] = [7; 32];

pub fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).single().unwrap_or_default()
}

pub fn clock() -> EpochClock {
    EpochClock::weekly(anchor())
}

pub fn domain() -> SigningDomain {
    SigningDomain::new("rewardpub-test", 5)
}

pub fn local_custodian() -> LocalKeyCustodian {
    LocalKeyCustodian::from_secret_bytes(&SECRET, domain())
        .unwrap_or_else(|err| panic!("fixture key rejected: {}", err))
}

/// Millisecond backoff and a confirmation timeout of `confirmation_timeout`
pub fn quick_config(target: PublishTarget, confirmation_timeout: Duration) -> PublisherConfig {
    PublisherConfig {
        target,
        retry: RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(1),
            multiplier: 2,
            max_backoff: Duration::from_millis(4),
        },
        confirmation: ConfirmationPolicy {
            required_confirmations: 1,
            poll_interval: Duration::from_millis(2),
            confirmation_timeout,
        },
    }
}

/// One process worth of pipeline wiring over a given store
pub struct Pipeline {
    pub source: MockRewardSource,
    pub endpoint: MockEndpoint,
    pub store: Arc<dyn PublishStateStore>,
}

impl Pipeline {
    pub fn new(source: MockRewardSource, store: Arc<dyn PublishStateStore>) -> Self {
        Self {
            source,
            endpoint: MockEndpoint::new(),
            store,
        }
    }

    pub fn publisher(
        &self,
        custodian: Arc<dyn KeyCustodian>,
        config: PublisherConfig,
    ) -> Publisher {
        Publisher::new(
            CommitmentBuilder::new(Arc::new(self.source.clone()), CanonicalEncoding::FlatV1),
            custodian,
            Arc::new(self.endpoint.clone()),
            Arc::clone(&self.store),
            config,
        )
    }
}
