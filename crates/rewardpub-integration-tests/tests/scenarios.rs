// End-to-end publication scenarios across clock, builder, custody, store and publisher

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Duration as ChronoDuration;
use rewardpub_api::{create_app, AppState};
use rewardpub_commitment::{commit, MockRewardSource};
use rewardpub_custody::{signing_message, CustodyError, KeyCustodian, MockCustodian};
use rewardpub_integration_tests::*;
use rewardpub_publisher::{DriveOutcome, PublishTarget, Scheduler, TickOutcome};
use rewardpub_store::{MemoryStateStore, PublishStateStore, SledStateStore, StoreError};
use rewardpub_types::{
    Amount, AuthorizationRef, CanonicalEncoding, PipelineError, PublicationState, RecipientId,
    RewardSet,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const EPOCH_42: [(&str, u128); 3] = [
    ("0x00000000000000000000000000000000000000c3", 125_000),
    ("0x00000000000000000000000000000000000000a1", 40_000_000_000_000_000_000),
    ("0x00000000000000000000000000000000000000b2", 9),
];

fn epoch_42_set() -> RewardSet {
    RewardSet::from_entries(
        42,
        EPOCH_42
            .iter()
            .map(|(r, a)| (RecipientId::from(*r), Amount::new(*a))),
    )
    .unwrap()
}

#[tokio::test]
async fn epoch_42_is_signed_and_confirmed() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn PublishStateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
    let pipeline = Pipeline::new(MockRewardSource::new().with_rewards(42, EPOCH_42), store);
    let custodian = Arc::new(local_custodian());
    let publisher = pipeline.publisher(
        custodian.clone(),
        quick_config(PublishTarget::OffChain, Duration::from_secs(5)),
    );

    let outcome = publisher.drive(&clock().epoch_at(42).unwrap()).await.unwrap();
    assert_eq!(outcome, DriveOutcome::Confirmed);

    let expected = commit(&epoch_42_set(), CanonicalEncoding::FlatV1).unwrap();
    let signature: AuthorizationRef = custodian.sign(&expected).await.unwrap().into();

    let record = pipeline.store.get(42).unwrap().unwrap();
    assert_eq!(record.epoch_id, 42);
    assert_eq!(record.state, PublicationState::Confirmed);
    assert_eq!(record.commitment_digest, Some(expected.digest));
    assert_eq!(record.canonical_encoding_version, Some(1));
    assert_eq!(record.signature_or_tx_ref, Some(signature));
    assert_eq!(record.attempt_count, 0);
    assert!(record.last_error.is_none());
    assert_eq!(pipeline.endpoint.delivered(42), Some(expected));
}

#[tokio::test]
async fn audit_api_reports_the_confirmed_record() {
    let store = MemoryStateStore::new();
    let pipeline = Pipeline::new(
        MockRewardSource::new().with_rewards(42, EPOCH_42),
        Arc::new(store.clone()),
    );
    pipeline
        .publisher(
            Arc::new(local_custodian()),
            quick_config(PublishTarget::OffChain, Duration::from_secs(5)),
        )
        .drive(&clock().epoch_at(42).unwrap())
        .await
        .unwrap();

    let app = create_app(AppState::new(Arc::new(store)));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/publications/42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["state"]["kind"], "confirmed");
    assert_eq!(body["signature_or_tx_ref"]["kind"], "signature");
}

#[tokio::test]
async fn restart_after_signing_confirms_without_signing_again() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockRewardSource::new().with_rewards(42, EPOCH_42);
    let first_custodian = MockCustodian::new();

    let persisted = {
        let store: Arc<dyn PublishStateStore> =
            Arc::new(SledStateStore::open(dir.path()).unwrap());
        let pipeline = Pipeline::new(source.clone(), Arc::clone(&store));
        pipeline.endpoint.set_never_confirm(true);
        let publisher = pipeline.publisher(
            Arc::new(first_custodian.clone()),
            quick_config(PublishTarget::OffChain, Duration::from_secs(60)),
        );

        let task = tokio::spawn(async move {
            publisher.drive(&clock().epoch_at(42).unwrap()).await
        });

        // Wait until the signature is durable, then kill the process mid-confirmation
        let mut signed = None;
        for _ in 0..500 {
            if let Some(record) = store.get(42).unwrap() {
                if record.state == PublicationState::Signed {
                    signed = Some(record);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        signed.expect("epoch 42 never reached Signed")
    };
    assert_eq!(first_custodian.sign_count(), 1);

    let store: Arc<dyn PublishStateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
    let pipeline = Pipeline::new(source, store);
    let second_custodian = MockCustodian::new();
    let outcome = pipeline
        .publisher(
            Arc::new(second_custodian.clone()),
            quick_config(PublishTarget::OffChain, Duration::from_secs(5)),
        )
        .drive(&clock().epoch_at(42).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome, DriveOutcome::Confirmed);
    assert_eq!(second_custodian.sign_count(), 0);
    let record = pipeline.store.get(42).unwrap().unwrap();
    assert_eq!(record.state, PublicationState::Confirmed);
    assert_eq!(record.signature_or_tx_ref, persisted.signature_or_tx_ref);
    assert_eq!(record.commitment_digest, persisted.commitment_digest);
}

#[tokio::test]
async fn unfinalized_epoch_43_blocks_epoch_44() {
    let source = MockRewardSource::new();
    let pipeline = Pipeline::new(source.clone(), Arc::new(MemoryStateStore::new()));
    let publisher = pipeline.publisher(
        Arc::new(MockCustodian::new()),
        quick_config(PublishTarget::OffChain, Duration::from_secs(5)),
    );
    let scheduler = Scheduler::new(
        clock().with_start_epoch(Some(43)),
        Arc::new(publisher),
        Duration::from_secs(60),
    );
    // Both 43 and 44 have ended
    let now = anchor() + ChronoDuration::weeks(45) + ChronoDuration::hours(1);

    for _ in 0..3 {
        assert_eq!(
            scheduler.tick(now).await.unwrap(),
            TickOutcome::Drove {
                epoch_id: 43,
                outcome: DriveOutcome::NotReady
            }
        );
    }
    let record = pipeline.store.get(43).unwrap().unwrap();
    assert_eq!(record.state, PublicationState::Pending);
    assert_eq!(record.attempt_count, 0);
    assert!(pipeline.store.get(44).unwrap().is_none());

    source.set_rewards(43, [("0xaa", 1u128)]);
    source.set_rewards(44, [("0xbb", 2u128)]);
    for expected in [43, 44] {
        assert_eq!(
            scheduler.tick(now).await.unwrap(),
            TickOutcome::Drove {
                epoch_id: expected,
                outcome: DriveOutcome::Confirmed
            }
        );
    }
    // 45 has not ended yet
    assert_eq!(scheduler.tick(now).await.unwrap(), TickOutcome::Idle);
}

#[tokio::test]
async fn scheduler_loop_rides_out_transient_failures() {
    let source = MockRewardSource::new().with_rewards(0, [("0xaa", 10u128), ("0xbb", 20u128)]);
    source.fail_next(0, PipelineError::DataSourceUnavailable("502".into()), 2);
    let custodian = MockCustodian::new();
    custodian.fail_next(CustodyError::KeyUnavailable("hsm busy".into()), 2);

    let pipeline = Pipeline::new(source, Arc::new(MemoryStateStore::new()));
    pipeline
        .endpoint
        .fail_next(PipelineError::PublishRejected("503".into()), 1);
    let publisher = pipeline.publisher(
        Arc::new(custodian.clone()),
        quick_config(PublishTarget::OffChain, Duration::from_secs(5)),
    );

    // Epoch 0 ended an hour ago
    let recent_anchor = chrono::Utc::now() - ChronoDuration::weeks(1) - ChronoDuration::hours(1);
    let clock = rewardpub_clock::EpochClock::weekly(recent_anchor).with_start_epoch(Some(0));
    let scheduler = Arc::new(Scheduler::new(
        clock,
        Arc::new(publisher),
        Duration::from_millis(10),
    ));

    let token = CancellationToken::new();
    let handle = {
        let scheduler = Arc::clone(&scheduler);
        let token = token.clone();
        tokio::spawn(async move { scheduler.run(token).await })
    };

    let mut confirmed = false;
    for _ in 0..500 {
        if let Some(record) = pipeline.store.get(0).unwrap() {
            if record.state == PublicationState::Confirmed {
                confirmed = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    token.cancel();
    assert!(handle.await.unwrap().is_ok());

    assert!(confirmed);
    let record = pipeline.store.get(0).unwrap().unwrap();
    assert_eq!(record.total_attempts, 5);
    assert_eq!(custodian.sign_count(), 3);
    assert!(pipeline.store.get(1).unwrap().is_none());
}

#[tokio::test]
async fn on_chain_publication_with_local_key_and_relay() {
    let relay = rewardpub_custody::MockRelay::new();
    let custodian = Arc::new(local_custodian().with_relay(Arc::new(relay.clone())));
    let pipeline = Pipeline::new(
        MockRewardSource::new().with_rewards(42, EPOCH_42),
        Arc::new(MemoryStateStore::new()),
    );
    let outcome = pipeline
        .publisher(
            custodian.clone(),
            quick_config(PublishTarget::OnChain, Duration::from_secs(5)),
        )
        .drive(&clock().epoch_at(42).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, DriveOutcome::Confirmed);

    let sent = relay.sent();
    assert_eq!(sent.len(), 1);
    let record = pipeline.store.get(42).unwrap().unwrap();
    assert_eq!(
        record.signature_or_tx_ref,
        Some(AuthorizationRef::Transaction {
            tx_ref: sent[0].0.clone()
        })
    );
    // Calldata is the domain-separated message, which ends in the digest
    let expected = commit(&epoch_42_set(), CanonicalEncoding::FlatV1).unwrap();
    assert_eq!(sent[0].1, signing_message(&domain(), &expected));
    assert!(sent[0].1.ends_with(expected.digest.as_bytes()));
}

#[tokio::test]
async fn confirmed_records_are_frozen_in_the_durable_store() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn PublishStateStore> = Arc::new(SledStateStore::open(dir.path()).unwrap());
    let pipeline = Pipeline::new(
        MockRewardSource::new().with_rewards(42, EPOCH_42),
        Arc::clone(&store),
    );
    pipeline
        .publisher(
            Arc::new(MockCustodian::new()),
            quick_config(PublishTarget::OffChain, Duration::from_secs(5)),
        )
        .drive(&clock().epoch_at(42).unwrap())
        .await
        .unwrap();
    let confirmed = store.get(42).unwrap().unwrap();

    let mut regressed = confirmed.clone();
    regressed.state = PublicationState::Pending;
    assert!(matches!(
        store.upsert(&regressed),
        Err(StoreError::Rejected { epoch_id: 42, .. })
    ));

    let mut rewritten = confirmed.clone();
    rewritten.last_error = Some("tampered".into());
    assert!(store.upsert(&rewritten).is_err());

    assert_eq!(store.get(42).unwrap().unwrap(), confirmed);
    assert!(store.list_incomplete().unwrap().is_empty());
}
