// Integration tests for commitment building

#[cfg(test)]
mod tests {
    use crate::*;
    use axum::{extract::Path, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use sha2::{Digest as _, Sha256};
    use rewardpub_types::{
        Amount, CanonicalEncoding, Epoch, EpochId, PipelineError, RecipientId, RewardSet,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn epoch(id: EpochId) -> Epoch {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
        Epoch::new(id, start, end)
    }

    fn entries() -> Vec<(String, u128)> {
        vec![
            ("0x5C9d6aFE82C8f1c33aB274C577932F2D40778347".to_string(), 10_000),
            ("0x1111111111111111111111111111111111111111".to_string(), 250),
            ("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd".to_string(), 1),
        ]
    }

    #[tokio::test]
    async fn test_source_order_does_not_matter() {
        let mut reversed = entries();
        reversed.reverse();

        let a = MockRewardSource::new().with_rewards(42, entries());
        let b = MockRewardSource::new().with_rewards(42, reversed);

        for encoding in [CanonicalEncoding::FlatV1, CanonicalEncoding::MerkleV2] {
            let ca = CommitmentBuilder::new(Arc::new(a.clone()), encoding)
                .build(&epoch(42))
                .await
                .unwrap();
            let cb = CommitmentBuilder::new(Arc::new(b.clone()), encoding)
                .build(&epoch(42))
                .await
                .unwrap();
            assert_eq!(ca, cb);
            assert_eq!(ca.recipient_count, 3);
            assert_eq!(ca.total_amount, Amount::new(10_251));
            assert_eq!(ca.canonical_encoding_version, encoding.version());
        }
    }

    #[tokio::test]
    async fn test_not_finalized_is_incomplete_data() {
        let builder = CommitmentBuilder::new(
            Arc::new(MockRewardSource::new()),
            CanonicalEncoding::FlatV1,
        );
        let err = builder.build(&epoch(43)).await.unwrap_err();
        assert_eq!(err, PipelineError::IncompleteData(43));
    }

    #[tokio::test]
    async fn test_duplicate_recipient_fails() {
        let source = MockRewardSource::new().with_rewards(1, [("0xaa", 1u128), ("0xaa", 2u128)]);
        let builder = CommitmentBuilder::new(Arc::new(source), CanonicalEncoding::FlatV1);
        assert!(matches!(
            builder.build(&epoch(1)).await,
            Err(PipelineError::InvalidRewardSet(_))
        ));
    }

    #[tokio::test]
    async fn test_amount_change_changes_digest() {
        let a = MockRewardSource::new().with_rewards(1, [("0xaa", 1u128)]);
        let b = MockRewardSource::new().with_rewards(1, [("0xaa", 2u128)]);
        let ca = CommitmentBuilder::new(Arc::new(a), CanonicalEncoding::FlatV1)
            .build(&epoch(1))
            .await
            .unwrap();
        let cb = CommitmentBuilder::new(Arc::new(b), CanonicalEncoding::FlatV1)
            .build(&epoch(1))
            .await
            .unwrap();
        assert_ne!(ca.digest, cb.digest);
    }

    fn checksummed_body(epoch_id: u64) -> String {
        format!(
            r#"{{"epoch_id":{},"finalized":true,"rewards":[{{"recipient":"0xaa","amount":"7"}}]}}"#,
            epoch_id
        )
    }

    async fn rewards_handler(Path(epoch_id): Path<u64>) -> impl IntoResponse {
        match epoch_id {
            // Correct checksum, prefixed and upper-case
            45 => {
                let body = checksummed_body(45);
                let checksum = format!("0x{}", hex::encode_upper(Sha256::digest(body.as_bytes())));
                ([(CHECKSUM_HEADER, checksum)], body).into_response()
            }
            // Checksum of some other body
            46 => {
                let checksum = hex::encode(Sha256::digest(b"truncated"));
                ([(CHECKSUM_HEADER, checksum)], checksummed_body(46)).into_response()
            }
            42 => Json(serde_json::json!({
                "epoch_id": 42,
                "finalized": true,
                "rewards": [
                    {"recipient": "0xbb", "amount": "20"},
                    {"recipient": "0xaa", "amount": "10"}
                ]
            }))
            .into_response(),
            43 => Json(serde_json::json!({"epoch_id": 43, "finalized": false})).into_response(),
            44 => Json(serde_json::json!({"epoch_id": 7, "finalized": true, "rewards": []}))
                .into_response(),
            50 => StatusCode::SERVICE_UNAVAILABLE.into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn spawn_source_server() -> String {
        let app = Router::new().route("/api/epochs/:epoch_id/rewards", get(rewards_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    #[tokio::test]
    async fn test_http_source() {
        let base = spawn_source_server().await;
        let source = HttpRewardSource::new(
            base.parse().unwrap(),
            Some("token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        match source.fetch(&epoch(42)).await.unwrap() {
            SourceResponse::Finalized(rewards) => {
                assert_eq!(rewards.len(), 2);
                assert_eq!(rewards[0].recipient, RecipientId::new("0xbb"));
                assert_eq!(rewards[0].amount, Amount::new(20));
            }
            other => panic!("unexpected response: {:?}", other),
        }

        assert_eq!(source.fetch(&epoch(43)).await.unwrap(), SourceResponse::NotFinalized);
        assert_eq!(source.fetch(&epoch(99)).await.unwrap(), SourceResponse::NotFinalized);
        assert!(matches!(
            source.fetch(&epoch(44)).await,
            Err(PipelineError::InvalidRewardSet(_))
        ));
        assert!(matches!(
            source.fetch(&epoch(50)).await,
            Err(PipelineError::DataSourceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_http_source_body_checksum() {
        let base = spawn_source_server().await;
        let source = HttpRewardSource::new(base.parse().unwrap(), None, Duration::from_secs(5))
            .unwrap();

        match source.fetch(&epoch(45)).await.unwrap() {
            SourceResponse::Finalized(rewards) => {
                assert_eq!(rewards.len(), 1);
                assert_eq!(rewards[0].amount, Amount::new(7));
            }
            other => panic!("unexpected response: {:?}", other),
        }

        let err = source.fetch(&epoch(46)).await.unwrap_err();
        assert!(
            matches!(err, PipelineError::DataSourceUnavailable(ref msg) if msg.contains("checksum"))
        );
        assert_eq!(err.class(), rewardpub_types::ErrorClass::Retryable);
    }

    #[tokio::test]
    async fn test_http_source_unreachable() {
        // Nothing listens on port 9 of the loopback interface
        let source = HttpRewardSource::new(
            "http://127.0.0.1:9/".parse().unwrap(),
            None,
            Duration::from_millis(500),
        )
        .unwrap();
        assert!(matches!(
            source.fetch(&epoch(1)).await,
            Err(PipelineError::DataSourceUnavailable(_))
        ));
    }

    fn arb_entries() -> impl Strategy<Value = Vec<(String, u128)>> {
        prop::collection::btree_map("0x[0-9a-f]{1,40}", any::<u64>(), 0..30)
            .prop_map(|m| m.into_iter().map(|(k, v)| (k, v as u128)).collect())
    }

    proptest! {
        #[test]
        fn proptest_digest_ignores_input_order(
            (entries, shuffled) in arb_entries().prop_flat_map(|e| {
                let shuffled = Just(e.clone()).prop_shuffle();
                (Just(e), shuffled)
            }),
            merkle in any::<bool>(),
        ) {
            let encoding = if merkle { CanonicalEncoding::MerkleV2 } else { CanonicalEncoding::FlatV1 };
            let to_set = |list: &Vec<(String, u128)>| {
                RewardSet::from_entries(
                    7,
                    list.iter().map(|(r, a)| (RecipientId::new(r.clone()), Amount::new(*a))),
                )
                .unwrap()
            };
            let a = commit(&to_set(&entries), encoding).unwrap();
            let b = commit(&to_set(&shuffled), encoding).unwrap();
            prop_assert_eq!(a.digest, b.digest);
        }
    }
}
