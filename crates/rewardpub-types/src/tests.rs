// Comprehensive integration tests for types crate

#[cfg(test)]
mod tests {
    use crate::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn epoch(id: EpochId) -> Epoch {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
        Epoch::new(id, start, end)
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        let e = epoch(42);
        let mut record = PublicationRecord::new(&e, e.period_end);
        record.commitment_digest = Some(Digest([7u8; 32]));
        record.canonical_encoding_version = Some(CanonicalEncoding::FlatV1.version());
        record
            .transition(PublicationState::CommitmentBuilt, e.period_end, "built")
            .unwrap();
        record.signature_or_tx_ref = Some(AuthorizationRef::Signature {
            signer: "0xsigner".to_string(),
            signature: vec![1, 2, 3],
        });
        record
            .transition(PublicationState::Signed, e.period_end, "signed")
            .unwrap();

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"signature\":\"0x010203\""));
        let back: PublicationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn test_failed_state_serialization() {
        let state = PublicationState::Failed {
            from: Stage::Submitted,
            reason: "confirmation timeout".to_string(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["kind"], "failed");
        assert_eq!(json["from"], "submitted");

        let back: PublicationState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(
            PipelineError::DataSourceUnavailable("x".into()).class(),
            ErrorClass::Retryable
        );
        assert_eq!(PipelineError::IncompleteData(43).class(), ErrorClass::NotReady);
        assert_eq!(PipelineError::KeyUnavailable("x".into()).class(), ErrorClass::Retryable);
        assert_eq!(PipelineError::SigningRejected("x".into()).class(), ErrorClass::Reconcile);
        assert_eq!(PipelineError::PublishRejected("x".into()).class(), ErrorClass::Retryable);
        assert_eq!(
            PipelineError::ConfirmationTimeout("x".into()).class(),
            ErrorClass::Deferred
        );
        assert_eq!(
            PipelineError::TransactionReverted("x".into()).class(),
            ErrorClass::Intervention
        );
        assert_eq!(
            PipelineError::StateStoreUnavailable("x".into()).class(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_encoding_versions() {
        for encoding in [CanonicalEncoding::FlatV1, CanonicalEncoding::MerkleV2] {
            assert_eq!(
                CanonicalEncoding::from_version(encoding.version()).unwrap(),
                encoding
            );
        }
        assert!(CanonicalEncoding::from_version(9).is_err());
    }

    fn arb_state() -> impl Strategy<Value = PublicationState> {
        let stage = prop_oneof![
            Just(Stage::Pending),
            Just(Stage::CommitmentBuilt),
            Just(Stage::Signed),
            Just(Stage::Submitted),
        ];
        prop_oneof![
            Just(PublicationState::Pending),
            Just(PublicationState::CommitmentBuilt),
            Just(PublicationState::Signed),
            Just(PublicationState::Submitted),
            Just(PublicationState::Confirmed),
            stage.prop_map(|from| PublicationState::Failed {
                from,
                reason: "x".to_string()
            }),
        ]
    }

    proptest! {
        #[test]
        fn proptest_confirmed_is_absorbing(steps in prop::collection::vec(arb_state(), 1..40)) {
            let e = epoch(1);
            let mut record = PublicationRecord::new(&e, e.period_end);
            let mut seen_confirmed = false;
            for next in steps {
                let _ = record.transition(next, e.period_end, "step");
                if seen_confirmed {
                    prop_assert_eq!(&record.state, &PublicationState::Confirmed);
                }
                seen_confirmed |= record.is_terminal();
            }
        }

        #[test]
        fn proptest_stage_rank_never_decreases(steps in prop::collection::vec(arb_state(), 1..40)) {
            let e = epoch(1);
            let mut record = PublicationRecord::new(&e, e.period_end);
            let mut rank = 0u8;
            for next in steps {
                if record.transition(next, e.period_end, "step").is_ok() {
                    let current = record.stage().map(|s| s.rank()).unwrap_or(3);
                    prop_assert!(current >= rank);
                    rank = current;
                }
            }
        }
    }
}
