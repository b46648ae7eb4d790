// Integration tests for the epoch clock

#[cfg(test)]
mod tests {
    use crate::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let clock = EpochClock::weekly(anchor());
        let boundary = clock.epoch_at(1).unwrap().period_end;

        // Exactly at the end of epoch 1 it is completed
        let due = clock.current_due_epoch(boundary, Some(0)).unwrap();
        assert_eq!(due.epoch_id, 1);

        // One millisecond earlier it is not
        assert!(clock
            .current_due_epoch(boundary - Duration::milliseconds(1), Some(0))
            .is_none());
    }

    #[test]
    fn test_nothing_due_when_caught_up() {
        let clock = EpochClock::weekly(anchor());
        let now = anchor() + Duration::days(10); // inside epoch 1
        assert_eq!(clock.latest_completed(now).unwrap().epoch_id, 0);
        assert!(clock.current_due_epoch(now, Some(0)).is_none());
    }

    #[test]
    fn test_catch_up_never_skips() {
        let clock = EpochClock::weekly(anchor());
        let now = anchor() + Duration::weeks(10) + Duration::hours(1);

        // Several epochs have ended since epoch 3; the next due one is still 4
        let due = clock.current_due_epoch(now, Some(3)).unwrap();
        assert_eq!(due.epoch_id, 4);
    }

    #[test]
    fn test_empty_store_uses_latest_completed() {
        let clock = EpochClock::weekly(anchor());
        let now = anchor() + Duration::weeks(42) + Duration::days(3);
        let due = clock.current_due_epoch(now, None).unwrap();
        assert_eq!(due.epoch_id, 41);
    }

    #[test]
    fn test_empty_store_uses_start_epoch() {
        let clock = EpochClock::weekly(anchor()).with_start_epoch(Some(40));
        let now = anchor() + Duration::weeks(42) + Duration::days(3);
        assert_eq!(clock.current_due_epoch(now, None).unwrap().epoch_id, 40);

        // A start epoch in the future is not due yet
        let clock = EpochClock::weekly(anchor()).with_start_epoch(Some(50));
        assert!(clock.current_due_epoch(now, None).is_none());
    }

    #[test]
    fn test_custom_cadence() {
        let clock = EpochClock::new(anchor(), std::time::Duration::from_secs(3600)).unwrap();
        let now = anchor() + Duration::minutes(150);
        assert_eq!(clock.epoch_containing(now), Some(2));
        assert_eq!(clock.latest_completed(now).unwrap().epoch_id, 1);
    }

    proptest! {
        #[test]
        fn proptest_due_epoch_is_deterministic_and_ended(
            offset_mins in 0i64..(60 * 24 * 7 * 200),
            last in proptest::option::of(0u64..200),
        ) {
            let clock = EpochClock::weekly(anchor());
            let now = anchor() + Duration::minutes(offset_mins);
            let a = clock.current_due_epoch(now, last);
            let b = clock.current_due_epoch(now, last);
            prop_assert_eq!(a, b);
            if let Some(epoch) = a {
                prop_assert!(epoch.period_end <= now);
                if let Some(last) = last {
                    prop_assert_eq!(epoch.epoch_id, last + 1);
                }
            }
        }

        #[test]
        fn proptest_epoch_contains_now(offset_mins in 0i64..(60 * 24 * 7 * 200)) {
            let clock = EpochClock::weekly(anchor());
            let now = anchor() + Duration::minutes(offset_mins);
            let id = clock.epoch_containing(now).unwrap();
            prop_assert!(clock.epoch_at(id).unwrap().contains(now));
        }
    }
}
