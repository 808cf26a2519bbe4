//! Property tests for the append/version invariants, run against
//! [`MemoryEventStore`] (the in-process backend; `tests/conformance.rs`
//! already exercises both backends identically for the fixed-scenario
//! suite).

use bytehot_events::{DomainEvent, Envelope};
use bytehot_store::{EventStore, EventStoreError, MemoryEventStore};
use bytehot_types::{AggregateId, AggregateType};
use proptest::prelude::*;

fn sample_event(n: u64) -> DomainEvent {
    DomainEvent::ClassFileChanged {
        path: format!("/proj/Service{n}.class"),
        class_name: Some(format!("Service{n}")),
        size_bytes: n,
        detected_at: chrono::Utc::now(),
    }
}

proptest! {
    #[test]
    fn sequential_append_always_succeeds_and_is_returned_in_order(length in 1usize..30) {
        tokio_test::block_on(async {
            let store = MemoryEventStore::new();
            let aggregate_type = AggregateType::new("filewatch").unwrap();
            let aggregate_id = AggregateId::new("X").unwrap();

            let mut previous: Option<(uuid::Uuid, u64)> = None;
            for n in 0..length as u64 {
                let envelope = match previous {
                    None => Envelope::for_new_session(aggregate_type.clone(), aggregate_id.clone(), sample_event(n)),
                    Some((id, version)) => Envelope::for_existing_session(
                        aggregate_type.clone(),
                        aggregate_id.clone(),
                        id,
                        version,
                        sample_event(n),
                    ),
                };
                previous = Some((envelope.event_id, envelope.aggregate_version));
                store.append(envelope).await.unwrap();
            }

            let events = store.events_for(&aggregate_type, &aggregate_id).await.unwrap();
            prop_assert_eq!(events.len(), length);
            for window in events.windows(2) {
                prop_assert!(window[0].aggregate_version < window[1].aggregate_version);
            }
            Ok(())
        })?;
    }

    #[test]
    fn appending_any_version_other_than_current_plus_one_is_rejected(
        jump in 2u64..50,
    ) {
        tokio_test::block_on(async {
            let store = MemoryEventStore::new();
            let aggregate_type = AggregateType::new("filewatch").unwrap();
            let aggregate_id = AggregateId::new("X").unwrap();

            let mut envelope = Envelope::for_new_session(aggregate_type.clone(), aggregate_id, sample_event(0));
            envelope.aggregate_version = jump;

            let err = store.append(envelope).await.unwrap_err();
            prop_assert!(matches!(
                err,
                EventStoreError::ConcurrencyConflict { expected: 1, actual } if actual == jump
            ));
            Ok(())
        })?;
    }
}
