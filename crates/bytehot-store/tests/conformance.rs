//! Shared conformance suite run against every [`EventStore`] backend,
//! asserting the same quantified invariants hold identically regardless of
//! which backend is under test.

use bytehot_events::{DomainEvent, Envelope};
use bytehot_store::{EventStore, EventStoreError, FsEventStore, MemoryEventStore};
use bytehot_types::{AggregateId, AggregateType};
use tempfile::tempdir;

fn sample_event(n: u64) -> DomainEvent {
    DomainEvent::ClassFileChanged {
        path: format!("/proj/Service{n}.class"),
        class_name: Some(format!("Service{n}")),
        size_bytes: n,
        detected_at: chrono::Utc::now(),
    }
}

async fn append_chain(store: &dyn EventStore, aggregate_type: &AggregateType, aggregate_id: &AggregateId, count: u64) {
    let mut previous: Option<(uuid::Uuid, u64)> = None;
    for n in 1..=count {
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
}

async fn assert_conforms(store: &dyn EventStore) {
    let aggregate_type = AggregateType::new("filewatch").unwrap();
    let aggregate_id = AggregateId::new("/proj/Service.class").unwrap();

    assert_eq!(store.current_version(&aggregate_type, &aggregate_id).await.unwrap(), 0);
    assert!(!store.exists(&aggregate_type, &aggregate_id).await.unwrap());

    append_chain(store, &aggregate_type, &aggregate_id, 5).await;

    let events = store.events_for(&aggregate_type, &aggregate_id).await.unwrap();
    assert_eq!(events.len(), 5);
    // events_for is strictly ascending by aggregate_version.
    for (index, event) in events.iter().enumerate() {
        assert_eq!(event.aggregate_version, index as u64 + 1);
    }
    for window in events.windows(2) {
        assert_eq!(window[1].previous_event_id, Some(window[0].event_id));
    }

    assert_eq!(
        store.current_version(&aggregate_type, &aggregate_id).await.unwrap(),
        5
    );
    assert!(store.exists(&aggregate_type, &aggregate_id).await.unwrap());
    assert_eq!(store.count_for(&aggregate_type, &aggregate_id).await.unwrap(), 5);

    let since = store
        .events_for_since(&aggregate_type, &aggregate_id, 3)
        .await
        .unwrap();
    assert_eq!(since.len(), 2);
    assert!(since.iter().all(|e| e.aggregate_version > 3));

    let by_type = store.events_by_type("class_file_changed").await.unwrap();
    assert_eq!(by_type.len(), 5);

    assert!(store.aggregate_types().await.unwrap().contains(&aggregate_type));
    assert!(store
        .aggregate_ids(&aggregate_type)
        .await
        .unwrap()
        .contains(&aggregate_id));

    assert_eq!(store.total_count().await.unwrap(), 5);
    assert!(store.is_healthy().await);

    // Appending out of sequence is rejected, not silently accepted.
    let bad = Envelope::for_existing_session(
        aggregate_type.clone(),
        aggregate_id.clone(),
        uuid::Uuid::new_v4(),
        99,
        sample_event(100),
    );
    let err = store.append(bad).await.unwrap_err();
    assert!(matches!(err, EventStoreError::ConcurrencyConflict { .. }));
}

#[tokio::test]
async fn memory_backend_conforms() {
    let store = MemoryEventStore::new();
    assert_conforms(&store).await;
}

#[tokio::test]
async fn fs_backend_conforms() {
    let dir = tempdir().unwrap();
    let store = FsEventStore::open(dir.path()).await.unwrap();
    assert_conforms(&store).await;
}

#[tokio::test]
async fn serialize_then_deserialize_preserves_structural_equality() {
    let aggregate_type = AggregateType::new("filewatch").unwrap();
    let aggregate_id = AggregateId::new("X").unwrap();
    let envelope = Envelope::for_new_session(aggregate_type, aggregate_id, sample_event(1));
    let json = serde_json::to_string(&envelope).unwrap();
    let back: Envelope = serde_json::from_str(&json).unwrap();
    assert_eq!(envelope, back);
}
