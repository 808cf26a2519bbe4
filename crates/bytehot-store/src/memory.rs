use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytehot_events::Envelope;
use bytehot_types::{AggregateId, AggregateType, AggregateVersion};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};

use crate::error::EventStoreError;
use crate::store::EventStore;

/// Default buffer size for the live event broadcast channel.
const DEFAULT_BUFFER: usize = 1024;

/// An in-memory, non-persistent [`EventStore`].
///
/// All state lives behind a single `RwLock<HashMap<...>>`, so `append`
/// naturally serializes per-process — there is no separate advisory-lock
/// layer the way [`crate::fs::FsEventStore`] needs one. Suitable for tests
/// and for in-process use where persistence across restarts is not
/// required.
#[derive(Debug, Clone)]
pub struct MemoryEventStore {
    aggregates: Arc<RwLock<HashMap<(AggregateType, AggregateId), Vec<Envelope>>>>,
    broadcast_tx: broadcast::Sender<Envelope>,
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventStore {
    /// Create a new, empty store with the default broadcast buffer size.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER)
    }

    /// Create a new, empty store with a custom live-tail buffer size.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(buffer_size);
        Self {
            aggregates: Arc::new(RwLock::new(HashMap::new())),
            broadcast_tx,
        }
    }

    /// Subscribe to a live stream of every event as it is appended.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.broadcast_tx.subscribe()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, envelope: Envelope) -> Result<(), EventStoreError> {
        let key = (envelope.aggregate_type.clone(), envelope.aggregate_id.clone());
        let mut aggregates = self.aggregates.write().await;
        let history = aggregates.entry(key).or_default();
        let expected = history.last().map(|e| e.aggregate_version).unwrap_or(0) + 1;
        if envelope.aggregate_version != expected {
            tracing::warn!(
                aggregate_type = envelope.aggregate_type.as_str(),
                aggregate_id = envelope.aggregate_id.as_str(),
                expected,
                actual = envelope.aggregate_version,
                "concurrency conflict appending event"
            );
            return Err(EventStoreError::ConcurrencyConflict {
                expected,
                actual: envelope.aggregate_version,
            });
        }
        history.push(envelope.clone());
        let _ = self.broadcast_tx.send(envelope);
        Ok(())
    }

    async fn events_for(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<Envelope>, EventStoreError> {
        let aggregates = self.aggregates.read().await;
        Ok(aggregates
            .get(&(aggregate_type.clone(), aggregate_id.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn events_for_since(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
        from_version_exclusive: AggregateVersion,
    ) -> Result<Vec<Envelope>, EventStoreError> {
        Ok(self
            .events_for(aggregate_type, aggregate_id)
            .await?
            .into_iter()
            .filter(|e| e.aggregate_version > from_version_exclusive)
            .collect())
    }

    async fn current_version(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<AggregateVersion, EventStoreError> {
        Ok(self
            .events_for(aggregate_type, aggregate_id)
            .await?
            .last()
            .map(|e| e.aggregate_version)
            .unwrap_or(0))
    }

    async fn exists(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<bool, EventStoreError> {
        Ok(self.current_version(aggregate_type, aggregate_id).await? > 0)
    }

    async fn events_by_type(&self, event_kind: &str) -> Result<Vec<Envelope>, EventStoreError> {
        let aggregates = self.aggregates.read().await;
        let mut matches: Vec<Envelope> = aggregates
            .values()
            .flatten()
            .filter(|e| e.payload.kind() == event_kind)
            .cloned()
            .collect();
        matches.sort_by_key(|e| e.timestamp);
        Ok(matches)
    }

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, EventStoreError> {
        let aggregates = self.aggregates.read().await;
        let mut matches: Vec<Envelope> = aggregates
            .values()
            .flatten()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect();
        matches.sort_by_key(|e| e.timestamp);
        Ok(matches)
    }

    async fn aggregate_types(&self) -> Result<Vec<AggregateType>, EventStoreError> {
        let aggregates = self.aggregates.read().await;
        let mut types: Vec<AggregateType> = aggregates
            .keys()
            .map(|(t, _)| t.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        types.sort();
        Ok(types)
    }

    async fn aggregate_ids(
        &self,
        aggregate_type: &AggregateType,
    ) -> Result<Vec<AggregateId>, EventStoreError> {
        let aggregates = self.aggregates.read().await;
        let mut ids: Vec<AggregateId> = aggregates
            .keys()
            .filter(|(t, _)| t == aggregate_type)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn total_count(&self) -> Result<u64, EventStoreError> {
        let aggregates = self.aggregates.read().await;
        Ok(aggregates.values().map(|v| v.len() as u64).sum())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytehot_events::DomainEvent;

    fn change_event() -> DomainEvent {
        DomainEvent::ClassFileChanged {
            path: "/proj/UserService.class".to_string(),
            class_name: Some("UserService".to_string()),
            size_bytes: 10,
            detected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_then_events_for_returns_event_at_its_version() {
        let store = MemoryEventStore::new();
        let aggregate_type = AggregateType::new("filewatch").unwrap();
        let aggregate_id = AggregateId::new("X").unwrap();
        let envelope = Envelope::for_new_session(aggregate_type.clone(), aggregate_id.clone(), change_event());
        store.append(envelope.clone()).await.unwrap();

        let events = store.events_for(&aggregate_type, &aggregate_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].aggregate_version, 1);
        assert_eq!(events[0].event_id, envelope.event_id);
    }

    #[tokio::test]
    async fn append_with_wrong_version_is_a_concurrency_conflict() {
        let store = MemoryEventStore::new();
        let aggregate_type = AggregateType::new("filewatch").unwrap();
        let aggregate_id = AggregateId::new("X").unwrap();
        let mut envelope = Envelope::for_new_session(aggregate_type, aggregate_id, change_event());
        envelope.aggregate_version = 2;

        let err = store.append(envelope).await.unwrap_err();
        assert!(matches!(
            err,
            EventStoreError::ConcurrencyConflict {
                expected: 1,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn current_version_is_zero_for_unknown_aggregate() {
        let store = MemoryEventStore::new();
        let aggregate_type = AggregateType::new("filewatch").unwrap();
        let aggregate_id = AggregateId::new("nonexistent").unwrap();
        assert_eq!(
            store.current_version(&aggregate_type, &aggregate_id).await.unwrap(),
            0
        );
        assert!(!store.exists(&aggregate_type, &aggregate_id).await.unwrap());
    }

    #[tokio::test]
    async fn events_for_returns_strictly_ascending_versions() {
        let store = MemoryEventStore::new();
        let aggregate_type = AggregateType::new("filewatch").unwrap();
        let aggregate_id = AggregateId::new("X").unwrap();
        let first = Envelope::for_new_session(aggregate_type.clone(), aggregate_id.clone(), change_event());
        store.append(first.clone()).await.unwrap();
        let second = Envelope::for_existing_session(
            aggregate_type.clone(),
            aggregate_id.clone(),
            first.event_id,
            first.aggregate_version,
            change_event(),
        );
        store.append(second).await.unwrap();

        let events = store.events_for(&aggregate_type, &aggregate_id).await.unwrap();
        let versions: Vec<_> = events.iter().map(|e| e.aggregate_version).collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[tokio::test]
    async fn concurrent_appends_at_same_version_exactly_one_succeeds() {
        let store = Arc::new(MemoryEventStore::new());
        let aggregate_type = AggregateType::new("filewatch").unwrap();
        let aggregate_id = AggregateId::new("X").unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let aggregate_type = aggregate_type.clone();
            let aggregate_id = aggregate_id.clone();
            handles.push(tokio::spawn(async move {
                let envelope =
                    Envelope::for_new_session(aggregate_type, aggregate_id, change_event());
                store.append(envelope).await
            }));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
