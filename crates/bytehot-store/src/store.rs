use std::sync::Arc;

use async_trait::async_trait;
use bytehot_events::Envelope;
use bytehot_ports::{EventStorePort, PortError};
use bytehot_types::{AggregateId, AggregateType, AggregateVersion};
use chrono::{DateTime, Utc};

use crate::error::EventStoreError;

/// Full query surface of an append-only event store.
///
/// Concrete backends ([`crate::memory::MemoryEventStore`],
/// [`crate::fs::FsEventStore`]) implement this trait directly; callers that
/// only need the router's minimal subset (`append`/`events_for`/
/// `current_version`) can instead depend on [`bytehot_ports::EventStorePort`]
/// via [`AsEventStorePort`], keeping the domain core decoupled from the
/// richer query surface this trait exposes for the CLI and observability.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append `envelope`, enforcing that `aggregate_version` equals
    /// `current_version(...) + 1`.
    async fn append(&self, envelope: Envelope) -> Result<(), EventStoreError>;

    /// Every event recorded for one aggregate instance, ascending by
    /// `aggregate_version`.
    async fn events_for(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<Envelope>, EventStoreError>;

    /// Events for one aggregate instance with `aggregate_version` strictly
    /// greater than `from_version_exclusive`.
    async fn events_for_since(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
        from_version_exclusive: AggregateVersion,
    ) -> Result<Vec<Envelope>, EventStoreError>;

    /// The highest version recorded for an aggregate, or `0` if it has no
    /// events yet.
    async fn current_version(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<AggregateVersion, EventStoreError>;

    /// Whether any event has been recorded for this aggregate.
    async fn exists(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<bool, EventStoreError>;

    /// Every event of a given payload kind (`DomainEvent::kind()`), ordered
    /// by timestamp ascending, across all aggregates.
    async fn events_by_type(&self, event_kind: &str) -> Result<Vec<Envelope>, EventStoreError>;

    /// Every event with `start <= timestamp <= end`, across all aggregates.
    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, EventStoreError>;

    /// Every distinct `aggregate_type` with at least one recorded event.
    async fn aggregate_types(&self) -> Result<Vec<AggregateType>, EventStoreError>;

    /// Every distinct `aggregate_id` recorded under `aggregate_type`.
    async fn aggregate_ids(
        &self,
        aggregate_type: &AggregateType,
    ) -> Result<Vec<AggregateId>, EventStoreError>;

    /// Number of events recorded for one aggregate instance.
    async fn count_for(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<u64, EventStoreError> {
        Ok(self.events_for(aggregate_type, aggregate_id).await?.len() as u64)
    }

    /// Number of events recorded across every aggregate.
    async fn total_count(&self) -> Result<u64, EventStoreError>;

    /// Whether the backend is currently able to serve reads and writes.
    async fn is_healthy(&self) -> bool;
}

/// Adapts any [`EventStore`] to the minimal [`EventStorePort`] the router
/// depends on, mapping [`EventStoreError`] into the port-level [`PortError`].
pub struct AsEventStorePort<S: EventStore>(
    /// The wrapped store implementation.
    pub Arc<S>,
);

#[async_trait]
impl<S: EventStore> EventStorePort for AsEventStorePort<S> {
    async fn append(&self, envelope: Envelope) -> Result<(), PortError> {
        self.0.append(envelope).await.map_err(to_port_error)
    }

    async fn events_for(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<Envelope>, PortError> {
        self.0
            .events_for(aggregate_type, aggregate_id)
            .await
            .map_err(to_port_error)
    }

    async fn current_version(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<Option<AggregateVersion>, PortError> {
        let version = self
            .0
            .current_version(aggregate_type, aggregate_id)
            .await
            .map_err(to_port_error)?;
        Ok(if version == 0 { None } else { Some(version) })
    }
}

fn to_port_error(err: EventStoreError) -> PortError {
    PortError::Adapter(Box::new(err))
}
