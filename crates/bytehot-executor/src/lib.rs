#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **bytehot-executor** – Invokes the host runtime's class-redefinition
//! primitive through [`InstrumentationPort`] and tracks the per-class state
//! machine `Requested -> Executing -> {Succeeded | Failed}`.
//!
//! A dedicated executor type owning a serialized work lane per class, that
//! transitions state and emits events around a single instrumented call into
//! an injected capability.

mod mock;

pub use mock::MockInstrumentationPort;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bytehot_events::{Envelope, RawEvent};
use bytehot_ports::{InstrumentationError, InstrumentationPort};
use bytehot_types::{AggregateId, AggregateType, BytecodeHash, ClassName, FailureKind};
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

/// Aggregate type tag every redefinition response event is recorded under.
pub const HOTSWAP_AGGREGATE_TYPE: &str = "hotswap";

/// A class body waiting to be redefined, holding the bytes the validator
/// already accepted alongside the causal `HotSwapRequested` envelope.
///
/// Only `new_bytecode_ref` (the digest) is persisted on the wire event; the
/// executor is handed the actual bytes directly by the router in the same
/// process rather than re-resolving them from a blob store, since no
/// bytecode-blob port exists — the validated bytes travel in-process from
/// validation to execution instead of round-tripping through the event
/// envelope.
#[derive(Clone)]
pub struct RedefinitionRequest {
    /// Fully-qualified class name to redefine.
    pub class_name: ClassName,
    /// Content digest of `new_bytecode`, matching `HotSwapRequested::new_bytecode_ref`.
    pub new_bytecode_ref: BytecodeHash,
    /// The validated class body to install.
    pub new_bytecode: Vec<u8>,
    /// The `HotSwapRequested` envelope this attempt responds to.
    pub cause: Envelope,
}

/// Owns one serialized work lane per class and drives each redefinition
/// attempt through its state machine.
pub struct Executor<P: InstrumentationPort> {
    instrumentation: Arc<P>,
    lanes: DashMap<ClassName, Arc<AsyncMutex<()>>>,
    pending: DashMap<ClassName, RedefinitionRequest>,
}

impl<P: InstrumentationPort> Executor<P> {
    /// Build an executor around an injected instrumentation capability.
    pub fn new(instrumentation: Arc<P>) -> Self {
        Self {
            instrumentation,
            lanes: DashMap::new(),
            pending: DashMap::new(),
        }
    }

    /// Submit a redefinition attempt. If no attempt is currently in flight
    /// for this class, it (and every request that coalesces onto it while
    /// it runs) is executed immediately, returning one response event per
    /// attempt actually performed. If an attempt is already in flight, this
    /// request replaces whatever was previously queued for the class —
    /// additional requests coalesce into the most recent — and an empty
    /// vector is returned; the in-flight attempt's caller
    /// receives this request's response event once it drains the queue.
    pub async fn submit(&self, request: RedefinitionRequest) -> Vec<RawEvent> {
        let class_name = request.class_name.clone();
        let lane = self
            .lanes
            .entry(class_name.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();

        let guard = match lane.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!(class_name = %class_name, "coalescing redefinition request into in-flight attempt");
                self.pending.insert(class_name, request);
                return Vec::new();
            }
        };

        let mut current = request;
        let mut events = Vec::new();
        loop {
            events.push(self.perform(&current).await);
            match self.pending.remove(&current.class_name) {
                Some((_, next)) => current = next,
                None => break,
            }
        }
        drop(guard);
        events
    }

    async fn perform(&self, request: &RedefinitionRequest) -> RawEvent {
        tracing::info!(class_name = %request.class_name, bytecode_hash = %request.new_bytecode_ref, "executing redefinition");
        let started = Instant::now();
        let outcome = if !self.instrumentation.can_redefine() {
            Err(InstrumentationError::UnsupportedOperation)
        } else {
            self.instrumentation
                .redefine_class(&request.class_name, &request.new_bytecode)
                .await
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let aggregate_type = AggregateType::new(HOTSWAP_AGGREGATE_TYPE).expect("static aggregate type is valid");
        let aggregate_id = AggregateId::new(request.class_name.clone())
            .unwrap_or_else(|_| AggregateId::new("unnamed-class").expect("fallback id is valid"));

        let payload = match outcome {
            Ok(()) => {
                tracing::info!(class_name = %request.class_name, duration_ms, "redefinition succeeded");
                bytehot_events::DomainEvent::ClassRedefinitionSucceeded {
                    class_name: request.class_name.clone(),
                    duration_ms,
                }
            }
            Err(err) => {
                tracing::warn!(class_name = %request.class_name, error = %err, "redefinition failed");
                bytehot_events::DomainEvent::ClassRedefinitionFailed {
                    class_name: request.class_name.clone(),
                    kind: failure_kind_of(&err),
                    message: err.to_string(),
                }
            }
        };

        RawEvent::new(aggregate_type, aggregate_id, payload).caused_by(&request.cause)
    }

    /// Whether a redefinition is currently executing or queued for `class_name`.
    pub fn is_busy(&self, class_name: &str) -> bool {
        self.pending.contains_key(class_name)
            || self
                .lanes
                .get(class_name)
                .map(|lane| lane.try_lock().is_err())
                .unwrap_or(false)
    }
}

fn failure_kind_of(error: &InstrumentationError) -> FailureKind {
    match error {
        InstrumentationError::UnsupportedOperation => FailureKind::UnsupportedOperation,
        InstrumentationError::VerifierRejected(_) => FailureKind::VerifierRejected,
        InstrumentationError::ClassNotFound(_) => FailureKind::ClassNotFound,
        InstrumentationError::IncompatibleChange(_) => FailureKind::IncompatibleChange,
        InstrumentationError::IoError(_) => FailureKind::IoError,
        InstrumentationError::Unknown(_) => FailureKind::Unknown,
    }
}

/// Snapshot of redefinition attempt counts, used by the caller to compute an
/// [`bytehot_observability::MetricSnapshot`] for alerting without the
/// executor depending on the observability crate directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutionCounts {
    /// Attempts that ended in `ClassRedefinitionSucceeded`.
    pub succeeded: u64,
    /// Attempts that ended in `ClassRedefinitionFailed`.
    pub failed: u64,
}

/// Tally the outcome of a batch of response events, for callers that want a
/// quick `ExecutionCounts` without re-deriving it from the event store.
pub fn tally(events: &[RawEvent]) -> ExecutionCounts {
    let mut counts = ExecutionCounts::default();
    for event in events {
        match &event.payload {
            bytehot_events::DomainEvent::ClassRedefinitionSucceeded { .. } => counts.succeeded += 1,
            bytehot_events::DomainEvent::ClassRedefinitionFailed { .. } => counts.failed += 1,
            _ => {}
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytehot_events::DomainEvent;

    fn cause_envelope() -> Envelope {
        let aggregate_type = AggregateType::new(HOTSWAP_AGGREGATE_TYPE).unwrap();
        let aggregate_id = AggregateId::new("com.example.Widget").unwrap();
        Envelope::for_new_session(
            aggregate_type,
            aggregate_id,
            DomainEvent::HotSwapRequested {
                class_name: "com.example.Widget".to_string(),
                new_bytecode_ref: BytecodeHash::of(b"bytecode"),
            },
        )
    }

    fn request() -> RedefinitionRequest {
        RedefinitionRequest {
            class_name: "com.example.Widget".to_string(),
            new_bytecode_ref: BytecodeHash::of(b"bytecode"),
            new_bytecode: b"bytecode".to_vec(),
            cause: cause_envelope(),
        }
    }

    #[tokio::test]
    async fn successful_redefinition_emits_succeeded_event() {
        let executor = Executor::new(Arc::new(MockInstrumentationPort::always_succeeds()));
        let events = executor.submit(request()).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].payload,
            DomainEvent::ClassRedefinitionSucceeded { .. }
        ));
        assert_eq!(events[0].cause_id, Some(request().cause.event_id));
    }

    #[tokio::test]
    async fn failed_redefinition_carries_the_failure_kind() {
        let executor = Executor::new(Arc::new(MockInstrumentationPort::always_fails(
            InstrumentationError::VerifierRejected("bad bytecode".to_string()),
        )));
        let events = executor.submit(request()).await;
        match &events[0].payload {
            DomainEvent::ClassRedefinitionFailed { kind, .. } => {
                assert_eq!(*kind, FailureKind::VerifierRejected);
            }
            other => panic!("expected a failure event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn incapable_host_fails_with_unsupported_operation() {
        let executor = Executor::new(Arc::new(MockInstrumentationPort::incapable()));
        let events = executor.submit(request()).await;
        match &events[0].payload {
            DomainEvent::ClassRedefinitionFailed { kind, .. } => {
                assert_eq!(*kind, FailureKind::UnsupportedOperation);
            }
            other => panic!("expected a failure event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_requests_for_the_same_class_serialize_and_coalesce() {
        let executor = Arc::new(Executor::new(Arc::new(MockInstrumentationPort::always_succeeds())));
        let mut handles = Vec::new();
        for _ in 0..5 {
            let executor = executor.clone();
            handles.push(tokio::spawn(async move { executor.submit(request()).await }));
        }
        let mut total_events = 0;
        for handle in handles {
            total_events += handle.await.unwrap().len();
        }
        // Every submission either ran immediately or coalesced; at least one
        // attempt must have actually executed, and never more than one
        // response event per accepted request.
        assert!(total_events >= 1);
        assert!(total_events <= 5);
    }

    #[test]
    fn tally_counts_successes_and_failures() {
        let succeeded = RawEvent::new(
            AggregateType::new("hotswap").unwrap(),
            AggregateId::new("A").unwrap(),
            DomainEvent::ClassRedefinitionSucceeded {
                class_name: "A".to_string(),
                duration_ms: 1,
            },
        );
        let failed = RawEvent::new(
            AggregateType::new("hotswap").unwrap(),
            AggregateId::new("B").unwrap(),
            DomainEvent::ClassRedefinitionFailed {
                class_name: "B".to_string(),
                kind: FailureKind::Unknown,
                message: "x".to_string(),
            },
        );
        let counts = tally(&[succeeded, failed]);
        assert_eq!(counts.succeeded, 1);
        assert_eq!(counts.failed, 1);
    }
}
