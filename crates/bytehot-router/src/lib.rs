#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **bytehot-router** – Event router / application hub for ByteHot Core.
//!
//! Dispatches incoming domain events by matching on their kind, running each
//! through its handler, and publishing the resulting events. The router owns
//! no durable state of its own beyond two in-flight caches used across
//! changes to the same class: the "previous accepted bytecode" the validator
//! diffs the next change against, and the structural metadata extracted from
//! it, invalidated the moment a redefinition actually succeeds. Everything
//! else lives in the event store.

use std::sync::Arc;
use std::time::Duration;

use bytehot_events::{DomainEvent, Envelope, RawEvent};
use bytehot_executor::{Executor, RedefinitionRequest};
use bytehot_observability::LruTtlCache;
use bytehot_ports::{EventEmitterPort, EventStorePort, InstrumentationPort, PortError};
use bytehot_types::{AggregateId, AggregateType, BytecodeHash, ClassName, TypeError, ValidationMode};
use bytehot_validator::{ClassMetadata, Validator, ValidationOutcome};

/// Aggregate type the bootstrap/attach lifecycle is recorded under.
pub const AGENT_AGGREGATE_TYPE: &str = "bytehot";

/// Singleton aggregate id for the agent's own attach lifecycle (one process,
/// one attach lifecycle).
pub const AGENT_AGGREGATE_ID: &str = "agent";

/// Aggregate type the validation/redefinition pipeline for one class is
/// recorded under.
pub const HOTSWAP_AGGREGATE_TYPE: &str = "hotswap";

/// Default bound on the number of distinct classes whose last-accepted
/// bytecode is retained for diffing.
pub const DEFAULT_PREVIOUS_BYTECODE_CAPACITY: usize = 4096;

/// Default time-to-live for a cached "previous accepted bytecode" entry.
pub const DEFAULT_PREVIOUS_BYTECODE_TTL: Duration = Duration::from_secs(3600);

/// Default bound on the number of distinct classes whose extracted structural
/// metadata is cached.
pub const DEFAULT_CLASS_METADATA_CAPACITY: usize = 4096;

/// Default time-to-live for a cached class-metadata entry. Generous relative
/// to the validation cache's TTL since this entry is actively invalidated on
/// redefinition rather than relied on to expire.
pub const DEFAULT_CLASS_METADATA_TTL: Duration = Duration::from_secs(3600);

/// Errors surfaced by [`Router::accept`].
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The event store or emitter port reported a failure.
    #[error("port error: {0}")]
    Port(#[from] PortError),
    /// An aggregate identity derived from event payload fields was invalid.
    #[error("invalid aggregate identity: {0}")]
    Identity(#[from] TypeError),
}

/// Dispatches incoming domain events to their aggregate handlers, persisting
/// and emitting every event (cause and responses alike) as it goes.
pub struct Router<P: InstrumentationPort> {
    store: Arc<dyn EventStorePort>,
    emitter: Arc<dyn EventEmitterPort>,
    instrumentation: Arc<P>,
    validator: Validator,
    executor: Executor<P>,
    previous_bytecode: LruTtlCache<ClassName, Vec<u8>>,
    class_metadata: LruTtlCache<ClassName, ClassMetadata>,
    validation_mode: ValidationMode,
}

impl<P: InstrumentationPort + 'static> Router<P> {
    /// Build a router around the given ports, validating under `validation_mode`.
    pub fn new(
        store: Arc<dyn EventStorePort>,
        emitter: Arc<dyn EventEmitterPort>,
        instrumentation: Arc<P>,
        validation_mode: ValidationMode,
    ) -> Self {
        let executor = Executor::new(instrumentation.clone());
        Self {
            store,
            emitter,
            instrumentation,
            validator: Validator::default(),
            executor,
            previous_bytecode: LruTtlCache::new(
                DEFAULT_PREVIOUS_BYTECODE_CAPACITY,
                DEFAULT_PREVIOUS_BYTECODE_TTL,
            ),
            class_metadata: LruTtlCache::new(DEFAULT_CLASS_METADATA_CAPACITY, DEFAULT_CLASS_METADATA_TTL),
            validation_mode,
        }
    }

    /// Structural metadata extracted the last time `class_name` was
    /// successfully validated, if it is still cached. Invalidated whenever
    /// that class is successfully redefined, since the cached shape then
    /// describes a body the host no longer has loaded.
    pub fn cached_class_metadata(&self, class_name: &ClassName) -> Option<ClassMetadata> {
        self.class_metadata.get(class_name)
    }

    /// Change the validation strictness applied to subsequent changes
    /// (e.g. after a configuration reload).
    pub fn set_validation_mode(&mut self, mode: ValidationMode) {
        self.validation_mode = mode;
    }

    /// Accept an adapter-produced [`RawEvent`], version it into the event
    /// store, and dispatch it to the appropriate handler.
    ///
    /// Returns every response event produced, in emission order. The cause
    /// event itself is persisted and emitted but not included in the
    /// returned list.
    pub async fn accept(&self, raw: RawEvent) -> Result<Vec<Envelope>, RouterError> {
        let cause = self.record(raw).await?;
        self.dispatch(&cause).await
    }

    async fn dispatch(&self, cause: &Envelope) -> Result<Vec<Envelope>, RouterError> {
        match cause.payload.clone() {
            DomainEvent::ByteHotAttachRequested {
                configuration,
                instrumentation_handle: _,
            } => {
                let aggregate_type = AggregateType::new(AGENT_AGGREGATE_TYPE)?;
                let aggregate_id = AggregateId::new(AGENT_AGGREGATE_ID)?;

                if configuration.watch_paths.is_empty() {
                    let not_started = self
                        .respond(
                            cause,
                            aggregate_type,
                            aggregate_id,
                            DomainEvent::ByteHotNotStarted {
                                reason: "no watch paths configured".to_string(),
                            },
                        )
                        .await?;
                    return Ok(vec![not_started]);
                }

                let mut responses = Vec::new();
                for watch_path in &configuration.watch_paths {
                    responses.push(
                        self.respond(
                            cause,
                            aggregate_type.clone(),
                            aggregate_id.clone(),
                            DomainEvent::WatchPathConfigured {
                                path: watch_path.path.clone(),
                                patterns: watch_path.patterns.clone(),
                                recursive: watch_path.recursive,
                            },
                        )
                        .await?,
                    );
                }
                responses.push(
                    self.respond(
                        cause,
                        aggregate_type.clone(),
                        aggregate_id.clone(),
                        DomainEvent::ByteHotAgentAttached { configuration },
                    )
                    .await?,
                );
                let can_redefine = self.instrumentation.can_redefine();
                let can_retransform = self.instrumentation.can_retransform();
                if can_redefine || can_retransform {
                    responses.push(
                        self.respond(
                            cause,
                            aggregate_type,
                            aggregate_id,
                            DomainEvent::HotSwapCapabilityEnabled {
                                can_redefine,
                                can_retransform,
                            },
                        )
                        .await?,
                    );
                }
                Ok(responses)
            }

            DomainEvent::ClassFileChanged { path, class_name, .. } => {
                metrics::counter!(bytehot_observability::metric_names::CHANGES_DETECTED_TOTAL).increment(1);
                self.handle_class_file_changed(cause, path, class_name).await
            }

            other => {
                let original_kind = other.kind().to_string();
                let response = self
                    .respond(
                        cause,
                        cause.aggregate_type.clone(),
                        cause.aggregate_id.clone(),
                        DomainEvent::UnknownEventResponse { original_kind },
                    )
                    .await?;
                Ok(vec![response])
            }
        }
    }

    async fn handle_class_file_changed(
        &self,
        cause: &Envelope,
        path: String,
        class_name: Option<ClassName>,
    ) -> Result<Vec<Envelope>, RouterError> {
        let class_name = class_name.unwrap_or_else(|| path.clone());
        let aggregate_type = AggregateType::new(HOTSWAP_AGGREGATE_TYPE)?;
        let aggregate_id = AggregateId::new(class_name.clone())
            .unwrap_or_else(|_| AggregateId::new("unnamed-class").expect("fallback id is valid"));

        let new_bytecode = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "failed to read changed class file");
                let rejected = self
                    .respond(
                        cause,
                        aggregate_type,
                        aggregate_id,
                        DomainEvent::BytecodeRejected {
                            bytecode_hash: BytecodeHash::of(&[]),
                            class_name,
                            violations: vec![bytehot_types::Violation::Malformed {
                                reason: format!("could not read {path}: {err}"),
                            }],
                        },
                    )
                    .await?;
                return Ok(vec![rejected]);
            }
        };

        let previous_bytecode = self.previous_bytecode.get(&class_name);
        let host_allows_method_addition = self.instrumentation.can_retransform();
        let started = std::time::Instant::now();
        let (bytecode_hash, outcome) = self.validator.validate(
            previous_bytecode.as_deref(),
            &new_bytecode,
            self.validation_mode,
            host_allows_method_addition,
        );
        metrics::counter!(
            bytehot_observability::metric_names::VALIDATIONS_TOTAL,
            "outcome" => if matches!(outcome, ValidationOutcome::Accepted { .. }) { "accepted" } else { "rejected" }
        )
        .increment(1);
        metrics::histogram!(bytehot_observability::metric_names::VALIDATION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        match outcome {
            ValidationOutcome::Rejected { violations } => {
                let rejected = self
                    .respond(
                        cause,
                        aggregate_type,
                        aggregate_id,
                        DomainEvent::BytecodeRejected {
                            bytecode_hash,
                            class_name,
                            violations,
                        },
                    )
                    .await?;
                Ok(vec![rejected])
            }
            ValidationOutcome::Accepted { metadata } => {
                self.class_metadata.insert(class_name.clone(), metadata);
                let validated = self
                    .respond(
                        cause,
                        aggregate_type.clone(),
                        aggregate_id.clone(),
                        DomainEvent::BytecodeValidated {
                            bytecode_hash,
                            class_name: class_name.clone(),
                        },
                    )
                    .await?;

                let hotswap_request = self
                    .respond(
                        &validated,
                        aggregate_type.clone(),
                        aggregate_id.clone(),
                        DomainEvent::HotSwapRequested {
                            class_name: class_name.clone(),
                            new_bytecode_ref: bytecode_hash,
                        },
                    )
                    .await?;

                let mut responses = vec![validated, hotswap_request.clone()];

                let exec_events = self
                    .executor
                    .submit(RedefinitionRequest {
                        class_name: class_name.clone(),
                        new_bytecode_ref: bytecode_hash,
                        new_bytecode: new_bytecode.clone(),
                        cause: hotswap_request,
                    })
                    .await;

                for raw in exec_events {
                    let succeeded = matches!(raw.payload, DomainEvent::ClassRedefinitionSucceeded { .. });
                    if let DomainEvent::ClassRedefinitionSucceeded { duration_ms, .. } = &raw.payload {
                        metrics::counter!(bytehot_observability::metric_names::REDEFINITIONS_TOTAL, "outcome" => "succeeded")
                            .increment(1);
                        metrics::histogram!(bytehot_observability::metric_names::REDEFINITION_DURATION_SECONDS)
                            .record(*duration_ms as f64 / 1000.0);
                    } else if matches!(raw.payload, DomainEvent::ClassRedefinitionFailed { .. }) {
                        metrics::counter!(bytehot_observability::metric_names::REDEFINITIONS_TOTAL, "outcome" => "failed")
                            .increment(1);
                    }
                    let envelope = self.record(raw).await?;
                    if succeeded {
                        self.previous_bytecode.insert(class_name.clone(), new_bytecode.clone());
                        self.class_metadata.invalidate(&class_name);
                    }
                    responses.push(envelope);
                }
                Ok(responses)
            }
        }
    }

    /// Version `raw` against its aggregate's current history, append it, and
    /// emit it. Used for both cause events (via [`Router::accept`]) and
    /// executor-produced response events, which already carry their own
    /// `cause_id`.
    async fn record(&self, raw: RawEvent) -> Result<Envelope, RouterError> {
        let previous = self.latest(&raw.aggregate_type, &raw.aggregate_id).await?;
        let envelope = raw.into_envelope(previous.map(|e| (e.event_id, e.aggregate_version)));
        self.store.append(envelope.clone()).await?;
        self.emitter.emit(&envelope).await?;
        Ok(envelope)
    }

    /// Construct, append, and emit a response event caused by `cause`.
    async fn respond(
        &self,
        cause: &Envelope,
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        payload: DomainEvent,
    ) -> Result<Envelope, RouterError> {
        let previous = self.latest(&aggregate_type, &aggregate_id).await?;
        let response = Envelope::response_to(
            cause,
            aggregate_type,
            aggregate_id,
            previous.map(|e| (e.event_id, e.aggregate_version)),
            payload,
        );
        self.store.append(response.clone()).await?;
        self.emitter.emit(&response).await?;
        Ok(response)
    }

    async fn latest(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<Option<Envelope>, RouterError> {
        let history = self.store.events_for(aggregate_type, aggregate_id).await?;
        Ok(history.into_iter().last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytehot_executor::MockInstrumentationPort;
    use bytehot_store::{AsEventStorePort, MemoryEventStore};
    use bytehot_types::WatchPathConfig;
    use std::sync::Mutex as StdMutex;

    struct RecordingEmitter {
        lines: StdMutex<Vec<String>>,
    }

    impl RecordingEmitter {
        fn new() -> Self {
            Self {
                lines: StdMutex::new(Vec::new()),
            }
        }

        fn lines(&self) -> Vec<String> {
            self.lines.lock().expect("emitter lock poisoned").clone()
        }
    }

    #[async_trait::async_trait]
    impl EventEmitterPort for RecordingEmitter {
        async fn emit(&self, envelope: &Envelope) -> Result<(), PortError> {
            self.lines
                .lock()
                .expect("emitter lock poisoned")
                .push(format!("{envelope}"));
            Ok(())
        }
    }

    fn router_with(
        instrumentation: MockInstrumentationPort,
    ) -> (Router<MockInstrumentationPort>, Arc<RecordingEmitter>) {
        let store = Arc::new(AsEventStorePort(Arc::new(MemoryEventStore::new())));
        let emitter = Arc::new(RecordingEmitter::new());
        let router = Router::new(store, emitter.clone(), Arc::new(instrumentation), ValidationMode::Strict);
        (router, emitter)
    }

    fn attach_request(watch_path: &str) -> RawEvent {
        RawEvent::new(
            AggregateType::new(AGENT_AGGREGATE_TYPE).unwrap(),
            AggregateId::new(AGENT_AGGREGATE_ID).unwrap(),
            DomainEvent::ByteHotAttachRequested {
                configuration: bytehot_events::Configuration {
                    watch_paths: vec![WatchPathConfig {
                        path: watch_path.to_string(),
                        patterns: vec!["*.class".to_string()],
                        recursive: true,
                    }],
                    port: None,
                    validation_mode: ValidationMode::Strict,
                    agent_discovery_hints: Vec::new(),
                },
                instrumentation_handle: "handle-1".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn attach_with_capable_host_emits_full_sequence() {
        let (router, emitter) = router_with(MockInstrumentationPort::always_succeeds());
        let responses = router.accept(attach_request("/proj/target/classes")).await.unwrap();
        assert_eq!(responses.len(), 3);
        assert!(matches!(responses[0].payload, DomainEvent::WatchPathConfigured { .. }));
        assert!(matches!(responses[1].payload, DomainEvent::ByteHotAgentAttached { .. }));
        assert!(matches!(responses[2].payload, DomainEvent::HotSwapCapabilityEnabled { can_redefine: true, .. }));
        assert_eq!(emitter.lines().len(), 4); // cause + 3 responses
    }

    #[tokio::test]
    async fn attach_with_incapable_host_omits_capability_event() {
        let (router, _emitter) = router_with(MockInstrumentationPort::incapable());
        let responses = router.accept(attach_request("/proj/target/classes")).await.unwrap();
        assert_eq!(responses.len(), 2);
        assert!(responses
            .iter()
            .all(|e| !matches!(e.payload, DomainEvent::HotSwapCapabilityEnabled { .. })));
    }

    #[tokio::test]
    async fn attach_with_no_watch_paths_reports_not_started() {
        let (router, _emitter) = router_with(MockInstrumentationPort::always_succeeds());
        let raw = RawEvent::new(
            AggregateType::new(AGENT_AGGREGATE_TYPE).unwrap(),
            AggregateId::new(AGENT_AGGREGATE_ID).unwrap(),
            DomainEvent::ByteHotAttachRequested {
                configuration: bytehot_events::Configuration {
                    watch_paths: Vec::new(),
                    port: None,
                    validation_mode: ValidationMode::Strict,
                    agent_discovery_hints: Vec::new(),
                },
                instrumentation_handle: "handle-1".to_string(),
            },
        );
        let responses = router.accept(raw).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert!(matches!(responses[0].payload, DomainEvent::ByteHotNotStarted { .. }));
    }

    fn class_changed(path: &str, class_name: &str) -> RawEvent {
        RawEvent::new(
            AggregateType::new("filewatch").unwrap(),
            AggregateId::new(path.to_string()).unwrap(),
            DomainEvent::ClassFileChanged {
                path: path.to_string(),
                class_name: Some(class_name.to_string()),
                size_bytes: 0,
                detected_at: chrono::Utc::now(),
            },
        )
    }

    #[tokio::test]
    async fn unreadable_file_is_rejected_as_malformed() {
        let (router, _emitter) = router_with(MockInstrumentationPort::always_succeeds());
        let responses = router
            .accept(class_changed("/definitely/not/a/real/file.class", "com.example.Gone"))
            .await
            .unwrap();
        assert_eq!(responses.len(), 1);
        match &responses[0].payload {
            DomainEvent::BytecodeRejected { violations, .. } => {
                assert!(matches!(violations.as_slice(), [bytehot_types::Violation::Malformed { .. }]));
            }
            other => panic!("expected BytecodeRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_valid_load_runs_the_full_pipeline_to_redefinition() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("Widget.class");
        let bytecode = sample_classfile("com/example/Widget", &[("doWork", "()V")]);
        tokio::fs::write(&file_path, &bytecode).await.unwrap();

        let (router, emitter) = router_with(MockInstrumentationPort::always_succeeds());
        let path = file_path.to_string_lossy().to_string();
        let responses = router.accept(class_changed(&path, "com.example.Widget")).await.unwrap();

        assert_eq!(responses.len(), 3);
        assert!(matches!(responses[0].payload, DomainEvent::BytecodeValidated { .. }));
        assert!(matches!(responses[1].payload, DomainEvent::HotSwapRequested { .. }));
        assert!(matches!(responses[2].payload, DomainEvent::ClassRedefinitionSucceeded { .. }));
        assert_eq!(emitter.lines().len(), 4); // cause + 3 responses
    }

    #[tokio::test]
    async fn successful_validation_populates_the_class_metadata_cache() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("Widget.class");
        let bytecode = sample_classfile("com/example/Widget", &[("doWork", "()V")]);
        tokio::fs::write(&file_path, &bytecode).await.unwrap();

        // A host that validates the bytecode fine but fails the actual
        // redefinition step, so the metadata cache populated on Accepted is
        // left untouched rather than immediately invalidated by a
        // same-call ClassRedefinitionSucceeded.
        let (router, _emitter) = router_with(MockInstrumentationPort::always_fails(
            bytehot_ports::InstrumentationError::VerifierRejected("rejected by host".to_string()),
        ));
        let path = file_path.to_string_lossy().to_string();
        router.accept(class_changed(&path, "com.example.Widget")).await.unwrap();

        let cached = router.cached_class_metadata(&"com.example.Widget".to_string());
        assert!(cached.is_some());
        assert_eq!(cached.unwrap().class_name, "com/example/Widget");
    }

    #[tokio::test]
    async fn successful_redefinition_invalidates_the_class_metadata_cache() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("Widget.class");
        let bytecode = sample_classfile("com/example/Widget", &[("doWork", "()V")]);
        tokio::fs::write(&file_path, &bytecode).await.unwrap();

        let (router, _emitter) = router_with(MockInstrumentationPort::always_succeeds());
        let path = file_path.to_string_lossy().to_string();
        let responses = router.accept(class_changed(&path, "com.example.Widget")).await.unwrap();
        assert!(matches!(responses[2].payload, DomainEvent::ClassRedefinitionSucceeded { .. }));

        let cached = router.cached_class_metadata(&"com.example.Widget".to_string());
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn incompatible_change_is_rejected_before_any_hotswap_request() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("Widget.class");
        let before = sample_classfile("com/example/Widget", &[]);
        let after = sample_classfile("com/example/Widget", &[("newMethod", "()V")]);

        let (router, _emitter) = router_with(MockInstrumentationPort::always_succeeds());
        tokio::fs::write(&file_path, &before).await.unwrap();
        let path = file_path.to_string_lossy().to_string();
        router.accept(class_changed(&path, "com.example.Widget")).await.unwrap();

        tokio::fs::write(&file_path, &after).await.unwrap();
        let responses = router.accept(class_changed(&path, "com.example.Widget")).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert!(matches!(responses[0].payload, DomainEvent::BytecodeRejected { .. }));
    }

    #[tokio::test]
    async fn incapable_host_fails_redefinition_with_unsupported_operation() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("Widget.class");
        let bytecode = sample_classfile("com/example/Widget", &[]);
        tokio::fs::write(&file_path, &bytecode).await.unwrap();

        let (router, _emitter) = router_with(MockInstrumentationPort::incapable());
        let path = file_path.to_string_lossy().to_string();
        let responses = router.accept(class_changed(&path, "com.example.Widget")).await.unwrap();
        assert_eq!(responses.len(), 3);
        match &responses[2].payload {
            DomainEvent::ClassRedefinitionFailed { kind, .. } => {
                assert_eq!(*kind, bytehot_types::FailureKind::UnsupportedOperation);
            }
            other => panic!("expected a failure event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_event_kind_is_never_thrown_away() {
        let (router, _emitter) = router_with(MockInstrumentationPort::always_succeeds());
        let raw = RawEvent::new(
            AggregateType::new("filewatch").unwrap(),
            AggregateId::new("/some/path").unwrap(),
            DomainEvent::Opaque {
                kind: "future_event_kind".to_string(),
                raw: serde_json::json!({ "anything": true }),
            },
        );
        let responses = router.accept(raw).await.unwrap();
        assert_eq!(responses.len(), 1);
        match &responses[0].payload {
            DomainEvent::UnknownEventResponse { original_kind } => {
                assert_eq!(original_kind, "future_event_kind");
            }
            other => panic!("expected UnknownEventResponse, got {other:?}"),
        }
    }

    fn push_utf8(out: &mut Vec<u8>, s: &str) {
        out.push(1);
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    fn push_class(out: &mut Vec<u8>, name_index: u16) {
        out.push(7);
        out.extend_from_slice(&name_index.to_be_bytes());
    }

    fn sample_classfile(class_name: &str, methods: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&61u16.to_be_bytes());

        let pool_count = 1 + 4 + (methods.len() as u16) * 2;
        out.extend_from_slice(&pool_count.to_be_bytes());
        push_utf8(&mut out, class_name);
        push_class(&mut out, 1);
        push_utf8(&mut out, "java/lang/Object");
        push_class(&mut out, 3);
        let mut method_indices = Vec::new();
        let mut next_index = 5u16;
        for (name, descriptor) in methods {
            push_utf8(&mut out, name);
            let name_index = next_index;
            next_index += 1;
            push_utf8(&mut out, descriptor);
            let descriptor_index = next_index;
            next_index += 1;
            method_indices.push((name_index, descriptor_index));
        }

        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&2u16.to_be_bytes());
        out.extend_from_slice(&4u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&(methods.len() as u16).to_be_bytes());
        for (name_index, descriptor_index) in method_indices {
            out.extend_from_slice(&0x0001u16.to_be_bytes());
            out.extend_from_slice(&name_index.to_be_bytes());
            out.extend_from_slice(&descriptor_index.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }
}
