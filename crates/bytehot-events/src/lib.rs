#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **bytehot-events** – Typed domain/response event model and causal envelope
//! for ByteHot Core.
//!
//! Every communication inside the domain core happens via an immutable
//! [`Envelope`] wrapping a [`DomainEvent`] payload. The envelope carries the
//! causal metadata (aggregate identity, version, previous-event link, and an
//! optional response `cause_id`); the payload is a closed sum type covering
//! the core event kinds, plus an `Opaque` fallback so a reader can tolerate
//! event kinds it doesn't yet know about.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use bytehot_types::{
    AggregateId, AggregateType, AggregateVersion, BytecodeHash, ClassName, FailureKind,
    ValidationMode, Violation, WatchPathConfig,
};

/// Globally unique event identifier.
pub type EventId = Uuid;

//─────────────────────────────
//  Domain event payloads
//─────────────────────────────

/// Read-only configuration snapshot carried by `ByteHotAttachRequested`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Directory roots to watch, with their patterns and recursion mode.
    pub watch_paths: Vec<WatchPathConfig>,
    /// Optional port the agent's control surface listens on.
    pub port: Option<u16>,
    /// Strictness of bytecode compatibility checking.
    pub validation_mode: ValidationMode,
    /// Free-form hints used to discover the host runtime's agent mechanism.
    #[serde(default)]
    pub agent_discovery_hints: Vec<String>,
}

/// Opaque handle to the host runtime's instrumentation capability, carried
/// only at attach time — the concrete type lives in the instrumentation
/// adapter and is never inspected by the domain core.
pub type InstrumentationHandleId = String;

/// Discriminated union of event kinds flowing through the ByteHot core
/// (the core event-kinds set).
///
/// `Serialize`/`Deserialize` are implemented by hand below rather than
/// derived, so that an unrecognised `kind` tag decodes into [`Opaque`]
/// instead of failing the whole read.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A watched `.class` file was created or modified.
    ClassFileChanged {
        /// Absolute path of the changed file.
        path: String,
        /// Fully-qualified class name, if it could be derived from the path.
        class_name: Option<ClassName>,
        /// File size in bytes, read once at event time.
        size_bytes: u64,
        /// Time the final write in a debounce window was observed.
        detected_at: DateTime<Utc>,
    },
    /// Request to attach the agent, produced at bootstrap (startup or
    /// runtime attach).
    ByteHotAttachRequested {
        /// The configuration snapshot resolved at attach time.
        configuration: Configuration,
        /// Opaque reference to the instrumentation capability handle.
        instrumentation_handle: InstrumentationHandleId,
    },
    /// Response: the agent attached successfully.
    ByteHotAgentAttached {
        /// The configuration snapshot the agent is now running with.
        configuration: Configuration,
    },
    /// Response: the agent failed to start.
    ByteHotNotStarted {
        /// Human-readable reason bootstrap could not complete.
        reason: String,
    },
    /// Response: a proposed class body passed redefinition validation.
    BytecodeValidated {
        /// Content digest of the validated bytecode.
        bytecode_hash: BytecodeHash,
        /// Fully-qualified class name.
        class_name: ClassName,
    },
    /// Response: a proposed class body failed redefinition validation.
    BytecodeRejected {
        /// Content digest of the rejected bytecode.
        bytecode_hash: BytecodeHash,
        /// Fully-qualified class name.
        class_name: ClassName,
        /// Every rule violation found, in detection order.
        violations: Vec<Violation>,
    },
    /// Request to redefine a loaded class with validated new bytecode.
    HotSwapRequested {
        /// Fully-qualified class name.
        class_name: ClassName,
        /// Content digest identifying the new bytecode to apply.
        new_bytecode_ref: BytecodeHash,
    },
    /// Response: the redefinition primitive accepted the new class body.
    ClassRedefinitionSucceeded {
        /// Fully-qualified class name.
        class_name: ClassName,
        /// Wall-clock duration of the redefinition call, in milliseconds.
        duration_ms: u64,
    },
    /// Response: the redefinition primitive rejected or failed to apply the
    /// new class body.
    ClassRedefinitionFailed {
        /// Fully-qualified class name.
        class_name: ClassName,
        /// Classification of the failure.
        kind: FailureKind,
        /// Human-readable detail from the host runtime, if any.
        message: String,
    },
    /// Informational: a watch root was registered.
    WatchPathConfigured {
        /// Absolute directory root.
        path: String,
        /// Glob patterns applied to basenames under this root.
        patterns: Vec<String>,
        /// Whether new subdirectories are watched automatically.
        recursive: bool,
    },
    /// Informational: the instrumentation handle's redefinition capability
    /// flags, surfaced once at attach time.
    HotSwapCapabilityEnabled {
        /// Whether the host reports `canRedefineClasses`.
        can_redefine: bool,
        /// Whether the host reports `canRetransformClasses`.
        can_retransform: bool,
    },
    /// Router response to an event kind it does not recognise. Never thrown,
    /// always produced.
    UnknownEventResponse {
        /// The `kind` tag of the event the router could not route.
        original_kind: String,
    },
    /// Forward-compatibility fallback: an event kind unknown to this build,
    /// deserialized without losing its raw payload.
    Opaque {
        /// The raw `kind` tag as read from storage.
        kind: String,
        /// The raw payload, left undecoded.
        raw: serde_json::Value,
    },
}

impl DomainEvent {
    /// Stable string tag for this event kind, used for on-disk file naming
    /// and `events_by_type` queries.
    pub fn kind(&self) -> &str {
        match self {
            DomainEvent::ClassFileChanged { .. } => "class_file_changed",
            DomainEvent::ByteHotAttachRequested { .. } => "byte_hot_attach_requested",
            DomainEvent::ByteHotAgentAttached { .. } => "byte_hot_agent_attached",
            DomainEvent::ByteHotNotStarted { .. } => "byte_hot_not_started",
            DomainEvent::BytecodeValidated { .. } => "bytecode_validated",
            DomainEvent::BytecodeRejected { .. } => "bytecode_rejected",
            DomainEvent::HotSwapRequested { .. } => "hot_swap_requested",
            DomainEvent::ClassRedefinitionSucceeded { .. } => "class_redefinition_succeeded",
            DomainEvent::ClassRedefinitionFailed { .. } => "class_redefinition_failed",
            DomainEvent::WatchPathConfigured { .. } => "watch_path_configured",
            DomainEvent::HotSwapCapabilityEnabled { .. } => "hot_swap_capability_enabled",
            DomainEvent::UnknownEventResponse { .. } => "unknown_event_response",
            DomainEvent::Opaque { kind, .. } => kind.as_str(),
        }
    }

    /// Whether this event kind is a response to some earlier cause, per the
    /// taxonomy (this event is "a response to ...").
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            DomainEvent::ByteHotAgentAttached { .. }
                | DomainEvent::ByteHotNotStarted { .. }
                | DomainEvent::BytecodeValidated { .. }
                | DomainEvent::BytecodeRejected { .. }
                | DomainEvent::ClassRedefinitionSucceeded { .. }
                | DomainEvent::ClassRedefinitionFailed { .. }
                | DomainEvent::UnknownEventResponse { .. }
        )
    }
}

/// Wire shape for every *known* event kind, reusing `serde`'s generated
/// tagged-enum (de)serializer. [`DomainEvent::Opaque`] has no arm here; it
/// is handled directly by the hand-written impls below.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
enum KnownDomainEventWire {
    ClassFileChanged {
        path: String,
        class_name: Option<ClassName>,
        size_bytes: u64,
        detected_at: DateTime<Utc>,
    },
    ByteHotAttachRequested {
        configuration: Configuration,
        instrumentation_handle: InstrumentationHandleId,
    },
    ByteHotAgentAttached {
        configuration: Configuration,
    },
    ByteHotNotStarted {
        reason: String,
    },
    BytecodeValidated {
        bytecode_hash: BytecodeHash,
        class_name: ClassName,
    },
    BytecodeRejected {
        bytecode_hash: BytecodeHash,
        class_name: ClassName,
        violations: Vec<Violation>,
    },
    HotSwapRequested {
        class_name: ClassName,
        new_bytecode_ref: BytecodeHash,
    },
    ClassRedefinitionSucceeded {
        class_name: ClassName,
        duration_ms: u64,
    },
    ClassRedefinitionFailed {
        class_name: ClassName,
        kind: FailureKind,
        message: String,
    },
    WatchPathConfigured {
        path: String,
        patterns: Vec<String>,
        recursive: bool,
    },
    HotSwapCapabilityEnabled {
        can_redefine: bool,
        can_retransform: bool,
    },
    UnknownEventResponse {
        original_kind: String,
    },
}

impl From<KnownDomainEventWire> for DomainEvent {
    fn from(inner: KnownDomainEventWire) -> Self {
        match inner {
            KnownDomainEventWire::ClassFileChanged {
                path,
                class_name,
                size_bytes,
                detected_at,
            } => DomainEvent::ClassFileChanged {
                path,
                class_name,
                size_bytes,
                detected_at,
            },
            KnownDomainEventWire::ByteHotAttachRequested {
                configuration,
                instrumentation_handle,
            } => DomainEvent::ByteHotAttachRequested {
                configuration,
                instrumentation_handle,
            },
            KnownDomainEventWire::ByteHotAgentAttached { configuration } => {
                DomainEvent::ByteHotAgentAttached { configuration }
            }
            KnownDomainEventWire::ByteHotNotStarted { reason } => {
                DomainEvent::ByteHotNotStarted { reason }
            }
            KnownDomainEventWire::BytecodeValidated {
                bytecode_hash,
                class_name,
            } => DomainEvent::BytecodeValidated {
                bytecode_hash,
                class_name,
            },
            KnownDomainEventWire::BytecodeRejected {
                bytecode_hash,
                class_name,
                violations,
            } => DomainEvent::BytecodeRejected {
                bytecode_hash,
                class_name,
                violations,
            },
            KnownDomainEventWire::HotSwapRequested {
                class_name,
                new_bytecode_ref,
            } => DomainEvent::HotSwapRequested {
                class_name,
                new_bytecode_ref,
            },
            KnownDomainEventWire::ClassRedefinitionSucceeded {
                class_name,
                duration_ms,
            } => DomainEvent::ClassRedefinitionSucceeded {
                class_name,
                duration_ms,
            },
            KnownDomainEventWire::ClassRedefinitionFailed {
                class_name,
                kind,
                message,
            } => DomainEvent::ClassRedefinitionFailed {
                class_name,
                kind,
                message,
            },
            KnownDomainEventWire::WatchPathConfigured {
                path,
                patterns,
                recursive,
            } => DomainEvent::WatchPathConfigured {
                path,
                patterns,
                recursive,
            },
            KnownDomainEventWire::HotSwapCapabilityEnabled {
                can_redefine,
                can_retransform,
            } => DomainEvent::HotSwapCapabilityEnabled {
                can_redefine,
                can_retransform,
            },
            KnownDomainEventWire::UnknownEventResponse { original_kind } => {
                DomainEvent::UnknownEventResponse { original_kind }
            }
        }
    }
}

/// Converts a known variant into its wire form. `Opaque` has no `KnownDomainEventWire`
/// counterpart and is handled separately by [`Serialize for DomainEvent`].
impl TryFrom<&DomainEvent> for KnownDomainEventWire {
    type Error = ();

    fn try_from(event: &DomainEvent) -> Result<Self, Self::Error> {
        Ok(match event.clone() {
            DomainEvent::ClassFileChanged {
                path,
                class_name,
                size_bytes,
                detected_at,
            } => KnownDomainEventWire::ClassFileChanged {
                path,
                class_name,
                size_bytes,
                detected_at,
            },
            DomainEvent::ByteHotAttachRequested {
                configuration,
                instrumentation_handle,
            } => KnownDomainEventWire::ByteHotAttachRequested {
                configuration,
                instrumentation_handle,
            },
            DomainEvent::ByteHotAgentAttached { configuration } => {
                KnownDomainEventWire::ByteHotAgentAttached { configuration }
            }
            DomainEvent::ByteHotNotStarted { reason } => {
                KnownDomainEventWire::ByteHotNotStarted { reason }
            }
            DomainEvent::BytecodeValidated {
                bytecode_hash,
                class_name,
            } => KnownDomainEventWire::BytecodeValidated {
                bytecode_hash,
                class_name,
            },
            DomainEvent::BytecodeRejected {
                bytecode_hash,
                class_name,
                violations,
            } => KnownDomainEventWire::BytecodeRejected {
                bytecode_hash,
                class_name,
                violations,
            },
            DomainEvent::HotSwapRequested {
                class_name,
                new_bytecode_ref,
            } => KnownDomainEventWire::HotSwapRequested {
                class_name,
                new_bytecode_ref,
            },
            DomainEvent::ClassRedefinitionSucceeded {
                class_name,
                duration_ms,
            } => KnownDomainEventWire::ClassRedefinitionSucceeded {
                class_name,
                duration_ms,
            },
            DomainEvent::ClassRedefinitionFailed {
                class_name,
                kind,
                message,
            } => KnownDomainEventWire::ClassRedefinitionFailed {
                class_name,
                kind,
                message,
            },
            DomainEvent::WatchPathConfigured {
                path,
                patterns,
                recursive,
            } => KnownDomainEventWire::WatchPathConfigured {
                path,
                patterns,
                recursive,
            },
            DomainEvent::HotSwapCapabilityEnabled {
                can_redefine,
                can_retransform,
            } => KnownDomainEventWire::HotSwapCapabilityEnabled {
                can_redefine,
                can_retransform,
            },
            DomainEvent::UnknownEventResponse { original_kind } => {
                KnownDomainEventWire::UnknownEventResponse { original_kind }
            }
            DomainEvent::Opaque { .. } => return Err(()),
        })
    }
}

/// Wire shape used only for [`DomainEvent::Opaque`], matching the
/// `{"kind": ..., "data": ...}` shape `KnownDomainEventWire` produces so the
/// two are indistinguishable on disk.
#[derive(Serialize, Deserialize)]
struct OpaqueWire {
    kind: String,
    data: serde_json::Value,
}

impl Serialize for DomainEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            DomainEvent::Opaque { kind, raw } => OpaqueWire {
                kind: kind.clone(),
                data: raw.clone(),
            }
            .serialize(serializer),
            known => KnownDomainEventWire::try_from(known)
                .expect("non-Opaque variant always converts")
                .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DomainEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = OpaqueWire::deserialize(deserializer)?;
        let reassembled = serde_json::json!({ "kind": wire.kind, "data": wire.data });
        match serde_json::from_value::<KnownDomainEventWire>(reassembled) {
            Ok(known) => Ok(DomainEvent::from(known)),
            Err(_) => Ok(DomainEvent::Opaque {
                kind: wire.kind,
                raw: wire.data,
            }),
        }
    }
}

//─────────────────────────────
//  Envelope
//─────────────────────────────

/// Schema tag for the payload shape; bumped whenever a variant's fields
/// change in a non-additive way.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// BLAKE3 content digest of an envelope's serialized `payload`, stored
/// alongside `event_id` so a corrupted on-disk event can be detected
/// independent of `event_id` uniqueness (SPEC_FULL.md §3). Covers the
/// payload alone rather than payload-plus-parent-digests — doing so would
/// require threading a parent's digest through every adapter that builds a
/// [`RawEvent`], for no externally observable benefit over hashing the
/// payload, which is already content-addressed on its own terms (see
/// Open Question 1 in DESIGN.md).
#[derive(Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadDigest(#[serde(with = "digest_hex")] [u8; 32]);

impl PayloadDigest {
    fn of(payload: &DomainEvent) -> Self {
        let bytes = serde_json::to_vec(payload).unwrap_or_default();
        Self(*blake3::hash(&bytes).as_bytes())
    }

    /// Hex-encoded representation, convenient for logging.
    pub fn to_hex(&self) -> String {
        digest_hex::encode(&self.0)
    }
}

impl PartialEq for PayloadDigest {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for PayloadDigest {}

impl fmt::Debug for PayloadDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadDigest({})", self.to_hex())
    }
}

impl fmt::Display for PayloadDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

mod digest_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(bytes: &[u8; 32]) -> String {
        let mut s = String::with_capacity(64);
        for b in bytes {
            s.push_str(&format!("{:02x}", b));
        }
        s
    }

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(de)?;
        if s.len() != 64 {
            return Err(serde::de::Error::custom("expected 64 hex characters"));
        }
        let mut out = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(serde::de::Error::custom)?;
            out[i] = u8::from_str_radix(hex, 16).map_err(serde::de::Error::custom)?;
        }
        Ok(out)
    }
}

/// The metadata wrapping every event: identity, causal position within its
/// aggregate, and (for responses) the id of the event that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Globally unique identifier for this event.
    pub event_id: EventId,
    /// Monotonic-aware wall-clock instant the event was produced.
    pub timestamp: DateTime<Utc>,
    /// Aggregate type tag.
    pub aggregate_type: AggregateType,
    /// Aggregate instance key.
    pub aggregate_id: AggregateId,
    /// 1-based, strictly increasing per `(aggregate_type, aggregate_id)`.
    pub aggregate_version: AggregateVersion,
    /// `event_id` of the immediately preceding event for this aggregate, or
    /// `None` for the first event (version 1).
    pub previous_event_id: Option<EventId>,
    /// Schema tag for `payload`.
    pub schema_version: u32,
    /// For response events: the `event_id` of the triggering cause. The
    /// cause may belong to a different aggregate.
    pub cause_id: Option<EventId>,
    /// Content digest of `payload`, checked by the event store on read to
    /// detect on-disk corruption (SPEC_FULL.md §3).
    pub payload_digest: PayloadDigest,
    /// Event-specific payload.
    pub payload: DomainEvent,
}

impl Envelope {
    /// Construct the first event of a new aggregate (`version = 1`, no
    /// `previous_event_id`).
    pub fn for_new_session(
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        payload: DomainEvent,
    ) -> Self {
        let payload_digest = PayloadDigest::of(&payload);
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            aggregate_type,
            aggregate_id,
            aggregate_version: 1,
            previous_event_id: None,
            schema_version: CURRENT_SCHEMA_VERSION,
            cause_id: None,
            payload_digest,
            payload,
        }
    }

    /// Construct the next event of an already-existing aggregate.
    pub fn for_existing_session(
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        previous_event_id: EventId,
        previous_version: AggregateVersion,
        payload: DomainEvent,
    ) -> Self {
        let payload_digest = PayloadDigest::of(&payload);
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            aggregate_type,
            aggregate_id,
            aggregate_version: previous_version + 1,
            previous_event_id: Some(previous_event_id),
            schema_version: CURRENT_SCHEMA_VERSION,
            cause_id: None,
            payload_digest,
            payload,
        }
    }

    /// Construct a response event, copying `cause`'s `event_id` into the
    /// response's `cause_id`. The response may target a different aggregate
    /// than `cause` did, preserving the cause/response relationship.
    pub fn response_to(
        cause: &Envelope,
        aggregate_type: AggregateType,
        aggregate_id: AggregateId,
        previous: Option<(EventId, AggregateVersion)>,
        payload: DomainEvent,
    ) -> Self {
        let mut response = match previous {
            Some((prev_id, prev_version)) => {
                Self::for_existing_session(aggregate_type, aggregate_id, prev_id, prev_version, payload)
            }
            None => Self::for_new_session(aggregate_type, aggregate_id, payload),
        };
        response.cause_id = Some(cause.event_id);
        // A response must never be observed before its cause.
        if response.timestamp < cause.timestamp {
            response.timestamp = cause.timestamp;
        }
        response
    }

    /// Deterministic identifier derived from the envelope's canonical
    /// serialization, for backends that want `event_id` reproducibility
    /// instead of random UUIDs.
    pub fn deterministic_digest(&self) -> [u8; 32] {
        let mut without_id = self.clone();
        without_id.event_id = Uuid::nil();
        let bytes = serde_json::to_vec(&without_id).unwrap_or_default();
        *blake3::hash(&bytes).as_bytes()
    }

    /// Recompute `payload_digest` from `payload` and compare against the
    /// stored value, detecting on-disk bit rot or hand-edited event files
    /// (SPEC_FULL.md §3).
    pub fn verify_payload_digest(&self) -> bool {
        self.payload_digest == PayloadDigest::of(&self.payload)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{} [{}] {}",
            self.aggregate_type,
            self.aggregate_id,
            self.aggregate_version,
            self.payload.kind(),
            self.event_id
        )
    }
}

/// A not-yet-versioned event produced by an adapter (the file watcher, the
/// executor). Only the event store's per-aggregate lock can authoritatively
/// assign `aggregate_version`/`previous_event_id` without racing a concurrent
/// producer for the same aggregate, preserving the router's ordering guarantees,
/// so adapters hand these to the router rather than constructing an
/// [`Envelope`] themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Aggregate type tag the eventual envelope will carry.
    pub aggregate_type: AggregateType,
    /// Aggregate instance key the eventual envelope will carry.
    pub aggregate_id: AggregateId,
    /// Event-specific payload.
    pub payload: DomainEvent,
    /// `event_id` of the cause, for response events.
    pub cause_id: Option<EventId>,
}

impl RawEvent {
    /// Construct a raw event with no cause (a primary, not a response).
    pub fn new(aggregate_type: AggregateType, aggregate_id: AggregateId, payload: DomainEvent) -> Self {
        Self {
            aggregate_type,
            aggregate_id,
            payload,
            cause_id: None,
        }
    }

    /// Mark this raw event as a response to `cause`.
    pub fn caused_by(mut self, cause: &Envelope) -> Self {
        self.cause_id = Some(cause.event_id);
        self
    }

    /// Assign a version, turning this raw event into a proper [`Envelope`].
    /// `previous` is `Some((previous_event_id, previous_version))` for an
    /// aggregate that already has history, `None` for its first event.
    pub fn into_envelope(self, previous: Option<(EventId, AggregateVersion)>) -> Envelope {
        let mut envelope = match previous {
            Some((previous_event_id, previous_version)) => Envelope::for_existing_session(
                self.aggregate_type,
                self.aggregate_id,
                previous_event_id,
                previous_version,
                self.payload,
            ),
            None => Envelope::for_new_session(self.aggregate_type, self.aggregate_id, self.payload),
        };
        envelope.cause_id = self.cause_id;
        envelope
    }
}

/// Error produced when an envelope fails a causal-chain sanity check.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CausalityError {
    /// `aggregate_version` was not 1 despite `previous_event_id` being absent.
    #[error("first event of an aggregate must have aggregate_version == 1, got {0}")]
    FirstVersionNotOne(AggregateVersion),
    /// `previous_event_id` did not match the prior event's `event_id`.
    #[error("previous_event_id does not match the immediately preceding event")]
    BrokenChain,
}

/// Verify the causal-chain invariant between two consecutive envelopes of
/// the same aggregate.
pub fn verify_chain(previous: &Envelope, next: &Envelope) -> Result<(), CausalityError> {
    if next.aggregate_version != previous.aggregate_version + 1 {
        return Err(CausalityError::BrokenChain);
    }
    if next.previous_event_id != Some(previous.event_id) {
        return Err(CausalityError::BrokenChain);
    }
    Ok(())
}
