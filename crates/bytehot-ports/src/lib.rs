#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **bytehot-ports** – Port traits and the process-wide capability registry
//! that binds adapters to them.
//!
//! The domain core (the router and everything upstream of it) depends only
//! on the trait objects declared here, never on a concrete adapter. Adapters
//! (the filesystem watcher, the event store backends, the instrumentation
//! bridge) each live in their own crate and implement one of these traits;
//! bootstrap binds them into a [`PortRegistry`] once, and the rest of the
//! process resolves them by type.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytehot_events::Envelope;
use bytehot_types::{AggregateId, AggregateType, AggregateVersion};
use dashmap::DashMap;

/// Errors a port implementation may report back to its caller.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The requested adapter has not been bound into the registry.
    #[error("no adapter bound for capability {0}")]
    Unbound(&'static str),
    /// The underlying adapter failed in an implementation-specific way.
    #[error("adapter error: {0}")]
    Adapter(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Capability for emitting already-constructed events to wherever they are
/// meant to be observed externally (a bus, a log sink, a test probe).
#[async_trait]
pub trait EventEmitterPort: Send + Sync {
    /// Emit a single envelope. Must not block on persistence; the router
    /// appends to the event store separately.
    async fn emit(&self, envelope: &Envelope) -> Result<(), PortError>;
}

/// Capability for appending events to and querying an append-only event
/// store, keyed by aggregate. Concrete backends (memory, filesystem) live in
/// `bytehot-store` and implement this trait; it is declared here so the
/// router can depend on the port without depending on any backend.
#[async_trait]
pub trait EventStorePort: Send + Sync {
    /// Append `envelope` for `(aggregate_type, aggregate_id)`, enforcing
    /// `aggregate_version` monotonicity. Returns `ConcurrencyConflict`
    /// (surfaced by the concrete error type in `bytehot-store`) if another
    /// writer already claimed that version.
    async fn append(&self, envelope: Envelope) -> Result<(), PortError>;

    /// Every event recorded for one aggregate instance, in version order.
    async fn events_for(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<Envelope>, PortError>;

    /// The highest `aggregate_version` recorded for this aggregate, or
    /// `None` if it has no events yet.
    async fn current_version(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<Option<AggregateVersion>, PortError>;
}

/// Capability for watching directories for `.class` file changes. Concrete
/// implementation lives in `bytehot-watcher`.
#[async_trait]
pub trait FileWatcherPort: Send + Sync {
    /// Begin watching `path` according to the given glob patterns and
    /// recursion mode. Idempotent: registering an already-watched root with
    /// the same settings is a no-op.
    async fn watch(
        &self,
        path: String,
        patterns: Vec<String>,
        recursive: bool,
    ) -> Result<(), PortError>;

    /// Stop watching a previously registered root.
    async fn unwatch(&self, path: &str) -> Result<(), PortError>;
}

/// Capability for invoking the host runtime's class-redefinition primitive.
/// Concrete bridge lives in `bytehot-executor`.
#[async_trait]
pub trait InstrumentationPort: Send + Sync {
    /// Whether the host reports `canRedefineClasses`.
    fn can_redefine(&self) -> bool;
    /// Whether the host reports `canRetransformClasses`.
    fn can_retransform(&self) -> bool;

    /// Ask the host to redefine `class_name` with `new_bytecode`.
    async fn redefine_class(
        &self,
        class_name: &str,
        new_bytecode: &[u8],
    ) -> Result<(), InstrumentationError>;
}

/// Failure surfaced by [`InstrumentationPort::redefine_class`], mirrored
/// into a `ClassRedefinitionFailed` event by the executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstrumentationError {
    /// The host does not support redefinition at all.
    #[error("redefinition is not supported by this host")]
    UnsupportedOperation,
    /// The host's bytecode verifier rejected the new class body.
    #[error("verifier rejected the new class body: {0}")]
    VerifierRejected(String),
    /// The target class is not currently loaded.
    #[error("class not found: {0}")]
    ClassNotFound(String),
    /// The change is structurally incompatible with hot redefinition.
    #[error("incompatible change: {0}")]
    IncompatibleChange(String),
    /// An I/O error occurred while communicating with the host.
    #[error("I/O error: {0}")]
    IoError(String),
    /// Any other host-reported failure.
    #[error("unknown redefinition failure: {0}")]
    Unknown(String),
}

/// Process-wide, read-mostly capability map: adapters are `inject`ed once at
/// bootstrap and `resolve`d by type from anywhere in the process. Backed by
/// a `DashMap<TypeId, _>` to favor concurrent readers over rare writers,
/// with no coarse global lock.
#[derive(Default)]
pub struct PortRegistry {
    bindings: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl PortRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
        }
    }

    /// Bind `adapter` as the implementation of capability `T`. If a binding
    /// already exists for `T` it is replaced (last-wins). Intended to be
    /// called only during bootstrap, before any `resolve` calls are relied
    /// upon in steady state.
    pub fn inject<T: Send + Sync + 'static>(&self, adapter: Arc<T>) {
        self.bindings.insert(TypeId::of::<T>(), adapter);
    }

    /// Look up the adapter bound for capability `T`, if any.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.bindings
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    /// Like [`resolve`](Self::resolve) but returns a [`PortError::Unbound`]
    /// instead of `None`, for call sites that treat a missing capability as
    /// a hard bootstrap failure.
    pub fn require<T: Send + Sync + 'static>(&self, capability_name: &'static str) -> Result<Arc<T>, PortError> {
        self.resolve::<T>().ok_or(PortError::Unbound(capability_name))
    }

    /// Number of distinct capability types currently bound. Exposed for
    /// bootstrap diagnostics and tests, not part of the port contract.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no capability has been bound yet.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for PortRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortRegistry")
            .field("bound_capabilities", &self.bindings.len())
            .finish()
    }
}
