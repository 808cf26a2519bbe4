#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **bytehot-runtime** – Process bootstrap for ByteHot Core.
//!
//! Wires adapters together (construct, assemble the facade, load persisted
//! state, return a ready instance) behind an `AtomicBool` idempotence guard,
//! since attach is a one-shot transition rather than a repeatable
//! start/stop toggle. Two entry points converge on the same
//! [`Runtime::attach`]: [`Runtime::attach_at_startup`] for the pre-main path
//! and [`Runtime::attach_at_runtime`] for an external attach directive —
//! both end up in the identical steady state once the agent has
//! successfully attached.

mod http;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytehot_config::ConfigArgs;
use bytehot_events::{Configuration, DomainEvent, Envelope, InstrumentationHandleId, RawEvent};
use bytehot_observability::{MetricsError, MetricsRegistry};
use bytehot_ports::{EventEmitterPort, EventStorePort, InstrumentationPort, PortError, PortRegistry};
use bytehot_router::{Router, RouterError};
use bytehot_store::{AsEventStorePort, EventStoreError, FsEventStore};
use bytehot_types::{AggregateId, AggregateType, TypeError};
use bytehot_watcher::{FileWatcher, WatcherError};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Aggregate type the attach lifecycle is recorded under (mirrors
/// `bytehot_router::AGENT_AGGREGATE_TYPE`; re-declared here since the runtime
/// constructs the cause event itself rather than going through a helper).
pub const AGENT_AGGREGATE_TYPE: &str = "bytehot";

/// Singleton aggregate id for the agent's own attach lifecycle.
pub const AGENT_AGGREGATE_ID: &str = "agent";

/// Instrumentation handle recorded for the startup (pre-main) attach path.
pub const STARTUP_INSTRUMENTATION_HANDLE: &str = "pre-main";

/// Default channel capacity between the file watcher and the router pump.
pub const DEFAULT_WATCH_CHANNEL_CAPACITY: usize = 1024;

/// Default debounce window applied to native filesystem notifications.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// Errors that can abort bootstrap or steady-state operation.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Configuration could not be loaded; fatal at bootstrap, never
    /// recovered locally.
    #[error(transparent)]
    Config(#[from] bytehot_config::ConfigError),
    /// The event store could not be opened.
    #[error(transparent)]
    Store(#[from] EventStoreError),
    /// The file watcher could not be initialized or a watch root could not
    /// be registered.
    #[error(transparent)]
    Watcher(#[from] WatcherError),
    /// The router rejected or failed to process an event.
    #[error(transparent)]
    Router(#[from] RouterError),
    /// A required capability was not bound in the port registry.
    #[error(transparent)]
    Port(#[from] PortError),
    /// The metrics recorder could not be installed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    /// An identity component derived from configuration was invalid.
    #[error(transparent)]
    Identity(#[from] TypeError),
}

/// Bootstrap configuration independent of the ByteHot [`Configuration`]
/// domain value (which is loaded separately via `bytehot-config`).
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Directory root the filesystem event store persists under.
    pub event_store_root: PathBuf,
    /// Arguments overriding the layered configuration load.
    pub config_args: ConfigArgs,
    /// Debounce window applied to native filesystem notifications.
    pub debounce_window: Duration,
    /// Channel capacity between the file watcher and the router pump.
    pub watch_channel_capacity: usize,
    /// Whether to install the global Prometheus recorder on construction.
    pub install_metrics: bool,
    /// Emitter used for response events. Defaults to [`TracingEmitter`] when
    /// `None`.
    pub emitter: Option<Arc<dyn EventEmitterPort>>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_store_root: PathBuf::from("bytehot-events"),
            config_args: ConfigArgs::default(),
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            watch_channel_capacity: DEFAULT_WATCH_CHANNEL_CAPACITY,
            install_metrics: false,
            emitter: None,
        }
    }
}

/// An [`EventEmitterPort`] that writes each response event as a
/// human-readable line via `tracing`, including event kind, aggregate id,
/// and key payload fields — used by tests and by external log consumers.
#[derive(Debug, Default)]
pub struct TracingEmitter;

#[async_trait]
impl EventEmitterPort for TracingEmitter {
    async fn emit(&self, envelope: &Envelope) -> Result<(), PortError> {
        tracing::info!(
            aggregate_type = %envelope.aggregate_type,
            aggregate_id = %envelope.aggregate_id,
            kind = envelope.payload.kind(),
            payload = ?envelope.payload,
            "{}",
            envelope
        );
        Ok(())
    }
}

/// The running agent: owns the wired ports, the attach lifecycle guard, and
/// (once attached) the background task pumping watched file changes into the
/// router.
pub struct Runtime<P: InstrumentationPort> {
    configuration: Configuration,
    ports: PortRegistry,
    store: Arc<dyn EventStorePort>,
    watcher: Arc<FileWatcher>,
    router: Arc<Router<P>>,
    metrics: Option<MetricsRegistry>,
    attached: Arc<AtomicBool>,
    watch_rx: Mutex<Option<mpsc::Receiver<RawEvent>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    control_surface: Mutex<Option<JoinHandle<()>>>,
}

impl<P: InstrumentationPort + 'static> Runtime<P> {
    /// Load configuration, open the event store, and wire every port behind
    /// the router. Does not attach: call [`Runtime::attach_at_startup`] or
    /// [`Runtime::attach_at_runtime`] once construction succeeds.
    pub async fn new(runtime_config: RuntimeConfig, instrumentation: Arc<P>) -> Result<Self, RuntimeError> {
        let configuration = bytehot_config::load(&runtime_config.config_args)?;

        let fs_store = Arc::new(FsEventStore::open(&runtime_config.event_store_root).await?);
        let store: Arc<dyn EventStorePort> = Arc::new(AsEventStorePort(fs_store.clone()));

        let emitter: Arc<dyn EventEmitterPort> = runtime_config
            .emitter
            .clone()
            .unwrap_or_else(|| Arc::new(TracingEmitter));

        let (watch_tx, watch_rx) = mpsc::channel(runtime_config.watch_channel_capacity);
        let watcher = Arc::new(FileWatcher::new(runtime_config.debounce_window, watch_tx)?);

        let metrics = if runtime_config.install_metrics {
            Some(MetricsRegistry::install()?)
        } else {
            None
        };

        let ports = PortRegistry::new();
        ports.inject(fs_store);
        ports.inject(watcher.clone());
        ports.inject(instrumentation.clone());

        let router = Arc::new(Router::new(
            store.clone(),
            emitter,
            instrumentation,
            configuration.validation_mode,
        ));

        Ok(Self {
            configuration,
            ports,
            store,
            watcher,
            router,
            metrics,
            attached: Arc::new(AtomicBool::new(false)),
            watch_rx: Mutex::new(Some(watch_rx)),
            pump: Mutex::new(None),
            control_surface: Mutex::new(None),
        })
    }

    /// The port registry every adapter was bound into at construction, for
    /// bootstrap diagnostics (e.g. a `status` command confirming every
    /// expected capability is present).
    pub fn ports(&self) -> &PortRegistry {
        &self.ports
    }

    /// The loaded configuration this runtime was bootstrapped with.
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The installed metrics registry, if `install_metrics` was requested.
    pub fn metrics(&self) -> Option<&MetricsRegistry> {
        self.metrics.as_ref()
    }

    /// Whether the agent has successfully attached: `true` once
    /// `ByteHotAgentAttached` has fired, reset to `false` again if
    /// attachment was refused so a corrected configuration can retry.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Attach at process startup, modeling a pre-main / premain-equivalent
    /// entry point.
    pub async fn attach_at_startup(&self) -> Result<Vec<Envelope>, RuntimeError> {
        self.attach(STARTUP_INSTRUMENTATION_HANDLE.to_string()).await
    }

    /// Attach in response to an external directive issued to an already
    /// running process, carrying the host-supplied instrumentation handle.
    pub async fn attach_at_runtime(
        &self,
        instrumentation_handle: InstrumentationHandleId,
    ) -> Result<Vec<Envelope>, RuntimeError> {
        self.attach(instrumentation_handle).await
    }

    async fn attach(&self, instrumentation_handle: InstrumentationHandleId) -> Result<Vec<Envelope>, RuntimeError> {
        if self.attached.swap(true, Ordering::SeqCst) {
            tracing::debug!("attach requested while already attached; ignoring (idempotent)");
            return Ok(Vec::new());
        }

        let raw = RawEvent::new(
            AggregateType::new(AGENT_AGGREGATE_TYPE)?,
            AggregateId::new(AGENT_AGGREGATE_ID)?,
            DomainEvent::ByteHotAttachRequested {
                configuration: self.configuration.clone(),
                instrumentation_handle,
            },
        );
        let events = self.router.accept(raw).await?;

        let attached = events
            .iter()
            .any(|envelope| matches!(envelope.payload, DomainEvent::ByteHotAgentAttached { .. }));

        if attached {
            self.start_watching().await?;
            self.start_pump().await;
            self.start_control_surface().await;
        } else {
            // `ByteHotNotStarted`: release the guard so a corrected
            // configuration can be retried without restarting the process.
            self.attached.store(false, Ordering::SeqCst);
        }

        Ok(events)
    }

    async fn start_watching(&self) -> Result<(), RuntimeError> {
        for watch_path in &self.configuration.watch_paths {
            self.watcher
                .start_watching(&watch_path.path, watch_path.patterns.clone(), watch_path.recursive)
                .await?;
        }
        Ok(())
    }

    async fn start_pump(&self) {
        let mut guard = self.watch_rx.lock().await;
        let Some(mut rx) = guard.take() else {
            return;
        };
        drop(guard);

        let router = self.router.clone();
        let handle = tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                if let Err(err) = router.accept(raw).await {
                    tracing::error!(error = %err, "failed to route a watched file change");
                }
            }
        });
        *self.pump.lock().await = Some(handle);
    }

    /// Bind the optional control-surface port and serve `/health` and
    /// `/metrics` in the background. A no-op when no port was configured.
    async fn start_control_surface(&self) {
        let Some(port) = self.configuration.port else {
            return;
        };
        let handle = http::spawn(port, self.attached.clone(), self.metrics.clone());
        *self.control_surface.lock().await = Some(handle);
    }

    /// Stop watching every configured root, halt the background pump, and
    /// stop serving the control surface. Leaves the agent attached — there
    /// is no "detach" event; this is an operational pause, not an
    /// attach-lifecycle transition.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        for path in self.watcher.watched_paths() {
            if let Err(err) = self.watcher.stop_watching(&path).await {
                tracing::warn!(error = %err, path, "failed to stop watching during shutdown");
            }
        }
        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.control_surface.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    /// Whether the underlying event store backend reports itself healthy.
    /// Exposed for a `status` command.
    pub fn store(&self) -> &Arc<dyn EventStorePort> {
        &self.store
    }

    #[cfg(test)]
    async fn control_surface_is_running(&self) -> bool {
        self.control_surface.lock().await.is_some()
    }
}

impl<P: InstrumentationPort> Drop for Runtime<P> {
    fn drop(&mut self) {
        if let Ok(mut pump) = self.pump.try_lock() {
            if let Some(handle) = pump.take() {
                handle.abort();
            }
        }
        if let Ok(mut control_surface) = self.control_surface.try_lock() {
            if let Some(handle) = control_surface.take() {
                handle.abort();
            }
        }
    }
}
