#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **bytehot-watcher** – Directory watcher that emits `ClassFileChanged`
//! events for ByteHot Core.
//!
//! Built on `notify` + `notify-debouncer-mini`, structured as a
//! [`FileWatcher`] facade with one registered native watch per root and a
//! single background debounce thread fanning coalesced changes into a
//! bounded `tokio::sync::mpsc` channel the router drains. A plain registry
//! behind a lock, `thiserror` errors, and `tracing` instrumentation suffice
//! since this watcher has exactly one consumer — the router — rather than a
//! multi-tenant actor system.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex as StdMutex, RwLock as StdRwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytehot_events::{DomainEvent, RawEvent};
use bytehot_ports::{FileWatcherPort, PortError};
use bytehot_types::{AggregateId, AggregateType};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc;

/// Errors surfaced by [`FileWatcher`], including the boundary behavior for
/// non-directory roots.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// `start_watching` was called with a path that does not exist or is
    /// not a directory.
    #[error("{0} does not exist or is not a directory")]
    NotADirectory(String),
    /// The native watcher could not be initialized.
    #[error("failed to initialize native watcher: {0}")]
    Init(String),
    /// Registering or unregistering a native watch failed.
    #[error("failed to register watch root {path}: {source}")]
    Register {
        /// The root path that failed to register.
        path: String,
        /// The underlying `notify` error.
        #[source]
        source: notify::Error,
    },
    /// `stop_watching` was called with a root that is not currently watched.
    #[error("root {0} is not currently watched")]
    NotWatched(String),
}

struct WatchedRoot {
    patterns: Vec<String>,
    recursive: bool,
}

/// Facade over a native recursive/non-recursive filesystem watch per root,
/// debounced and glob-filtered into [`RawEvent`]s carrying
/// `DomainEvent::ClassFileChanged` payloads.
pub struct FileWatcher {
    debouncer: StdMutex<Debouncer<RecommendedWatcher>>,
    roots: std::sync::Arc<StdRwLock<HashMap<PathBuf, WatchedRoot>>>,
}

impl FileWatcher {
    /// Create a watcher that debounces native filesystem notifications over
    /// `debounce_window` (default: 50ms) and forwards matching
    /// changes as [`RawEvent`]s on `events_tx`.
    pub fn new(debounce_window: Duration, events_tx: mpsc::Sender<RawEvent>) -> Result<Self, WatcherError> {
        let (raw_tx, raw_rx) = std::sync::mpsc::channel::<DebounceEventResult>();
        let debouncer =
            new_debouncer(debounce_window, raw_tx).map_err(|err| WatcherError::Init(err.to_string()))?;

        let roots = std::sync::Arc::new(StdRwLock::new(HashMap::new()));
        let roots_for_thread = roots.clone();

        std::thread::Builder::new()
            .name("bytehot-watcher-debounce".to_string())
            .spawn(move || {
                for result in raw_rx {
                    match result {
                        Ok(events) => {
                            for event in events {
                                if let Some(raw_event) = classify(&roots_for_thread, &event.path) {
                                    if events_tx.blocking_send(raw_event).is_err() {
                                        // Receiver dropped; the watcher is shutting down.
                                        return;
                                    }
                                }
                            }
                        }
                        Err(errors) => {
                            for err in errors {
                                tracing::warn!(error = %err, "file watcher reported an error");
                            }
                        }
                    }
                }
            })
            .expect("failed to spawn debounce thread");

        Ok(Self {
            debouncer: StdMutex::new(debouncer),
            roots,
        })
    }

    /// Begin watching `root` for changes matching any of `patterns`
    /// (basename glob expressions). Idempotent: re-registering the same
    /// root with identical patterns and recursion mode is a no-op. Returns
    /// the canonical path used internally as the watch identifier.
    pub async fn start_watching(
        &self,
        root: &str,
        patterns: Vec<String>,
        recursive: bool,
    ) -> Result<String, WatcherError> {
        let root_path = PathBuf::from(root);
        let metadata = tokio::fs::metadata(&root_path)
            .await
            .map_err(|_| WatcherError::NotADirectory(root.to_string()))?;
        if !metadata.is_dir() {
            return Err(WatcherError::NotADirectory(root.to_string()));
        }
        let canonical = tokio::fs::canonicalize(&root_path)
            .await
            .unwrap_or(root_path);

        {
            let roots = self.roots.read().expect("roots lock poisoned");
            if let Some(existing) = roots.get(&canonical) {
                if existing.patterns == patterns && existing.recursive == recursive {
                    return Ok(canonical.to_string_lossy().to_string());
                }
            }
        }

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        {
            let mut debouncer = self.debouncer.lock().expect("debouncer lock poisoned");
            debouncer
                .watcher()
                .watch(&canonical, mode)
                .map_err(|source| WatcherError::Register {
                    path: root.to_string(),
                    source,
                })?;
        }
        self.roots
            .write()
            .expect("roots lock poisoned")
            .insert(canonical.clone(), WatchedRoot { patterns, recursive });
        tracing::info!(root = %canonical.display(), recursive, "registered watch root");
        Ok(canonical.to_string_lossy().to_string())
    }

    /// Stop watching a previously registered root.
    pub async fn stop_watching(&self, watch_id: &str) -> Result<(), WatcherError> {
        let path = PathBuf::from(watch_id);
        {
            let mut debouncer = self.debouncer.lock().expect("debouncer lock poisoned");
            debouncer
                .watcher()
                .unwatch(&path)
                .map_err(|source| WatcherError::Register {
                    path: watch_id.to_string(),
                    source,
                })?;
        }
        let removed = self.roots.write().expect("roots lock poisoned").remove(&path);
        if removed.is_none() {
            return Err(WatcherError::NotWatched(watch_id.to_string()));
        }
        tracing::info!(root = watch_id, "unregistered watch root");
        Ok(())
    }

    /// Whether `path` is currently a registered watch root.
    pub fn is_watching(&self, path: &str) -> bool {
        self.roots
            .read()
            .expect("roots lock poisoned")
            .contains_key(Path::new(path))
    }

    /// Every currently registered watch root.
    pub fn watched_paths(&self) -> Vec<String> {
        self.roots
            .read()
            .expect("roots lock poisoned")
            .keys()
            .map(|p| p.to_string_lossy().to_string())
            .collect()
    }
}

#[async_trait]
impl FileWatcherPort for FileWatcher {
    async fn watch(&self, path: String, patterns: Vec<String>, recursive: bool) -> Result<(), PortError> {
        self.start_watching(&path, patterns, recursive)
            .await
            .map(|_| ())
            .map_err(|err| PortError::Adapter(Box::new(err)))
    }

    async fn unwatch(&self, path: &str) -> Result<(), PortError> {
        self.stop_watching(path)
            .await
            .map_err(|err| PortError::Adapter(Box::new(err)))
    }
}

fn classify(roots: &StdRwLock<HashMap<PathBuf, WatchedRoot>>, changed: &Path) -> Option<RawEvent> {
    let roots = roots.read().ok()?;
    let basename = changed.file_name()?.to_string_lossy().to_string();
    let matches_some_root = roots.iter().any(|(root, cfg)| {
        changed.starts_with(root.as_path())
            && cfg
                .patterns
                .iter()
                .any(|pattern| glob::Pattern::new(pattern).map(|p| p.matches(&basename)).unwrap_or(false))
    });
    if !matches_some_root {
        return None;
    }
    // A transient I/O failure reading size silently drops this detection;
    // the next native notification will re-trigger it.
    let metadata = std::fs::metadata(changed).ok()?;
    let aggregate_id = AggregateId::new(changed.to_string_lossy().to_string()).ok()?;
    Some(RawEvent::new(
        AggregateType::new("filewatch").ok()?,
        aggregate_id,
        DomainEvent::ClassFileChanged {
            path: changed.to_string_lossy().to_string(),
            class_name: class_name_from_path(changed),
            size_bytes: metadata.len(),
            detected_at: chrono::Utc::now(),
        },
    ))
}

/// Best-effort fully-qualified class name from a `.class` file path: find a
/// `classes` directory component (the usual build-output marker) and join
/// everything below it with `.`, stripping the extension. Falls back to the
/// bare file stem when no such marker is present.
fn class_name_from_path(path: &Path) -> Option<String> {
    let components: Vec<&str> = path
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    if let Some(position) = components.iter().rposition(|c| *c == "classes") {
        let rest = &components[position + 1..];
        if rest.is_empty() {
            return None;
        }
        let joined = rest.join(".");
        return Some(joined.strip_suffix(".class").map(str::to_string).unwrap_or(joined));
    }
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}
