use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytehot_events::Envelope;
use bytehot_types::{AggregateId, AggregateType, AggregateVersion};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::EventStoreError;
use crate::store::EventStore;

/// An append-only [`EventStore`] backed by a directory tree: one directory
/// per `aggregate_type`, one subdirectory per `aggregate_id`
/// (percent-escaped for filesystem safety), one file per event named
/// `{version:010}-{event_kind}-{event_id}.json`. Listing a subdirectory and
/// sorting by name yields canonical version order.
///
/// Crash-safety follows a write-temp-then-rename discipline; concurrency is
/// provided by a per-`(aggregate_type, aggregate_id)` advisory lock rather
/// than the single in-process `RwLock` [`crate::memory::MemoryEventStore`]
/// uses, since a filesystem has no equivalent of one shared map to
/// serialize on.
pub struct FsEventStore {
    root: PathBuf,
    locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

/// Percent-encode everything except `[A-Za-z0-9-._]`, matching
/// `AggregateId::escaped` so both aggregate components are safe path parts.
fn escape_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.as_bytes() {
        match *b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' => out.push(*b as char),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

impl FsEventStore {
    /// Open (creating if necessary) an event store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, EventStoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            locks: DashMap::new(),
        })
    }

    fn aggregate_dir(&self, aggregate_type: &AggregateType, aggregate_id: &AggregateId) -> PathBuf {
        self.root
            .join(escape_component(aggregate_type.as_str()))
            .join(aggregate_id.escaped())
    }

    fn lock_for(&self, aggregate_type: &AggregateType, aggregate_id: &AggregateId) -> Arc<Mutex<()>> {
        let key = (aggregate_type.as_str().to_string(), aggregate_id.as_str().to_string());
        self.locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// List event files under `dir`, sorted by their numeric version prefix.
    async fn sorted_event_files(dir: &Path) -> Result<Vec<PathBuf>, EventStoreError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_envelope(path: &Path) -> Result<Envelope, EventStoreError> {
        let bytes = tokio::fs::read(path).await?;
        let envelope: Envelope = serde_json::from_slice(&bytes)?;
        if !envelope.verify_payload_digest() {
            return Err(EventStoreError::Corrupted(path.display().to_string()));
        }
        Ok(envelope)
    }

    async fn read_all_envelopes(dir: &Path) -> Result<Vec<Envelope>, EventStoreError> {
        let mut envelopes = Vec::new();
        for file in Self::sorted_event_files(dir).await? {
            envelopes.push(Self::read_envelope(&file).await?);
        }
        Ok(envelopes)
    }

    /// Walk every aggregate-id directory under every aggregate-type
    /// directory, yielding every stored envelope. Used by the
    /// cross-aggregate queries (`events_by_type`, `events_between`); this
    /// crate trades an index for a tree-walk since the on-disk format is
    /// meant to be a human-inspectable contract, not an optimized index.
    async fn walk_all(&self) -> Result<Vec<Envelope>, EventStoreError> {
        let mut out = Vec::new();
        let mut type_entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(err) => return Err(err.into()),
        };
        while let Some(type_entry) = type_entries.next_entry().await? {
            if !type_entry.file_type().await?.is_dir() {
                continue;
            }
            let mut id_entries = tokio::fs::read_dir(type_entry.path()).await?;
            while let Some(id_entry) = id_entries.next_entry().await? {
                if !id_entry.file_type().await?.is_dir() {
                    continue;
                }
                out.extend(Self::read_all_envelopes(&id_entry.path()).await?);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl EventStore for FsEventStore {
    async fn append(&self, envelope: Envelope) -> Result<(), EventStoreError> {
        let lock = self.lock_for(&envelope.aggregate_type, &envelope.aggregate_id);
        let _guard = lock.lock().await;

        let dir = self.aggregate_dir(&envelope.aggregate_type, &envelope.aggregate_id);
        tokio::fs::create_dir_all(&dir).await?;

        let current = Self::sorted_event_files(&dir)
            .await?
            .len() as AggregateVersion;
        let expected = current + 1;
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

        let file_name = format!(
            "{:010}-{}-{}.json",
            envelope.aggregate_version,
            envelope.payload.kind(),
            envelope.event_id
        );
        let final_path = dir.join(&file_name);
        let tmp_path = dir.join(format!(".{}.tmp", file_name));

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;
        tracing::debug!(
            aggregate_type = envelope.aggregate_type.as_str(),
            aggregate_id = envelope.aggregate_id.as_str(),
            version = envelope.aggregate_version,
            "appended event"
        );
        Ok(())
    }

    async fn events_for(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<Envelope>, EventStoreError> {
        Self::read_all_envelopes(&self.aggregate_dir(aggregate_type, aggregate_id)).await
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
        let dir = self.aggregate_dir(aggregate_type, aggregate_id);
        Ok(Self::sorted_event_files(&dir).await?.len() as AggregateVersion)
    }

    async fn exists(
        &self,
        aggregate_type: &AggregateType,
        aggregate_id: &AggregateId,
    ) -> Result<bool, EventStoreError> {
        Ok(self.current_version(aggregate_type, aggregate_id).await? > 0)
    }

    async fn events_by_type(&self, event_kind: &str) -> Result<Vec<Envelope>, EventStoreError> {
        let mut matches: Vec<Envelope> = self
            .walk_all()
            .await?
            .into_iter()
            .filter(|e| e.payload.kind() == event_kind)
            .collect();
        matches.sort_by_key(|e| e.timestamp);
        Ok(matches)
    }

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, EventStoreError> {
        let mut matches: Vec<Envelope> = self
            .walk_all()
            .await?
            .into_iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect();
        matches.sort_by_key(|e| e.timestamp);
        Ok(matches)
    }

    async fn aggregate_types(&self) -> Result<Vec<AggregateType>, EventStoreError> {
        let mut types = std::collections::BTreeSet::new();
        for envelope in self.walk_all().await? {
            types.insert(envelope.aggregate_type);
        }
        Ok(types.into_iter().collect())
    }

    async fn aggregate_ids(
        &self,
        aggregate_type: &AggregateType,
    ) -> Result<Vec<AggregateId>, EventStoreError> {
        let mut ids = std::collections::BTreeSet::new();
        for envelope in self.walk_all().await? {
            if &envelope.aggregate_type == aggregate_type {
                ids.insert(envelope.aggregate_id);
            }
        }
        Ok(ids.into_iter().collect())
    }

    async fn total_count(&self) -> Result<u64, EventStoreError> {
        Ok(self.walk_all().await?.len() as u64)
    }

    async fn is_healthy(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}
