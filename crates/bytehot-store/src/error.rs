use bytehot_types::AggregateVersion;

/// Errors surfaced by an [`crate::EventStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// `append` was attempted with an `aggregate_version` that did not
    /// equal `current_version + 1`.
    #[error("concurrency conflict: expected version {expected}, got {actual}")]
    ConcurrencyConflict {
        /// The version that would have been accepted.
        expected: AggregateVersion,
        /// The version the caller actually supplied.
        actual: AggregateVersion,
    },
    /// The requested event, aggregate, or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// An I/O error occurred while reading or writing the backing store.
    #[error("I/O error: {0}")]
    Io(String),
    /// A stored envelope could not be deserialized, or a new one could not
    /// be serialized.
    #[error("(de)serialization error: {0}")]
    Serialization(String),
    /// The store detected a condition it has no specific variant for.
    #[error("internal store error: {0}")]
    Internal(String),
    /// A stored envelope's `payload_digest` did not match its recomputed
    /// value; a corrupted file makes that aggregate unreadable until
    /// repaired.
    #[error("corrupted event file, payload digest mismatch: {0}")]
    Corrupted(String),
}

impl From<std::io::Error> for EventStoreError {
    fn from(err: std::io::Error) -> Self {
        EventStoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EventStoreError {
    fn from(err: serde_json::Error) -> Self {
        EventStoreError::Serialization(err.to_string())
    }
}
