#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **bytehot-types** – Shared primitive data structures for ByteHot Core.
//!
//! The crate is dependency-light and sits at the bottom of the crate graph so
//! that every other ByteHot crate can depend on it without causing cycles. It
//! makes no assumptions about I/O, persistence, or the instrumentation API of
//! the host runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

//─────────────────────────────
//  Security constants
//─────────────────────────────

/// Maximum length of an `aggregate_type` tag.
pub const MAX_AGGREGATE_TYPE_LEN: usize = 64;

/// Maximum length of an `aggregate_id` (e.g. an absolute class-file path).
pub const MAX_AGGREGATE_ID_LEN: usize = 4096;

/// Maximum number of violations reported on a single rejection.
pub const MAX_VIOLATIONS: usize = 256;

//─────────────────────────────
//  Aggregate identity
//─────────────────────────────

/// Discriminator for the kind of aggregate an event belongs to
/// (e.g. `"filewatch"`, `"hotswap"`, `"user"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateType(pub String);

impl AggregateType {
    /// Construct a new aggregate type tag, validating its length.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_AGGREGATE_TYPE_LEN {
            return Err(TypeError::InvalidLength {
                field: "aggregate_type",
                max: MAX_AGGREGATE_TYPE_LEN,
                actual: value.len(),
            });
        }
        Ok(Self(value))
    }

    /// Borrow the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key identifying a specific aggregate instance within its `AggregateType`
/// (e.g. an absolute class-file path, or a fully-qualified class name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(pub String);

impl AggregateId {
    /// Construct a new aggregate id, validating its length.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_AGGREGATE_ID_LEN {
            return Err(TypeError::InvalidLength {
                field: "aggregate_id",
                max: MAX_AGGREGATE_ID_LEN,
                actual: value.len(),
            });
        }
        Ok(Self(value))
    }

    /// Escape this id for safe use as a filesystem path component.
    ///
    /// Percent-encodes path separators and other characters that would be
    /// meaningful to the filesystem, so `aggregate_id`s that are themselves
    /// absolute paths can still be used as directory names.
    pub fn escaped(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for b in self.0.as_bytes() {
            match *b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' => {
                    out.push(*b as char)
                }
                other => out.push_str(&format!("%{:02X}", other)),
            }
        }
        out
    }

    /// Borrow the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing per-aggregate version number, starting at 1.
pub type AggregateVersion = u64;

//─────────────────────────────
//  Content addressing
//─────────────────────────────

/// Cryptographic content digest of a class body (BLAKE3, 32 bytes).
///
/// Identical bytecode always produces an identical hash; used both as a
/// cache key and as the identity referenced by `HotSwapRequested`.
#[derive(Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BytecodeHash(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl BytecodeHash {
    /// Compute the digest of a raw bytecode buffer.
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Hex-encoded representation, convenient for logging and filenames.
    pub fn to_hex(&self) -> String {
        hex_bytes::encode(&self.0)
    }
}

impl fmt::Debug for BytecodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BytecodeHash({})", self.to_hex())
    }
}

impl fmt::Display for BytecodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

mod hex_bytes {
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

//─────────────────────────────
//  Domain value types
//─────────────────────────────

/// Fully-qualified class name as it appears in the host runtime.
pub type ClassName = String;

/// A single glob pattern matched against a file's basename.
pub type GlobPattern = String;

/// Validation strictness selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Reject any change the host VM's redefinition primitive does not
    /// unconditionally support.
    Strict,
    /// Allow method addition when the instrumentation handle reports
    /// extended redefinition support.
    Lenient,
}

impl Default for ValidationMode {
    fn default() -> Self {
        ValidationMode::Strict
    }
}

impl std::str::FromStr for ValidationMode {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(ValidationMode::Strict),
            "lenient" => Ok(ValidationMode::Lenient),
            other => Err(TypeError::InvalidValidationMode(other.to_string())),
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::Strict => write!(f, "strict"),
            ValidationMode::Lenient => write!(f, "lenient"),
        }
    }
}

/// One watched directory root from the configuration schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchPathConfig {
    /// Absolute directory root to watch.
    pub path: String,
    /// Glob patterns (OR-combined) matched against a file's basename.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<GlobPattern>,
    /// Whether newly created subdirectories are automatically watched.
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_patterns() -> Vec<GlobPattern> {
    vec!["*.class".to_string()]
}

fn default_recursive() -> bool {
    true
}

/// A single redefinition-incompatibility finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A field was added or removed relative to the loaded class.
    FieldAdded {
        /// Field descriptor, e.g. `"count:I"`.
        descriptor: String,
    },
    /// A field was removed relative to the loaded class.
    FieldRemoved {
        /// Field descriptor, e.g. `"count:I"`.
        descriptor: String,
    },
    /// A method was added relative to the loaded class.
    MethodAdded {
        /// Method descriptor, e.g. `"doWork(I)V"`.
        descriptor: String,
    },
    /// A method was removed relative to the loaded class.
    MethodRemoved {
        /// Method descriptor, e.g. `"doWork(I)V"`.
        descriptor: String,
    },
    /// A method's signature, return type or access flags changed.
    MethodSignatureChanged {
        /// Method descriptor in the currently loaded class.
        before: String,
        /// Method descriptor in the proposed class body.
        after: String,
    },
    /// The superclass or a declared interface changed.
    HierarchyChanged {
        /// Human-readable description of the hierarchy change.
        detail: String,
    },
    /// Class-level access flags changed (e.g. `public` to `final`).
    AccessFlagsChanged {
        /// Access flags in the currently loaded class.
        before: u16,
        /// Access flags in the proposed class body.
        after: u16,
    },
    /// The class file itself could not be parsed.
    Malformed {
        /// Human-readable reason the class file was rejected.
        reason: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::FieldAdded { descriptor } => write!(f, "field added: {descriptor}"),
            Violation::FieldRemoved { descriptor } => write!(f, "field removed: {descriptor}"),
            Violation::MethodAdded { descriptor } => write!(f, "method added: {descriptor}"),
            Violation::MethodRemoved { descriptor } => write!(f, "method removed: {descriptor}"),
            Violation::MethodSignatureChanged { before, after } => {
                write!(f, "method signature changed: {before} -> {after}")
            }
            Violation::HierarchyChanged { detail } => write!(f, "hierarchy changed: {detail}"),
            Violation::AccessFlagsChanged { before, after } => {
                write!(f, "access flags changed: {before:#06x} -> {after:#06x}")
            }
            Violation::Malformed { reason } => write!(f, "malformed class file: {reason}"),
        }
    }
}

/// Failure kinds a hot-swap attempt can terminate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The host runtime does not support class redefinition at all.
    UnsupportedOperation,
    /// The host VM's bytecode verifier rejected the new class body.
    VerifierRejected,
    /// The target class is not currently loaded.
    ClassNotFound,
    /// The change violates a redefinition constraint the validator missed.
    IncompatibleChange,
    /// An I/O failure occurred while staging the redefinition.
    IoError,
    /// An unclassified failure occurred.
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

//─────────────────────────────
//  Errors
//─────────────────────────────

/// Errors raised constructing shared value types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypeError {
    /// A string field exceeded its maximum allowed length.
    #[error("{field} exceeds maximum length ({actual} > {max})")]
    InvalidLength {
        /// Name of the offending field.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
        /// Actual length supplied.
        actual: usize,
    },
    /// A string did not match any known [`ValidationMode`] variant.
    #[error("invalid validation mode `{0}` (expected `strict` or `lenient`)")]
    InvalidValidationMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_id_escapes_path_separators() {
        let id = AggregateId::new("/proj/target/classes/UserService.class").unwrap();
        let escaped = id.escaped();
        assert!(!escaped.contains('/'));
        assert!(escaped.contains("%2F"));
    }

    #[test]
    fn bytecode_hash_roundtrips_through_json() {
        let hash = BytecodeHash::of(b"hello world");
        let json = serde_json::to_string(&hash).unwrap();
        let back: BytecodeHash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, back);
    }

    #[test]
    fn identical_bytes_hash_identically() {
        assert_eq!(BytecodeHash::of(b"same"), BytecodeHash::of(b"same"));
        assert_ne!(BytecodeHash::of(b"same"), BytecodeHash::of(b"different"));
    }

    #[test]
    fn aggregate_type_rejects_empty() {
        assert!(AggregateType::new("").is_err());
    }

    #[test]
    fn watch_path_config_defaults() {
        let json = r#"{"path": "/proj/target/classes"}"#;
        let cfg: WatchPathConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.patterns, vec!["*.class".to_string()]);
        assert!(cfg.recursive);
    }
}

impl PartialEq for BytecodeHash {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for BytecodeHash {}
