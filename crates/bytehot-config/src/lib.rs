#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **bytehot-config** – Layered configuration loading for ByteHot Core.
//!
//! Sources are merged highest-priority-last using the `config` crate: a
//! config file (YAML), then `BYTEHOT_*`-prefixed
//! environment variables, with explicit process-argument overrides applied
//! on top of the merged result. Missing watch paths is treated as a fatal
//! [`ConfigError`] at bootstrap.

use std::path::PathBuf;

use bytehot_events::Configuration;
use bytehot_types::{ValidationMode, WatchPathConfig};
use config::{Config as ConfigSource, Environment, File, FileFormat};
use serde::Deserialize;

/// Filename searched in the current directory when no config path is named
/// by an argument or by [`CONFIG_PATH_ENV_VAR`] (a filesystem-resolved
/// stand-in for a classpath-resolved default).
pub const DEFAULT_CONFIG_PATH: &str = "bytehot.yaml";

/// Environment variable naming the config file to load, checked before
/// falling back to [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV_VAR: &str = "BYTEHOT_CONFIG";

/// Prefix applied to environment variables read as configuration overrides,
/// mapped from `BYTEHOT_*` with underscores treated as dot separators.
pub const ENV_PREFIX: &str = "BYTEHOT";

/// Errors loading ByteHot's configuration. Fatal at bootstrap and never
/// recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The `config` crate failed to read or merge a source.
    #[error("failed to load configuration from {source_description}: {message}")]
    Load {
        /// Human-readable description of the source that failed (a file
        /// path, "environment", or similar).
        source_description: String,
        /// The underlying error message.
        message: String,
    },
    /// The merged configuration has no `watchPaths` entries.
    #[error("configuration is missing required field `watchPaths`; missing watch paths is fatal at bootstrap")]
    MissingWatchPaths,
}

/// Process-argument overrides, applied with highest priority after the file
/// and environment sources have been merged (source priority, highest
/// first: process arguments, process environment, config file, then a
/// classpath-resolved default).
#[derive(Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Explicit config file path, overriding [`CONFIG_PATH_ENV_VAR`] and
    /// [`DEFAULT_CONFIG_PATH`].
    pub config_path: Option<PathBuf>,
    /// Overrides the control-surface port.
    pub port: Option<u16>,
    /// Overrides the validation strictness.
    pub validation_mode: Option<ValidationMode>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, rename = "watchPaths")]
    watch_paths: Vec<WatchPathConfig>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default, rename = "validationMode")]
    validation_mode: ValidationMode,
    #[serde(default)]
    agent_discovery_hints: Vec<String>,
}

/// Load the effective [`Configuration`], merging (lowest to highest
/// priority) a YAML config file, `BYTEHOT_*` environment variables, and
/// `args`.
pub fn load(args: &ConfigArgs) -> Result<Configuration, ConfigError> {
    let config_path = resolve_config_path(args);

    let mut builder = ConfigSource::builder();
    if config_path.exists() {
        builder = builder.add_source(File::new(&config_path.to_string_lossy(), FileFormat::Yaml));
        tracing::debug!(path = %config_path.display(), "loading configuration file");
    } else {
        tracing::debug!(path = %config_path.display(), "no configuration file found, using environment and defaults only");
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let merged = builder.build().map_err(|err| ConfigError::Load {
        source_description: config_path.display().to_string(),
        message: err.to_string(),
    })?;

    let mut raw: RawConfig = merged.try_deserialize().map_err(|err| ConfigError::Load {
        source_description: "merged configuration".to_string(),
        message: err.to_string(),
    })?;

    if let Some(port) = args.port {
        raw.port = Some(port);
    }
    if let Some(mode) = args.validation_mode {
        raw.validation_mode = mode;
    }

    if raw.watch_paths.is_empty() {
        return Err(ConfigError::MissingWatchPaths);
    }

    Ok(Configuration {
        watch_paths: raw.watch_paths,
        port: raw.port,
        validation_mode: raw.validation_mode,
        agent_discovery_hints: raw.agent_discovery_hints,
    })
}

fn resolve_config_path(args: &ConfigArgs) -> PathBuf {
    if let Some(path) = &args.config_path {
        return path.clone();
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV_VAR) {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// Parse a YAML configuration document directly, bypassing file/env
/// resolution — used by tests and by callers that already hold the document
/// in memory (e.g. an embedded default shipped with the agent manifest).
pub fn parse_yaml(document: &str) -> Result<Configuration, ConfigError> {
    let merged = ConfigSource::builder()
        .add_source(File::from_str(document, FileFormat::Yaml))
        .build()
        .map_err(|err| ConfigError::Load {
            source_description: "inline document".to_string(),
            message: err.to_string(),
        })?;
    let raw: RawConfig = merged.try_deserialize().map_err(|err| ConfigError::Load {
        source_description: "inline document".to_string(),
        message: err.to_string(),
    })?;
    if raw.watch_paths.is_empty() {
        return Err(ConfigError::MissingWatchPaths);
    }
    Ok(Configuration {
        watch_paths: raw.watch_paths,
        port: raw.port,
        validation_mode: raw.validation_mode,
        agent_discovery_hints: raw.agent_discovery_hints,
    })
}
