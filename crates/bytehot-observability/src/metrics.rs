//! Pull-based metrics registry.
//!
//! A `DashMap`-backed wrapper that gives every component a cheap way to
//! record counters/gauges/histograms, built on the `metrics` +
//! `metrics-exporter-prometheus` crates: the exporter installs a global
//! recorder and renders the standard text exposition format without pulling
//! in a second Prometheus client library.

use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Counter and histogram names ByteHot records. Kept as constants so every
/// call site and the Prometheus scrape agree on spelling.
pub mod metric_names {
    /// Total class-file change detections observed.
    pub const CHANGES_DETECTED_TOTAL: &str = "bytehot_changes_detected_total";
    /// Total bytecode validations performed, labeled `outcome=accepted|rejected`.
    pub const VALIDATIONS_TOTAL: &str = "bytehot_validations_total";
    /// Validation wall-clock duration.
    pub const VALIDATION_DURATION_SECONDS: &str = "bytehot_validation_duration_seconds";
    /// Total redefinition attempts, labeled `outcome=succeeded|failed`.
    pub const REDEFINITIONS_TOTAL: &str = "bytehot_redefinitions_total";
    /// Redefinition wall-clock duration.
    pub const REDEFINITION_DURATION_SECONDS: &str = "bytehot_redefinition_duration_seconds";
}

/// Errors installing or rendering the metrics registry.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The global `metrics` recorder was already installed by this process.
    #[error("metrics recorder already installed: {0}")]
    AlreadyInstalled(String),
}

/// Process-wide metrics facade. Construction installs the global `metrics`
/// recorder; every other ByteHot crate records through the `metrics` crate's
/// macros directly (`metrics::counter!`, `metrics::histogram!`) using the
/// names in [`metric_names`] and this type is only needed to render a scrape.
#[derive(Clone)]
pub struct MetricsRegistry {
    handle: Arc<PrometheusHandle>,
}

impl MetricsRegistry {
    /// Install the global Prometheus recorder and return a registry able to
    /// render the current snapshot as text exposition format.
    pub fn install() -> Result<Self, MetricsError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|err| MetricsError::AlreadyInstalled(err.to_string()))?;
        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Render the current snapshot in Prometheus text exposition format,
    /// for the `status`/metrics endpoint to serve.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}
