#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **bytehot-observability** – Content-addressed caches, pull-based metrics,
//! and declarative alerting for ByteHot Core.
//!
//! Kept as its own crate, depended on by the validator (bytecode-digest
//! cache), the router (class-metadata cache), and the runtime's HTTP
//! control surface (`/metrics` rendering), deliberately separate from the
//! core dispatch logic it instruments.

mod alerting;
mod cache;
mod metrics;

pub use alerting::{AlertCondition, AlertEvaluator, AlertFired, AlertRule, MetricSnapshot};
pub use cache::LruTtlCache;
pub use metrics::{metric_names, MetricsError, MetricsRegistry};
