//! Declarative alerting, evaluated periodically.
//!
//! Named rules with a condition and severity, evaluated on an interval
//! against a rolling metric snapshot. Rules read directly off counters the
//! caller already tracks, so there is no need for a second time-series store
//! alongside `metrics`. Evaluation only ever produces [`AlertFired`] values;
//! it never takes action itself.

use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::interval;

/// The condition an [`AlertRule`] checks against its snapshot input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertCondition {
    /// Fires when the observed ratio falls below `threshold`.
    SuccessRateBelow {
        /// Minimum acceptable ratio of successes to attempts, in `[0.0, 1.0]`.
        threshold: f64,
    },
    /// Fires when the observed count exceeds `threshold`.
    CountAbove {
        /// Maximum acceptable count before this rule fires.
        threshold: u64,
    },
}

/// A named, declarative alert rule, e.g. "success rate below threshold over
/// the observation window".
#[derive(Debug, Clone)]
pub struct AlertRule {
    /// Stable rule identifier surfaced on a fired alert.
    pub name: String,
    /// The condition this rule evaluates.
    pub condition: AlertCondition,
}

/// A window's worth of raw counts an [`AlertRule`] evaluates against.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricSnapshot {
    /// Successful operations observed in the window.
    pub successes: u64,
    /// Failed operations observed in the window.
    pub failures: u64,
}

impl MetricSnapshot {
    fn attempts(&self) -> u64 {
        self.successes + self.failures
    }

    fn success_rate(&self) -> f64 {
        if self.attempts() == 0 {
            1.0
        } else {
            self.successes as f64 / self.attempts() as f64
        }
    }
}

/// An alert produced by evaluating a rule against a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertFired {
    /// The rule that fired.
    pub rule_name: String,
    /// Human-readable description of the breach.
    pub message: String,
}

impl AlertRule {
    /// Evaluate this rule against `snapshot`, returning `Some` if it fires.
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> Option<AlertFired> {
        match self.condition {
            AlertCondition::SuccessRateBelow { threshold } => {
                let rate = snapshot.success_rate();
                (rate < threshold).then(|| AlertFired {
                    rule_name: self.name.clone(),
                    message: format!(
                        "success rate {rate:.3} fell below threshold {threshold:.3} ({} successes / {} attempts)",
                        snapshot.successes,
                        snapshot.attempts()
                    ),
                })
            }
            AlertCondition::CountAbove { threshold } => {
                let count = snapshot.attempts();
                (count > threshold).then(|| AlertFired {
                    rule_name: self.name.clone(),
                    message: format!("count {count} exceeded threshold {threshold}"),
                })
            }
        }
    }
}

/// Periodically evaluates a fixed rule set against a snapshot supplied by
/// the caller, broadcasting every [`AlertFired`] it produces.
pub struct AlertEvaluator {
    rules: Vec<AlertRule>,
}

impl AlertEvaluator {
    /// Build an evaluator over `rules`.
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self { rules }
    }

    /// Evaluate every rule once against `snapshot`.
    pub fn evaluate_once(&self, snapshot: &MetricSnapshot) -> Vec<AlertFired> {
        self.rules.iter().filter_map(|rule| rule.evaluate(snapshot)).collect()
    }

    /// Run the evaluation loop on `period`, pulling a fresh snapshot from
    /// `snapshot_rx` each tick and broadcasting fired alerts on the returned
    /// receiver. Exits when `snapshot_rx`'s sender is dropped.
    pub fn spawn(
        self,
        period: Duration,
        mut snapshot_rx: watch::Receiver<MetricSnapshot>,
    ) -> broadcast::Receiver<AlertFired> {
        let (tx, rx) = broadcast::channel(256);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if snapshot_rx.changed().await.is_err() {
                    return;
                }
                let snapshot = *snapshot_rx.borrow();
                for alert in self.evaluate_once(&snapshot) {
                    tracing::warn!(rule = %alert.rule_name, message = %alert.message, "alert fired");
                    let _ = tx.send(alert);
                }
            }
        });
        rx
    }
}
