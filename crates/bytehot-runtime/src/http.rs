//! Pull-based HTTP control surface bound to the optional `port`
//! configuration field.
//!
//! A small `axum` surface served beside the domain core rather than folded
//! into it, scoped to two read-only routes: a liveness probe reflecting the
//! attach lifecycle, and a Prometheus scrape target over the same
//! [`MetricsRegistry`] the router and executor already record into.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router as AxumRouter;
use bytehot_observability::MetricsRegistry;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Clone)]
struct ControlState {
    attached: Arc<AtomicBool>,
    metrics: Option<MetricsRegistry>,
}

/// Bind `port` and serve the control surface in the background, returning
/// the driving task so the caller can abort it on shutdown the same way it
/// aborts the watch pump.
pub(crate) fn spawn(port: u16, attached: Arc<AtomicBool>, metrics: Option<MetricsRegistry>) -> JoinHandle<()> {
    let state = ControlState { attached, metrics };
    let app = AxumRouter::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    tokio::spawn(async move {
        let listener = match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!(error = %err, port, "failed to bind the control surface port");
                return;
            }
        };
        tracing::info!(port, "control surface listening");
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "control surface server stopped unexpectedly");
        }
    })
}

async fn health_check(State(state): State<ControlState>) -> impl IntoResponse {
    if state.attached.load(Ordering::SeqCst) {
        (StatusCode::OK, "attached")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not attached")
    }
}

async fn metrics_handler(State(state): State<ControlState>) -> impl IntoResponse {
    match &state.metrics {
        Some(metrics) => (StatusCode::OK, metrics.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics not installed").into_response(),
    }
}
