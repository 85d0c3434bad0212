//! Health, readiness and metrics endpoints.

use crate::cache::Cache;
use crate::error::RuntimeError;
use crate::shutdown::Shutdown;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Registry, TextEncoder};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// What the probe endpoints report on.
#[derive(Debug, Clone)]
pub struct ProbeState {
    registry: Registry,
    sync_signals: Vec<watch::Receiver<bool>>,
}

impl ProbeState {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            sync_signals: Vec::new(),
        }
    }

    /// `/readyz` stays 503 until `cache` has synced.
    #[must_use]
    pub fn track<K>(mut self, cache: &Cache<K>) -> Self {
        self.sync_signals.push(cache.synced_signal());
        self
    }

    fn is_ready(&self) -> bool {
        self.sync_signals.iter().all(|signal| *signal.borrow())
    }
}

pub fn router(state: ProbeState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serves the probe router on `addr` until shutdown.
pub async fn serve(addr: SocketAddr, state: ProbeState, shutdown: Shutdown) -> Result<(), RuntimeError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Probe server listening on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<ProbeState>) -> (StatusCode, &'static str) {
    if state.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "caches not synced")
    }
}

async fn metrics(State(state): State<ProbeState>) -> Response {
    match TextEncoder::new().encode_to_string(&state.registry.gather()) {
        Ok(body) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
