//! Metrics Collection and HTTP Endpoint
//!
//! The runner reports every state transition here; an axum server
//! exposes the counters as a JSON snapshot. The automaton never depends
//! on this for correctness.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// Transition counters updated by the automaton runner
#[derive(Debug, Default)]
pub struct Metrics {
    transitions: AtomicU64,
    current_state: AtomicI64,
    state_started_ms: AtomicI64,
}

impl Metrics {
    /// Create a collector with no recorded transitions
    pub fn new() -> Self {
        Self {
            transitions: AtomicU64::new(0),
            current_state: AtomicI64::new(-1),
            state_started_ms: AtomicI64::new(0),
        }
    }

    /// Record entry into a state with the given ordinal
    pub fn record_transition(&self, ordinal: u8) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
        self.current_state.store(ordinal as i64, Ordering::Relaxed);
        self.state_started_ms
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Snapshot the counters for export
    pub fn snapshot(&self) -> MetricsSnapshot {
        let started_ms = self.state_started_ms.load(Ordering::Relaxed);
        let started = chrono::DateTime::from_timestamp_millis(started_ms)
            .filter(|_| started_ms > 0)
            .map(|ts| ts.to_rfc3339());
        MetricsSnapshot {
            state_transitions: self.transitions.load(Ordering::Relaxed),
            current_state: self.current_state.load(Ordering::Relaxed),
            current_state_started: started,
        }
    }
}

/// Exported metrics payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total number of state transitions since startup
    pub state_transitions: u64,
    /// Ordinal of the current state (-1 before the first transition)
    pub current_state: i64,
    /// RFC 3339 timestamp of the current state's start
    pub current_state_started: Option<String>,
}

/// HTTP server exposing the metrics snapshot
pub struct MetricsServer {
    config: ApiConfig,
    metrics: Arc<Metrics>,
}

impl MetricsServer {
    /// Create a server for the given collector
    pub fn new(config: ApiConfig, metrics: Arc<Metrics>) -> Self {
        Self { config, metrics }
    }

    fn create_router(metrics: Arc<Metrics>) -> Router {
        Router::new()
            .route("/metrics", get(handle_metrics))
            .route("/health", get(handle_health))
            .with_state(metrics)
    }

    /// Start serving; returns immediately if the API is disabled
    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("metrics API disabled");
            return Ok(());
        }

        let app = Self::create_router(Arc::clone(&self.metrics));
        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!("metrics API listening on {}", self.config.bind_address);

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Network(format!("metrics server error: {e}")))?;

        Ok(())
    }
}

async fn handle_metrics(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    Json(metrics.snapshot())
}

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
