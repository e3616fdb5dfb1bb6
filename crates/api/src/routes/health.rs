use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Number of monitored topics.
    pub channels: usize,
    /// Whether the arrival recorder is still consuming events.
    pub recorder_running: bool,
}

/// GET /health -- returns service liveness.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let recorder_running = !state.arrivals.is_closed();
    let status = if recorder_running { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        channels: state.registry.len(),
        recorder_running,
    })
}

/// Mount health check routes at the root level.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
