use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use iot_health_core::metrics;

use crate::state::AppState;

/// GET /metrics
///
/// Prometheus text exposition of every registered topic.
pub async fn export_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = metrics::export(&state.status_views());
    ([(header::CONTENT_TYPE, metrics::CONTENT_TYPE)], body)
}
