use axum::extract::State;
use axum::Json;
use iot_health_core::status::StatusView;

use crate::state::AppState;

/// GET /api/status
///
/// One entry per registered topic, in configuration order.
pub async fn list_status(State(state): State<AppState>) -> Json<Vec<StatusView>> {
    Json(state.status_views())
}
