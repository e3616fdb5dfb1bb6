pub mod dashboard;
pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// GET  /status      -> list_status
/// POST /arrivals    -> record_arrival
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::status::list_status))
        .route("/arrivals", post(handlers::arrivals::record_arrival))
}

/// Root-level metrics route.
pub fn metrics_router() -> Router<AppState> {
    Router::new().route("/metrics", get(handlers::metrics::export_metrics))
}
