use std::path::Path;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

use crate::handlers::dashboard;
use crate::state::AppState;

/// Dashboard page and its icon assets.
///
/// ```text
/// GET /                     -> index
/// GET /static/icons/{file}  -> files under `icons_dir`
/// ```
pub fn router(icons_dir: &Path) -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .nest_service("/static/icons", ServeDir::new(icons_dir))
}
