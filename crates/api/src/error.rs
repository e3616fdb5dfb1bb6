use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use iot_health_events::BusError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The topic is not in the monitored set.
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// The arrival bus could not accept an event.
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::UnknownTopic(topic) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Topic '{topic}' is not monitored"),
            ),
            AppError::Bus(err) => {
                tracing::error!(error = %err, "Arrival bus unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Arrival recording is unavailable".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
