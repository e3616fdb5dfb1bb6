//! Push-ingest of arrivals for sources that cannot reach the broker.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use iot_health_core::types::Timestamp;
use iot_health_events::ArrivalEvent;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /api/arrivals`.
///
/// Arrivals are stamped on receipt, the same as MQTT deliveries, so every
/// channel's history stays in arrival order.
#[derive(Debug, Deserialize)]
pub struct RecordArrival {
    pub topic: String,
}

/// Accepted arrival echoed back to the caller.
#[derive(Debug, Serialize)]
pub struct ArrivalAccepted {
    pub topic: String,
    pub received_at: Timestamp,
}

/// POST /api/arrivals
///
/// Queue an arrival for a registered topic. Responds 202 since recording
/// happens on the recorder task; unknown topics get 404 and are never
/// tracked.
pub async fn record_arrival(
    State(state): State<AppState>,
    Json(input): Json<RecordArrival>,
) -> AppResult<(StatusCode, Json<DataResponse<ArrivalAccepted>>)> {
    if input.topic.trim().is_empty() {
        return Err(AppError::BadRequest("topic must not be empty".into()));
    }
    if state.registry.get(&input.topic).is_none() {
        return Err(AppError::UnknownTopic(input.topic));
    }

    let received_at = Utc::now();
    state
        .arrivals
        .publish(ArrivalEvent::at(input.topic.clone(), received_at))
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: ArrivalAccepted {
                topic: input.topic,
                received_at,
            },
        }),
    ))
}
