use std::sync::Arc;

use chrono::Utc;
use iot_health_core::registry::ChannelRegistry;
use iot_health_core::status::{render_all, StatusView};
use iot_health_core::tracker::ArrivalTracker;
use iot_health_events::ArrivalBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything is behind an `Arc` or is a channel handle.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Monitored topics, fixed at startup.
    pub registry: Arc<ChannelRegistry>,
    /// Per-topic arrival state, written by the recorder task.
    pub tracker: Arc<ArrivalTracker>,
    /// Publishing handle for push-ingested arrivals.
    pub arrivals: ArrivalBus,
}

impl AppState {
    /// Evaluate every registered topic against one snapshot taken now.
    pub fn status_views(&self) -> Vec<StatusView> {
        let snapshot = self.tracker.snapshot();
        render_all(&self.registry, &snapshot, Utc::now())
    }
}
