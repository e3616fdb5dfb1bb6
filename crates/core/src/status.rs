//! Health classification and human-readable status for monitored channels.
//!
//! Pure logic over a [`TrackerSnapshot`] and the current time. Nothing here
//! is stored: health is re-derived on every read.

use std::collections::VecDeque;

use chrono::Duration;
use serde::Serialize;

use crate::registry::{Channel, ChannelRegistry};
use crate::tracker::{ArrivalState, TrackerSnapshot};
use crate::types::Timestamp;

/// A channel is healthy while its last arrival is younger than this.
pub const HEALTH_THRESHOLD_SECS: i64 = 3600;

/// Rendered in place of timestamps and durations for unseen channels.
pub const NEVER: &str = "Never";

/// Rendered in place of the average interval with fewer than two arrivals.
pub const NO_DATA: &str = "No data";

const SECS_PER_MINUTE: f64 = 60.0;
const SECS_PER_HOUR: f64 = 3600.0;
const SECS_PER_DAY: f64 = 86_400.0;

/// Health classification of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    NeverSeen,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::NeverSeen => "never_seen",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// The global health threshold as a duration.
pub fn health_threshold() -> Duration {
    Duration::seconds(HEALTH_THRESHOLD_SECS)
}

/// Classify a channel from its last arrival.
///
/// Healthy requires `now - last_arrival` strictly below `threshold`.
pub fn classify(last_arrival: Option<Timestamp>, now: Timestamp, threshold: Duration) -> HealthStatus {
    match last_arrival {
        None => HealthStatus::NeverSeen,
        Some(last) if now - last < threshold => HealthStatus::Healthy,
        Some(_) => HealthStatus::Unhealthy,
    }
}

/// Mean gap in seconds between consecutive arrivals in `history`.
///
/// `None` with fewer than two entries.
pub fn average_interval_secs(history: &VecDeque<Timestamp>) -> Option<f64> {
    if history.len() < 2 {
        return None;
    }

    let total_secs: f64 = history
        .iter()
        .zip(history.iter().skip(1))
        .map(|(prev, next)| duration_secs(*next - *prev))
        .sum();

    Some(total_secs / (history.len() - 1) as f64)
}

fn duration_secs(delta: Duration) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Format an interval in seconds with one decimal in the largest fitting unit.
///
/// Each unit's lower bound is inclusive: `60.0` renders as `"1.0m"`. A
/// negative mean (clock stepped backwards between arrivals) renders as
/// `"0.0s"`, matching how elapsed time clamps at zero.
pub fn humanize_interval(secs: f64) -> String {
    let secs = secs.max(0.0);
    if secs < SECS_PER_MINUTE {
        format!("{secs:.1}s")
    } else if secs < SECS_PER_HOUR {
        format!("{:.1}m", secs / SECS_PER_MINUTE)
    } else if secs < SECS_PER_DAY {
        format!("{:.1}h", secs / SECS_PER_HOUR)
    } else {
        format!("{:.1}d", secs / SECS_PER_DAY)
    }
}

/// Humanized average interval, or [`NO_DATA`].
pub fn average_interval(history: &VecDeque<Timestamp>) -> String {
    average_interval_secs(history)
        .map(humanize_interval)
        .unwrap_or_else(|| NO_DATA.to_string())
}

/// Absolute timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(ts: Timestamp) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Elapsed time truncated to whole seconds, e.g. `0:05:07` or `2 days, 3:00:01`.
///
/// Negative durations (clock skew) render as zero.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}

// ---------------------------------------------------------------------------
// StatusView
// ---------------------------------------------------------------------------

/// Evaluated status of one channel.
///
/// The JSON status endpoint serializes this directly; the metrics exporter
/// reads the same value, including the numeric fields skipped by serde.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub topic: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub last_seen: String,
    pub time_since: String,
    pub message_count: u64,
    pub avg_interval: String,
    pub status: HealthStatus,
    /// Last arrival as Unix seconds.
    #[serde(skip)]
    pub last_seen_epoch: Option<i64>,
    /// Unrounded average interval in seconds.
    #[serde(skip)]
    pub avg_interval_secs: Option<f64>,
}

/// Evaluate one channel. `state` is `None` for a channel never seen.
pub fn render_status(channel: &Channel, state: Option<&ArrivalState>, now: Timestamp) -> StatusView {
    let last_arrival = state.and_then(ArrivalState::last_arrival);
    let avg_interval_secs = state.and_then(|s| average_interval_secs(s.history()));

    StatusView {
        topic: channel.id().to_string(),
        display_name: channel.display_name().to_string(),
        channel_type: channel.channel_type().to_string(),
        last_seen: last_arrival.map_or_else(|| NEVER.to_string(), format_timestamp),
        time_since: last_arrival.map_or_else(|| NEVER.to_string(), |last| format_elapsed(now - last)),
        message_count: state.map_or(0, ArrivalState::count),
        avg_interval: avg_interval_secs.map_or_else(|| NO_DATA.to_string(), humanize_interval),
        status: classify(last_arrival, now, health_threshold()),
        last_seen_epoch: last_arrival.map(|ts| ts.timestamp()),
        avg_interval_secs,
    }
}

/// Evaluate every registry channel, in registry order.
pub fn render_all(registry: &ChannelRegistry, snapshot: &TrackerSnapshot, now: Timestamp) -> Vec<StatusView> {
    registry
        .channels()
        .iter()
        .map(|channel| render_status(channel, snapshot.get(channel.id()), now))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
