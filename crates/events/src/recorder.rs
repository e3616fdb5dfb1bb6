//! Single consumer that applies arrival events to the tracker.
//!
//! [`ArrivalRecorder`] drains the [`ArrivalBus`](crate::bus::ArrivalBus)
//! receiver and calls [`ArrivalTracker::record`] for each event. It runs as
//! a long-lived background task and exits once every bus handle is dropped.

use std::sync::Arc;

use iot_health_core::tracker::ArrivalTracker;

use crate::bus::ArrivalReceiver;

/// Background service that records arrivals into the shared tracker.
pub struct ArrivalRecorder;

impl ArrivalRecorder {
    /// Run the recording loop until the bus closes.
    ///
    /// Returns the number of events recorded.
    pub async fn run(tracker: Arc<ArrivalTracker>, mut receiver: ArrivalReceiver) -> u64 {
        let mut recorded = 0u64;

        while let Some(event) = receiver.recv().await {
            tracker.record(&event.topic, event.received_at);
            recorded += 1;
            tracing::debug!(topic = %event.topic, "Received message on topic");
        }

        tracing::info!(recorded, "Arrival bus closed, recorder shutting down");
        recorded
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
