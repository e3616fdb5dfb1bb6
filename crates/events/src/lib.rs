//! Arrival event plumbing between message sources and the tracker.
//!
//! - [`ArrivalBus`]: cloneable publishing handle backed by
//!   `tokio::sync::mpsc`; any number of sources push into it.
//! - [`ArrivalEvent`]: one message delivery on one topic.
//! - [`ArrivalRecorder`]: the single consumer that applies events to an
//!   [`ArrivalTracker`](iot_health_core::tracker::ArrivalTracker).

pub mod bus;
pub mod recorder;

pub use bus::{ArrivalBus, ArrivalEvent, ArrivalReceiver, BusError};
pub use recorder::ArrivalRecorder;
