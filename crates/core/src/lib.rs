//! Arrival tracking and health evaluation for monitored MQTT topics.
//!
//! Everything in this crate is synchronous and free of I/O except
//! [`registry::ChannelRegistry::load`], which reads the topics file.
//!
//! - [`registry`]: the fixed set of monitored channels.
//! - [`tracker`]: shared per-channel arrival state.
//! - [`status`]: health classification and human-readable summaries.
//! - [`metrics`]: Prometheus text exposition of evaluated status.

pub mod error;
pub mod metrics;
pub mod registry;
pub mod status;
pub mod tracker;
pub mod types;
