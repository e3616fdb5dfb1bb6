//! Minimal MQTT 3.1.1 subscriber feeding the arrival bus.
//!
//! Only what liveness monitoring needs: connect (optionally with
//! credentials), subscribe to a fixed topic list, acknowledge incoming
//! PUBLISH packets, keep the session alive, and reconnect with backoff.
//! Payloads are never inspected.

pub mod client;
pub mod codec;
pub mod reconnect;
pub mod subscriber;

pub use client::{Credentials, MqttConnection, MqttError, MqttOptions};
pub use reconnect::ReconnectPolicy;
pub use subscriber::MqttSubscriber;
