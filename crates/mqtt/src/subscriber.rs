//! Long-running subscriber task.
//!
//! [`MqttSubscriber::run`] connects, subscribes to every configured topic,
//! and turns each incoming PUBLISH into an [`ArrivalEvent`] on the bus.
//! Lost sessions are re-established with exponential backoff until the
//! [`CancellationToken`] fires or the bus closes.

use std::time::Duration;

use iot_health_events::{ArrivalBus, ArrivalEvent};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::{MqttConnection, MqttError, MqttOptions};
use crate::codec::{self, Packet, QoS, SUBACK_FAILURE};
use crate::reconnect::{Backoff, ReconnectPolicy};

/// Packet identifier used for the single SUBSCRIBE request per session.
const SUBSCRIBE_PACKET_ID: u16 = 1;

/// Shortest keep-alive interval the session loop will schedule.
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(1);

/// Why a session ended.
#[derive(Debug)]
pub(crate) enum SessionEnd {
    Cancelled,
    BusClosed,
    Lost(MqttError),
}

enum Step {
    Cancel,
    Ping,
    Packet(Result<Packet, MqttError>),
}

/// Subscribes to a fixed topic list and publishes arrivals to the bus.
pub struct MqttSubscriber {
    options: MqttOptions,
    topics: Vec<String>,
    bus: ArrivalBus,
    policy: ReconnectPolicy,
}

impl MqttSubscriber {
    pub fn new(options: MqttOptions, topics: Vec<String>, bus: ArrivalBus) -> Self {
        Self {
            options,
            topics,
            bus,
            policy: ReconnectPolicy::default(),
        }
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Run until `cancel` fires or the arrival bus closes.
    ///
    /// With an empty topic list there is nothing to watch and the task
    /// returns immediately.
    pub async fn run(self, cancel: CancellationToken) {
        if self.topics.is_empty() {
            tracing::warn!("No topics configured, MQTT subscriber is idle");
            return;
        }

        let mut backoff = Backoff::new(self.policy.clone());

        loop {
            let connected = tokio::select! {
                _ = cancel.cancelled() => return,
                result = MqttConnection::connect(&self.options) => result,
            };

            match connected {
                Ok(conn) => {
                    tracing::info!(
                        host = %self.options.host,
                        port = self.options.port,
                        client_id = %self.options.client_id,
                        "Connected to MQTT broker",
                    );
                    backoff.reset();

                    match self.run_session(conn, &cancel).await {
                        SessionEnd::Cancelled => {
                            tracing::info!("MQTT subscriber stopped");
                            return;
                        }
                        SessionEnd::BusClosed => {
                            tracing::info!("Arrival bus closed, MQTT subscriber stopping");
                            return;
                        }
                        SessionEnd::Lost(e) => {
                            tracing::warn!(error = %e, "MQTT session lost");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        host = %self.options.host,
                        port = self.options.port,
                        attempt = backoff.attempt() + 1,
                        error = %e,
                        "MQTT connect failed",
                    );
                }
            }

            let delay = backoff.next_delay();
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Drive one established session until it ends.
    pub(crate) async fn run_session<S>(
        &self,
        mut conn: MqttConnection<S>,
        cancel: &CancellationToken,
    ) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Err(e) = conn.subscribe(SUBSCRIBE_PACKET_ID, &self.topics).await {
            return SessionEnd::Lost(e);
        }
        tracing::debug!(topics = self.topics.len(), "SUBSCRIBE sent");

        let period = self.options.keep_alive.max(MIN_KEEP_ALIVE);
        let mut ping = interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut awaiting_pong = false;

        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => Step::Cancel,
                _ = ping.tick() => Step::Ping,
                packet = conn.read_packet() => Step::Packet(packet),
            };

            let packet = match step {
                Step::Cancel => {
                    conn.disconnect().await;
                    return SessionEnd::Cancelled;
                }
                Step::Ping => {
                    if awaiting_pong {
                        return SessionEnd::Lost(MqttError::Timeout("PINGRESP"));
                    }
                    if let Err(e) = conn.send(&codec::PINGREQ).await {
                        return SessionEnd::Lost(e);
                    }
                    awaiting_pong = true;
                    continue;
                }
                Step::Packet(Err(e)) => return SessionEnd::Lost(e),
                Step::Packet(Ok(packet)) => packet,
            };

            let reply = match packet {
                Packet::Publish(publish) => {
                    tracing::trace!(topic = %publish.topic, bytes = publish.payload_len, "PUBLISH received");
                    let event = ArrivalEvent::now(publish.topic);
                    if self.bus.publish(event).await.is_err() {
                        conn.disconnect().await;
                        return SessionEnd::BusClosed;
                    }
                    match (publish.qos, publish.packet_id) {
                        (QoS::AtLeastOnce, Some(id)) => Some(codec::encode_puback(id)),
                        (QoS::ExactlyOnce, Some(id)) => Some(codec::encode_pubrec(id)),
                        _ => None,
                    }
                }
                Packet::PubRel(id) => Some(codec::encode_pubcomp(id)),
                Packet::SubAck { return_codes, .. } => {
                    self.log_suback(&return_codes);
                    None
                }
                Packet::PingResp => {
                    awaiting_pong = false;
                    None
                }
                other => {
                    tracing::debug!(packet = ?other, "Ignoring unexpected packet");
                    None
                }
            };

            if let Some(bytes) = reply {
                if let Err(e) = conn.send(&bytes).await {
                    return SessionEnd::Lost(e);
                }
            }
        }
    }

    fn log_suback(&self, return_codes: &[u8]) {
        for (topic, code) in self.topics.iter().zip(return_codes) {
            if *code == SUBACK_FAILURE {
                tracing::warn!(topic = %topic, "Broker rejected subscription");
            } else {
                tracing::info!(topic = %topic, granted_qos = code, "Subscribed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
