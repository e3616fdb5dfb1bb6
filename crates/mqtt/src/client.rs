//! Broker connection for a subscribing MQTT client.
//!
//! [`MqttOptions`] holds the broker address and session parameters.
//! [`MqttConnection::connect`] opens a TCP connection and completes the
//! CONNECT/CONNACK handshake; afterwards the connection reads framed
//! [`Packet`]s and writes raw encoded packets.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::codec::{self, DecodeError, EncodeError, Packet, QoS};

/// Size of each socket read.
const READ_CHUNK: usize = 4096;

/// Broker username and password. The password never appears in `Debug`.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection parameters for one broker.
#[derive(Debug, Clone)]
pub struct MqttOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub credentials: Option<Credentials>,
    /// Interval between PINGREQs; also advertised to the broker.
    pub keep_alive: Duration,
    /// Bound on TCP connect and on waiting for CONNACK.
    pub connect_timeout: Duration,
}

impl MqttOptions {
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            credentials: None,
            keep_alive: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    fn keep_alive_secs(&self) -> u16 {
        u16::try_from(self.keep_alive.as_secs()).unwrap_or(u16::MAX)
    }
}

/// Errors raised while talking to the broker.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Connection refused by broker (return code {code}: {reason})")]
    Refused { code: u8, reason: &'static str },

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Connection closed by broker")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// A live, handshaken connection to a broker.
#[derive(Debug)]
pub struct MqttConnection<S = TcpStream> {
    stream: S,
    buffer: Vec<u8>,
}

impl MqttConnection<TcpStream> {
    /// Open a TCP connection to the broker and perform the MQTT handshake.
    pub async fn connect(options: &MqttOptions) -> Result<Self, MqttError> {
        let address = (options.host.as_str(), options.port);
        let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| MqttError::Timeout("TCP connect"))??;
        stream.set_nodelay(true)?;

        Self::handshake(stream, options).await
    }
}

impl<S> MqttConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Send CONNECT over an already-open stream and wait for CONNACK.
    pub async fn handshake(stream: S, options: &MqttOptions) -> Result<Self, MqttError> {
        let mut conn = Self {
            stream,
            buffer: Vec::with_capacity(READ_CHUNK),
        };

        let credentials = options
            .credentials
            .as_ref()
            .map(|c| (c.username.as_str(), c.password()));
        let connect = codec::encode_connect(
            &options.client_id,
            credentials,
            options.keep_alive_secs(),
            true,
        )?;
        conn.send(&connect).await?;

        let reply = tokio::time::timeout(options.connect_timeout, conn.read_packet())
            .await
            .map_err(|_| MqttError::Timeout("CONNACK"))??;

        match reply {
            Packet::ConnAck { return_code: 0, .. } => Ok(conn),
            Packet::ConnAck { return_code, .. } => Err(MqttError::Refused {
                code: return_code,
                reason: codec::connack_reason(return_code),
            }),
            other => Err(MqttError::Protocol(format!(
                "expected CONNACK, received {other:?}"
            ))),
        }
    }

    /// Request QoS 0 subscriptions for `topics`. The SUBACK arrives later
    /// through [`read_packet`](Self::read_packet).
    pub async fn subscribe(&mut self, packet_id: u16, topics: &[String]) -> Result<(), MqttError> {
        let packet = codec::encode_subscribe(packet_id, topics, QoS::AtMostOnce)?;
        self.send(&packet).await
    }

    /// Read the next complete packet.
    ///
    /// Cancel-safe: partially received bytes stay buffered for the next call.
    pub async fn read_packet(&mut self) -> Result<Packet, MqttError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some((packet, used)) = codec::decode(&self.buffer)? {
                self.buffer.drain(..used);
                return Ok(packet);
            }

            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(MqttError::ConnectionClosed);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Write one encoded packet.
    pub async fn send(&mut self, packet: &[u8]) -> Result<(), MqttError> {
        self.stream.write_all(packet).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Send DISCONNECT and close the stream, ignoring failures.
    pub async fn disconnect(mut self) {
        let _ = self.send(&codec::DISCONNECT).await;
        let _ = self.stream.shutdown().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
