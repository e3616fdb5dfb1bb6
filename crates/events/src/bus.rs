//! In-process arrival bus backed by a `tokio::sync::mpsc` channel.
//!
//! Message sources hold an [`ArrivalBus`] and publish into it; exactly one
//! [`ArrivalReceiver`] drains it. The transport never touches tracker state
//! directly.

use chrono::Utc;
use iot_health_core::types::Timestamp;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// ArrivalEvent
// ---------------------------------------------------------------------------

/// A message was delivered on `topic` at `received_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalEvent {
    pub topic: String,
    pub received_at: Timestamp,
}

impl ArrivalEvent {
    /// An arrival on `topic` stamped with the current time.
    pub fn now(topic: impl Into<String>) -> Self {
        Self::at(topic, Utc::now())
    }

    /// An arrival on `topic` at an explicit time.
    pub fn at(topic: impl Into<String>, received_at: Timestamp) -> Self {
        Self {
            topic: topic.into(),
            received_at,
        }
    }
}

// ---------------------------------------------------------------------------
// ArrivalBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the arrival channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Receiving half of the bus, owned by the recorder.
pub type ArrivalReceiver = mpsc::Receiver<ArrivalEvent>;

/// Errors returned when an arrival cannot be queued.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The recorder has shut down.
    #[error("Arrival bus is closed")]
    Closed,

    /// The buffer is full (only from [`ArrivalBus::try_publish`]).
    #[error("Arrival bus is full")]
    Full,
}

/// Cloneable publishing handle for arrival events.
///
/// The channel closes once every `ArrivalBus` clone has been dropped, which
/// lets the recorder drain and exit.
#[derive(Debug, Clone)]
pub struct ArrivalBus {
    sender: mpsc::Sender<ArrivalEvent>,
}

impl ArrivalBus {
    /// Create a bus with a specific buffer capacity.
    ///
    /// When the buffer is full, [`publish`](Self::publish) waits for the
    /// recorder to catch up.
    pub fn new(capacity: usize) -> (Self, ArrivalReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Create a bus with [`DEFAULT_CAPACITY`].
    pub fn with_default_capacity() -> (Self, ArrivalReceiver) {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Queue an arrival, waiting for buffer space if necessary.
    pub async fn publish(&self, event: ArrivalEvent) -> Result<(), BusError> {
        self.sender.send(event).await.map_err(|_| BusError::Closed)
    }

    /// Queue an arrival without waiting. For callers outside async code.
    pub fn try_publish(&self, event: ArrivalEvent) -> Result<(), BusError> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BusError::Full,
            mpsc::error::TrySendError::Closed(_) => BusError::Closed,
        })
    }

    /// Whether the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
