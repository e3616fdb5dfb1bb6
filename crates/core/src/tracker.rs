//! Shared per-channel arrival state.
//!
//! [`ArrivalTracker`] is written by the arrival recorder and read by every
//! status/metrics request. A single mutex guards the whole map; each
//! critical section is a handful of memory operations, so readers never
//! wait behind I/O.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::Timestamp;

/// Maximum number of arrival timestamps retained per channel.
pub const HISTORY_CAPACITY: usize = 100;

/// Arrival bookkeeping for one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrivalState {
    last_arrival: Option<Timestamp>,
    count: u64,
    history: VecDeque<Timestamp>,
}

impl ArrivalState {
    /// Apply one arrival. Keeps the last [`HISTORY_CAPACITY`] timestamps.
    fn push(&mut self, at: Timestamp) {
        self.last_arrival = Some(at);
        self.count += 1;
        self.history.push_back(at);
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
    }

    /// Most recent arrival, `None` if the channel has never been seen.
    pub fn last_arrival(&self) -> Option<Timestamp> {
        self.last_arrival
    }

    /// Total arrivals since process start.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Retained arrival timestamps, oldest first.
    pub fn history(&self) -> &VecDeque<Timestamp> {
        &self.history
    }
}

/// Point-in-time copy of every tracked channel's state.
pub type TrackerSnapshot = HashMap<String, ArrivalState>;

/// Thread-safe arrival state keyed by channel identifier.
///
/// Constructed once at startup and shared via `Arc` between the ingestion
/// side and the query side.
#[derive(Debug, Default)]
pub struct ArrivalTracker {
    states: Mutex<HashMap<String, ArrivalState>>,
}

impl ArrivalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an arrival on `channel_id` at `at`.
    ///
    /// Creating the state, updating the last arrival, bumping the counter and
    /// appending (and trimming) the history happen under one lock acquisition.
    pub fn record(&self, channel_id: &str, at: Timestamp) {
        let mut states = self.lock();
        match states.get_mut(channel_id) {
            Some(state) => state.push(at),
            None => {
                let mut state = ArrivalState::default();
                state.push(at);
                states.insert(channel_id.to_owned(), state);
            }
        }
    }

    /// Consistent copy of all tracked state.
    pub fn snapshot(&self) -> TrackerSnapshot {
        self.lock().clone()
    }

    /// Copy of a single channel's state, if it has ever been seen.
    pub fn state(&self, channel_id: &str) -> Option<ArrivalState> {
        self.lock().get(channel_id).cloned()
    }

    /// Number of channels with at least one arrival.
    pub fn tracked_count(&self) -> usize {
        self.lock().len()
    }

    // A panic cannot interrupt `ArrivalState::push` halfway, so a poisoned
    // map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ArrivalState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
