//! Exponential backoff between broker connection attempts.

use std::time::Duration;

/// Tunable parameters for reconnect backoff.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Growth factor applied after each consecutive failure.
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay following `current`, clamped to [`max_delay`](Self::max_delay).
    pub fn grow(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(next_ms).min(self.max_delay)
    }
}

/// Running backoff state for one subscriber.
///
/// [`next_delay`](Self::next_delay) yields the wait before the next attempt
/// and grows the following one; [`reset`](Self::reset) is called once a
/// session is established.
#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    current: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        let current = policy.initial_delay;
        Self {
            policy,
            current,
            attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.policy.grow(self.current);
        self.attempt += 1;
        delay
    }

    /// Consecutive failed attempts since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.current = self.policy.initial_delay;
        self.attempt = 0;
    }
}
