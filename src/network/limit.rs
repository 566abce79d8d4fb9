//! Outgoing flood control.
//!
//! The server tolerates a burst of `server_queue_size` lines and then about
//! `messages_per_second` lines per second. The limiter keeps the send times
//! of the last `server_queue_size` lines and delays the next one while the
//! log is full and its oldest entry is younger than `1 / messages_per_second`.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Time-ordered log of recent sends.
#[derive(Debug, Default)]
pub struct RateLimiter {
    log: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long to wait before the next send is allowed.
    pub fn delay(&self, now: Instant, messages_per_second: f64, capacity: usize) -> Option<Duration> {
        if self.log.len() < capacity.max(1) {
            return None;
        }
        let oldest = *self.log.front()?;
        let interval = Duration::from_secs_f64(1.0 / messages_per_second);
        let age = now.saturating_duration_since(oldest);
        (age < interval).then(|| interval - age)
    }

    /// Record a send, evicting the oldest entries beyond `capacity`.
    pub fn record(&mut self, now: Instant, capacity: usize) {
        self.log.push_back(now);
        while self.log.len() > capacity.max(1) {
            self.log.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn clear(&mut self) {
        self.log.clear();
    }
}
