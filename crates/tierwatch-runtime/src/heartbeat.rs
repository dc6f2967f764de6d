//! Liveness timestamps

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Last time a loop proved it was making progress
#[derive(Debug, Default)]
pub struct Heartbeat {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl Heartbeat {
    /// Create a heartbeat that has never beaten
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record progress now
    pub fn beat(&self) {
        self.beat_at(Utc::now());
    }

    /// Record progress at `at`
    pub fn beat_at(&self, at: DateTime<Utc>) {
        *self.last.lock() = Some(at);
    }

    /// Timestamp of the last beat
    #[must_use]
    pub fn last(&self) -> Option<DateTime<Utc>> {
        *self.last.lock()
    }

    /// Time elapsed since the last beat, `None` if it never beat
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last().map(|last| now - last)
    }

    /// Forget the last beat
    pub fn reset(&self) {
        *self.last.lock() = None;
    }
}
