//! Contract between a long-running loop and the supervisor

use crate::task::TaskStatus;
use chrono::{DateTime, Duration, Utc};

/// How a loop's progress is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallKind {
    /// The loop's next scheduled run is in the past by `Stall::lag`
    Overdue,
    /// The loop's heartbeat has been silent for `Stall::lag`
    Silent,
}

/// Progress lag of a loop at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stall {
    /// What is being measured
    pub kind: StallKind,
    /// How far behind the loop is. Negative when a deadline is still ahead.
    pub lag: Duration,
}

impl Stall {
    /// Lag past a deadline
    #[inline]
    #[must_use]
    pub fn overdue(lag: Duration) -> Self {
        Self {
            kind: StallKind::Overdue,
            lag,
        }
    }

    /// Lag since the last heartbeat
    #[inline]
    #[must_use]
    pub fn silent(lag: Duration) -> Self {
        Self {
            kind: StallKind::Silent,
            lag,
        }
    }

    /// Whether the lag is strictly beyond `threshold`
    #[inline]
    #[must_use]
    pub fn exceeds(&self, threshold: Duration) -> bool {
        self.lag > threshold
    }
}

/// A loop the supervisor can inspect and resurrect
///
/// Implementations must not block: every method is called from the
/// supervisor's own task.
pub trait Supervised: Send + Sync {
    /// Module name used in reports and restart counters
    fn name(&self) -> &'static str;

    /// Disabled modules are reported but never restarted
    fn enabled(&self) -> bool {
        true
    }

    /// Status of the module's task
    fn status(&self) -> TaskStatus;

    /// Progress lag at `now`, `None` when nothing is being measured yet
    fn stall(&self, now: DateTime<Utc>) -> Option<Stall>;

    /// Human readable detail for an operational module
    fn detail(&self, now: DateTime<Utc>) -> String;

    /// Spawn the loop again after it died
    fn restart(&self);

    /// Cancel a stuck loop, re-arm its progress marker at `now` and spawn it
    /// again
    fn force_restart(&self, now: DateTime<Utc>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strict() {
        let threshold = Duration::seconds(300);
        assert!(!Stall::overdue(Duration::seconds(300)).exceeds(threshold));
        assert!(Stall::overdue(Duration::seconds(301)).exceeds(threshold));
        assert!(!Stall::silent(Duration::seconds(-20)).exceeds(threshold));
    }
}
