//! Scheduler configuration and jitter

use crate::holds::DEFAULT_HOLD_WINDOW;
use crate::reconstruct::DEFAULT_HISTORY_WINDOW;
use rand::Rng;
use std::time::Duration;
use tierwatch_runtime::DEFAULT_COOLDOWN;

/// Default spacing of cycles
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

/// Default maximum jitter in either direction
pub const DEFAULT_JITTER: Duration = Duration::from_secs(120);

/// Default pause before each player lookup
pub const DEFAULT_ENTITY_DELAY: Duration = Duration::from_secs(5);

/// Random offset applied to each sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Sleep exactly the interval
    None,
    /// Uniform offset in `[-max, +max]`
    Uniform(Duration),
}

impl JitterPolicy {
    /// Draw an offset in milliseconds
    #[must_use]
    pub fn sample_millis(&self) -> i64 {
        match self {
            Self::None => 0,
            Self::Uniform(max) => {
                let max = i64::try_from(max.as_millis()).unwrap_or(i64::MAX);
                if max == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(-max..=max)
                }
            }
        }
    }

    /// Sleep before the next cycle: `interval` shifted by a jitter draw,
    /// never negative
    #[must_use]
    pub fn sleep_for(&self, interval: Duration) -> Duration {
        jittered(interval, self.sample_millis())
    }
}

/// `interval` shifted by `offset_millis`, clamped at zero
#[must_use]
pub fn jittered(interval: Duration, offset_millis: i64) -> Duration {
    let base = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
    let total = base.saturating_add(offset_millis).max(0);
    Duration::from_millis(u64::try_from(total).unwrap_or(0))
}

/// Scheduler tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Spacing of cycles
    pub interval: Duration,
    /// Jitter applied to each sleep
    pub jitter: JitterPolicy,
    /// Pause before each player lookup
    pub entity_delay: Duration,
    /// Messages read back on restore
    pub history_window: usize,
    /// Messages inspected for holds
    pub hold_window: usize,
    /// Sleep after a crash before the loop resumes
    pub cooldown: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            jitter: JitterPolicy::Uniform(DEFAULT_JITTER),
            entity_delay: DEFAULT_ENTITY_DELAY,
            history_window: DEFAULT_HISTORY_WINDOW,
            hold_window: DEFAULT_HOLD_WINDOW,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl SchedulerConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cycle interval
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the jitter policy
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the per-player pause
    #[must_use]
    pub fn with_entity_delay(mut self, delay: Duration) -> Self {
        self.entity_delay = delay;
        self
    }

    /// Set the restore window
    #[must_use]
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Set the hold scan window
    #[must_use]
    pub fn with_hold_window(mut self, window: usize) -> Self {
        self.hold_window = window;
        self
    }

    /// Set the crash cool-down
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}
