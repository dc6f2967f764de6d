//! Supervisor tuning

use std::time::Duration;
use tierwatch_runtime::DEFAULT_COOLDOWN;

/// Default spacing of checks
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(120);

/// Default lag after which a live loop counts as stuck
pub const DEFAULT_STALL_THRESHOLD: Duration = Duration::from_secs(300);

/// Invalid supervisor configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorConfigError {
    /// Checks must be spaced
    #[error("supervisor period must be non-zero")]
    ZeroPeriod,

    /// A zero threshold would restart every loop on every check
    #[error("stall threshold must be non-zero")]
    ZeroThreshold,
}

/// Supervisor tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Spacing of checks
    pub period: Duration,
    /// Lag after which a live loop counts as stuck
    pub stall_threshold: Duration,
    /// Sleep after a crash of the supervisor loop itself
    pub cooldown: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl SupervisorConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the check period
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Set the stall threshold
    #[must_use]
    pub fn with_stall_threshold(mut self, threshold: Duration) -> Self {
        self.stall_threshold = threshold;
        self
    }

    /// Reject unusable values
    pub fn validate(&self) -> Result<(), SupervisorConfigError> {
        if self.period.is_zero() {
            return Err(SupervisorConfigError::ZeroPeriod);
        }
        if self.stall_threshold.is_zero() {
            return Err(SupervisorConfigError::ZeroThreshold);
        }
        Ok(())
    }

    /// Threshold as a signed duration, for comparing against lags
    #[must_use]
    pub fn threshold(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.stall_threshold).unwrap_or(chrono::Duration::MAX)
    }
}
