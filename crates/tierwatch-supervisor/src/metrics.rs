//! Process-wide supervision counters

use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Restart counter exported through the `metrics` facade
pub const RESTARTS_TOTAL: &str = "tierwatch_supervisor_restarts_total";

/// Restart counts, last latency and start time
///
/// Lives for the whole process; nothing resets it.
#[derive(Debug)]
pub struct SupervisorMetrics {
    started_at: Instant,
    restarts: DashMap<&'static str, u64>,
    last_latency: Mutex<Option<Duration>>,
}

impl Default for SupervisorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorMetrics {
    /// Counters starting now
    #[must_use]
    pub fn new() -> Self {
        metrics::describe_counter!(RESTARTS_TOTAL, "Loops restarted by the supervisor");
        Self {
            started_at: Instant::now(),
            restarts: DashMap::new(),
            last_latency: Mutex::new(None),
        }
    }

    /// Count one restart of `module`; returns the new total
    pub fn record_restart(&self, module: &'static str) -> u64 {
        metrics::counter!(RESTARTS_TOTAL, "module" => module).increment(1);
        let mut count = self.restarts.entry(module).or_insert(0);
        *count += 1;
        *count
    }

    /// Restarts of `module` so far
    #[must_use]
    pub fn restarts(&self, module: &str) -> u64 {
        self.restarts.get(module).map(|c| *c).unwrap_or(0)
    }

    /// Restarts across all modules
    #[must_use]
    pub fn total_restarts(&self) -> u64 {
        self.restarts.iter().map(|c| *c.value()).sum()
    }

    /// Store the latest latency measurement, keeping the previous one if none
    pub fn observe_latency(&self, latency: Option<Duration>) -> Option<Duration> {
        let mut last = self.last_latency.lock();
        if latency.is_some() {
            *last = latency;
        }
        *last
    }

    /// Last known latency
    #[must_use]
    pub fn last_latency(&self) -> Option<Duration> {
        *self.last_latency.lock()
    }

    /// Time since start
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_module() {
        let metrics = SupervisorMetrics::new();
        assert_eq!(metrics.record_restart("scheduler"), 1);
        assert_eq!(metrics.record_restart("scheduler"), 2);
        metrics.record_restart("mail");
        assert_eq!(metrics.restarts("scheduler"), 2);
        assert_eq!(metrics.restarts("other"), 0);
        assert_eq!(metrics.total_restarts(), 3);
    }

    #[test]
    fn latency_keeps_last_known_value() {
        let metrics = SupervisorMetrics::new();
        metrics.observe_latency(Some(Duration::from_millis(80)));
        assert_eq!(metrics.observe_latency(None), Some(Duration::from_millis(80)));
    }
}
