//! Watchdog reports and the sink they are delivered to

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Observed state of one supervised module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Alive and making progress
    Operational,
    /// Task was not running and has been restarted
    Dead,
    /// Task was alive but stalled and has been force-restarted
    Stuck,
    /// Module is switched off by configuration
    Disabled,
}

impl ModuleState {
    /// Whether the supervisor had to intervene
    #[inline]
    #[must_use]
    pub fn needed_action(&self) -> bool {
        matches!(self, Self::Dead | Self::Stuck)
    }

    fn marker(&self) -> &'static str {
        match self {
            Self::Operational => "OK",
            Self::Dead => "DEAD",
            Self::Stuck => "STUCK",
            Self::Disabled => "OFF",
        }
    }
}

/// One line of a watchdog report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReport {
    /// Module name
    pub name: &'static str,
    /// State at check time
    pub state: ModuleState,
    /// Human readable detail
    pub detail: String,
    /// Restarts performed on this module since process start
    pub restarts: u64,
}

/// Result of one supervisor check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogReport {
    /// Per-module lines in registration order
    pub modules: Vec<ModuleReport>,
    /// Last responsiveness measurement of the chat platform
    pub latency: Option<Duration>,
    /// Process uptime
    pub uptime: Duration,
    /// Interventions performed during this check
    pub actions: usize,
    /// Requested by an operator rather than the periodic timer
    pub forced: bool,
}

impl WatchdogReport {
    /// Number of modules that are operational or intentionally disabled
    #[must_use]
    pub fn healthy(&self) -> usize {
        self.modules
            .iter()
            .filter(|m| !m.state.needed_action())
            .count()
    }

    /// One-line operator summary
    #[must_use]
    pub fn summary(&self) -> String {
        if self.actions == 0 {
            "All Systems Operational".to_string()
        } else {
            format!(
                "Status: {} / {} | Actions: {}",
                self.healthy(),
                self.modules.len(),
                self.actions
            )
        }
    }
}

impl fmt::Display for WatchdogReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Watchdog report{}", if self.forced { " (manual)" } else { "" })?;
        for module in &self.modules {
            writeln!(
                f,
                "  [{}] {}: {} (restarts: {})",
                module.state.marker(),
                module.name,
                module.detail,
                module.restarts
            )?;
        }
        match self.latency {
            Some(latency) => writeln!(f, "  latency: {}ms", latency.as_millis())?,
            None => writeln!(f, "  latency: n/a")?,
        }
        let secs = self.uptime.as_secs();
        writeln!(f, "  uptime: {}h {}m", secs / 3600, (secs % 3600) / 60)?;
        write!(f, "  {}", self.summary())
    }
}

/// Destination for crash logs and watchdog reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// A loop boundary caught a failure
    async fn crash(&self, source: &str, error: &str);

    /// The supervisor produced a report worth publishing
    async fn watchdog(&self, report: &WatchdogReport);

    /// Current responsiveness of the publishing platform, if known
    async fn latency(&self) -> Option<Duration> {
        None
    }
}

/// Sink that only writes to the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl ReportSink for LogSink {
    async fn crash(&self, source: &str, error: &str) {
        tracing::error!(source, error, "crash reported");
    }

    async fn watchdog(&self, report: &WatchdogReport) {
        tracing::info!(
            actions = report.actions,
            forced = report.forced,
            "{}",
            report.summary()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &'static str, state: ModuleState) -> ModuleReport {
        ModuleReport {
            name,
            state,
            detail: String::new(),
            restarts: 0,
        }
    }

    #[test]
    fn summary_without_actions() {
        let report = WatchdogReport {
            modules: vec![module("scheduler", ModuleState::Operational)],
            latency: None,
            uptime: Duration::from_secs(10),
            actions: 0,
            forced: true,
        };
        assert_eq!(report.summary(), "All Systems Operational");
    }

    #[test]
    fn summary_counts_interventions() {
        let report = WatchdogReport {
            modules: vec![
                module("scheduler", ModuleState::Dead),
                module("mail", ModuleState::Disabled),
            ],
            latency: Some(Duration::from_millis(80)),
            uptime: Duration::from_secs(7260),
            actions: 1,
            forced: false,
        };
        assert_eq!(report.summary(), "Status: 1 / 2 | Actions: 1");

        let text = report.to_string();
        assert!(text.contains("[DEAD] scheduler"));
        assert!(text.contains("uptime: 2h 1m"));
        assert!(text.contains("latency: 80ms"));
    }
}
