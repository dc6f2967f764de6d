//! Periodic watchdog over the supervised loops
//!
//! Each check walks the registered modules in order:
//! 1. disabled modules are reported and left alone
//! 2. a module whose task is not running is restarted (`Dead`)
//! 3. a running module whose stall exceeds the threshold is cancelled,
//!    restarted and re-armed (`Stuck`)
//! 4. anything else is `Operational`
//!
//! Reports go to the sink only when something was done or an operator asked.

use crate::config::SupervisorConfig;
use crate::metrics::SupervisorMetrics;
use chrono::Utc;
use std::convert::Infallible;
use std::sync::{Arc, Weak};
use tierwatch_runtime::{
    run_resilient, ModuleReport, ModuleState, ReportSink, Supervised, TaskHandle, TaskStatus,
    WatchdogReport,
};

/// Module name used in logs
pub const SUPERVISOR_NAME: &str = "supervisor";

/// Watches and resurrects loops
pub struct Supervisor {
    me: Weak<Supervisor>,
    config: SupervisorConfig,
    modules: Vec<Arc<dyn Supervised>>,
    sink: Arc<dyn ReportSink>,
    metrics: SupervisorMetrics,
    task: TaskHandle,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.config)
            .field(
                "modules",
                &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Supervisor over `modules`, in report order
    #[must_use]
    pub fn new(
        config: SupervisorConfig,
        modules: Vec<Arc<dyn Supervised>>,
        sink: Arc<dyn ReportSink>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            modules,
            sink,
            metrics: SupervisorMetrics::new(),
            task: TaskHandle::new(SUPERVISOR_NAME),
        })
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Process-wide counters
    #[inline]
    #[must_use]
    pub fn metrics(&self) -> &SupervisorMetrics {
        &self.metrics
    }

    /// Status of the supervisor's own task
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.task.status()
    }

    /// Spawn the periodic check loop
    pub fn start(&self) {
        let weak = self.me.clone();
        let sink = Arc::clone(&self.sink);
        self.task.spawn(run_resilient(
            SUPERVISOR_NAME,
            self.config.cooldown,
            sink,
            move || run_loop(weak.clone()),
        ));
        tracing::info!(
            period_secs = self.config.period.as_secs(),
            modules = self.modules.len(),
            "supervisor started"
        );
    }

    /// Cancel the loop and wait until it is gone
    pub async fn stop(&self) -> TaskStatus {
        self.task.shutdown().await
    }

    /// Operator-requested check; always emits the report
    pub async fn check_now(&self) -> WatchdogReport {
        self.check(true).await
    }

    /// Inspect every module once and intervene where needed
    pub async fn check(&self, forced: bool) -> WatchdogReport {
        let now = Utc::now();
        let threshold = self.config.threshold();
        let mut actions = 0;
        let mut modules = Vec::with_capacity(self.modules.len());

        for module in &self.modules {
            let name = module.name();
            let status = module.status();

            let (state, detail) = if !module.enabled() {
                (ModuleState::Disabled, "disabled".to_string())
            } else if !status.is_alive() {
                tracing::error!(module = name, status = %status, "module not running, restarting");
                module.restart();
                self.metrics.record_restart(name);
                actions += 1;
                (ModuleState::Dead, format!("restarted ({status})"))
            } else if let Some(stall) = module.stall(now).filter(|s| s.exceeds(threshold)) {
                tracing::error!(
                    module = name,
                    kind = ?stall.kind,
                    lag_secs = stall.lag.num_seconds(),
                    "module stalled, forcing restart"
                );
                module.force_restart(now);
                self.metrics.record_restart(name);
                actions += 1;
                (
                    ModuleState::Stuck,
                    format!("force-restarted after {}s without progress", stall.lag.num_seconds()),
                )
            } else {
                (ModuleState::Operational, module.detail(now))
            };

            modules.push(ModuleReport {
                name,
                state,
                detail,
                restarts: self.metrics.restarts(name),
            });
        }

        let latency = self.metrics.observe_latency(self.sink.latency().await);
        let report = WatchdogReport {
            modules,
            latency,
            uptime: self.metrics.uptime(),
            actions,
            forced,
        };

        if actions > 0 || forced {
            self.sink.watchdog(&report).await;
        }
        tracing::info!(actions, forced, "{}", report.summary());
        report
    }
}

async fn run_loop(weak: Weak<Supervisor>) -> Result<(), Infallible> {
    loop {
        let period = {
            let Some(supervisor) = weak.upgrade() else {
                return Ok(());
            };
            supervisor.config.period
        };
        tokio::time::sleep(period).await;

        let Some(supervisor) = weak.upgrade() else {
            return Ok(());
        };
        supervisor.check(false).await;
    }
}
