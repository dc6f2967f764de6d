//! Watchdog for tierwatch loops
//!
//! [`Supervisor`] periodically inspects every [`Supervised`] module,
//! restarts dead ones, force-restarts stalled ones and publishes a
//! [`WatchdogReport`] whenever it had to intervene.
//!
//! [`Supervised`]: tierwatch_runtime::Supervised
//! [`WatchdogReport`]: tierwatch_runtime::WatchdogReport

#![warn(unreachable_pub)]

pub mod config;
pub mod metrics;
pub mod supervisor;

pub use config::{SupervisorConfig, SupervisorConfigError, DEFAULT_PERIOD, DEFAULT_STALL_THRESHOLD};
pub use metrics::{SupervisorMetrics, RESTARTS_TOTAL};
pub use supervisor::{Supervisor, SUPERVISOR_NAME};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
