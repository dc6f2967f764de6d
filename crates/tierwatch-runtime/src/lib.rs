//! tierwatch runtime plumbing
//!
//! Shared vocabulary for the long-running loops of the workspace:
//! - [`TaskHandle`]: spawn / is-alive / cancel / join over a tokio task
//! - [`Heartbeat`]: liveness timestamp written by a loop, read by the supervisor
//! - [`Supervised`]: what the supervisor needs to know about a loop
//! - [`ReportSink`]: where crash logs and watchdog reports go
//! - [`run_resilient`]: the outermost loop boundary that never lets a failure
//!   terminate the owning task
//!
//! # Example
//!
//! ```rust,ignore
//! use tierwatch_runtime::{run_resilient, LogSink, TaskHandle};
//!
//! let task = TaskHandle::new("poller");
//! let sink = Arc::new(LogSink);
//! task.spawn(run_resilient("poller", Duration::from_secs(60), sink, || poll_forever()));
//! assert!(task.is_alive());
//! ```

#![warn(unreachable_pub)]

pub mod boundary;
pub mod heartbeat;
pub mod report;
pub mod supervised;
pub mod task;

pub use boundary::{panic_message, run_resilient, DEFAULT_COOLDOWN};
pub use heartbeat::Heartbeat;
pub use report::{LogSink, ModuleReport, ModuleState, ReportSink, WatchdogReport};
pub use supervised::{Stall, StallKind, Supervised};
pub use task::{TaskHandle, TaskStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
