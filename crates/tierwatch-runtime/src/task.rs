//! Explicit task-handle abstraction
//!
//! Wraps a tokio [`JoinHandle`] so that owners and the supervisor can reason
//! about a loop through a [`TaskStatus`] instead of poking at raw handles.

use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use tokio::task::{JoinError, JoinHandle};

/// Lifecycle of a supervised task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Never spawned
    Idle,
    /// Spawned and not yet completed
    Running,
    /// Completed by returning
    Finished,
    /// Completed by panicking
    Failed(String),
    /// Aborted through [`TaskHandle::cancel`]
    Cancelled,
}

impl TaskStatus {
    /// Whether the task is still executing
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "never started"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    handle: Option<JoinHandle<()>>,
    /// Outcome of the last completed handle, once observed
    outcome: Option<TaskStatus>,
    cancel_requested: bool,
}

/// Handle to one named background task
///
/// At most one task is tracked at a time; spawning again aborts the previous
/// one. Safe to share between the owner and the supervisor.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    slot: Mutex<Slot>,
}

impl TaskHandle {
    /// Create an idle handle
    #[inline]
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Task name used in logs and reports
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Spawn `future` on the current tokio runtime, aborting any task that is
    /// still tracked by this handle.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if let Some(previous) = slot.handle.take() {
            if !previous.is_finished() {
                tracing::debug!(task = self.name, "aborting previous task before respawn");
            }
            previous.abort();
        }
        slot.handle = Some(tokio::spawn(future));
        slot.outcome = None;
        slot.cancel_requested = false;
        tracing::debug!(task = self.name, "task spawned");
    }

    /// Whether the tracked task is still executing
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.status().is_alive()
    }

    /// Current status, resolving the outcome of a completed task
    pub fn status(&self) -> TaskStatus {
        let mut guard = self.slot.lock();
        let slot = &mut *guard;
        if let Some(handle) = slot.handle.as_mut() {
            if !handle.is_finished() {
                return TaskStatus::Running;
            }
            // Completed: the join result is ready, so polling once never blocks.
            let status = match handle.now_or_never() {
                Some(result) => classify(result, slot.cancel_requested),
                None => return TaskStatus::Running,
            };
            slot.handle = None;
            slot.outcome = Some(status);
        }
        slot.outcome.clone().unwrap_or(TaskStatus::Idle)
    }

    /// Abort the tracked task. Returns whether a live task was aborted.
    ///
    /// Abortion takes effect at the task's next suspension point; use
    /// [`TaskHandle::shutdown`] to wait for it.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        slot.cancel_requested = true;
        match slot.handle.as_ref() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                tracing::info!(task = self.name, "task cancelled");
                true
            }
            _ => false,
        }
    }

    /// Wait for the tracked task to complete and return its final status
    pub async fn join(&self) -> TaskStatus {
        let (handle, cancel_requested) = {
            let mut slot = self.slot.lock();
            (slot.handle.take(), slot.cancel_requested)
        };
        let Some(handle) = handle else {
            return self.status();
        };
        let status = classify(handle.await, cancel_requested);
        self.slot.lock().outcome = Some(status.clone());
        status
    }

    /// Abort the tracked task and wait until it has been dropped
    pub async fn shutdown(&self) -> TaskStatus {
        self.cancel();
        self.join().await
    }
}

fn classify(result: Result<(), JoinError>, cancel_requested: bool) -> TaskStatus {
    match result {
        Ok(()) => TaskStatus::Finished,
        Err(e) if e.is_cancelled() => {
            if !cancel_requested {
                tracing::warn!("task aborted without a cancel request");
            }
            TaskStatus::Cancelled
        }
        Err(e) => match e.try_into_panic() {
            Ok(payload) => TaskStatus::Failed(crate::boundary::panic_message(payload.as_ref())),
            Err(e) => TaskStatus::Failed(e.to_string()),
        },
    }
}
