//! Error types for the reconciliation loop

use crate::channel::PublishError;

/// Failure that ends one run of the scheduler loop
///
/// Per-player failures never surface here; they are recorded in the cycle
/// report. The loop boundary resurrects the loop after any of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// Channel history could not be read back on restore
    #[error("state reconstruction failed: {0}")]
    History(#[from] PublishError),
}
