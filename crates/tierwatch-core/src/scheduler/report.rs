//! Cycle outcomes

use crate::model::MessageId;
use chrono::{DateTime, Utc};
use std::fmt;

/// What happened to one player during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityOutcome {
    /// The card was published
    Published {
        /// Message holding the card
        message: MessageId,
        /// Built from a baseline rather than fresh upstream data
        degraded: bool,
    },
    /// Nothing changed since the last publish
    Unchanged,
    /// Rendering or publishing failed; the baseline was not advanced
    PublishFailed(String),
}

/// Result of one completed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Per-player outcomes in configuration order
    pub outcomes: Vec<(String, EntityOutcome)>,
    /// Whether the summary board was republished
    pub summary_published: bool,
    /// Active holds seen by the scan
    pub holds: usize,
    /// Cycle start
    pub started_at: DateTime<Utc>,
    /// Cycle end
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    /// Outcome of one player
    #[must_use]
    pub fn outcome(&self, entity_id: &str) -> Option<&EntityOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == entity_id)
            .map(|(_, outcome)| outcome)
    }

    /// Number of published cards
    #[must_use]
    pub fn published(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Published { .. }))
    }

    /// Number of published cards built from a baseline
    #[must_use]
    pub fn degraded(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Published { degraded: true, .. }))
    }

    /// Number of unchanged players
    #[must_use]
    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Unchanged))
    }

    /// Number of failed publishes
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::PublishFailed(_)))
    }

    fn count(&self, pred: impl Fn(&EntityOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "published {} ({} degraded), unchanged {}, failed {}, summary {}",
            self.published(),
            self.degraded(),
            self.unchanged(),
            self.failed(),
            if self.summary_published { "updated" } else { "skipped" }
        )
    }
}

/// Result of asking for a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was already running
    Skipped,
    /// The cycle ran to completion
    Completed(CycleReport),
}

impl CycleOutcome {
    /// Report of a completed cycle
    #[must_use]
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Skipped => None,
            Self::Completed(report) => Some(report),
        }
    }
}
