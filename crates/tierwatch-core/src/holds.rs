//! Temporary holds posted by moderators
//!
//! A hold is a channel message `<Name#TAG> ban <N>h`. It is active while
//! `posted_at + N hours` lies in the future; expired hold messages are
//! removed from the channel while scanning. When several holds name the same
//! entity, the one ending last wins.

use crate::channel::ChatChannel;
use crate::model::{Entity, MessageId};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::Arc;

/// Messages inspected per scan
pub const DEFAULT_HOLD_WINDOW: usize = 50;

static HOLD_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"^(.+?#\w+)\s+ban\s+(\d+)h")
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|e| unreachable!("hold regex: {e}"))
});

/// A parsed hold command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldRequest {
    /// Target `Name#TAG`
    pub target: String,
    /// Duration in hours
    pub hours: i64,
}

/// Parse a hold command from a message body
#[must_use]
pub fn parse_hold(content: &str) -> Option<HoldRequest> {
    let caps = HOLD_RE.captures(content.trim_start())?;
    let target = caps.get(1)?.as_str().trim().to_string();
    let hours = caps.get(2)?.as_str().parse().ok()?;
    Some(HoldRequest { target, hours })
}

/// Operator-facing label of a hold with `remaining` time left
#[must_use]
pub fn hold_label(remaining: Duration) -> String {
    let minutes = remaining.num_minutes().max(0);
    format!("⛔ BANNED {}h {}m", minutes / 60, minutes % 60)
}

/// Active holds at scan time, keyed by entity id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoldSnapshot {
    labels: HashMap<String, String>,
    /// Expired hold messages removed during the scan
    pub removed: usize,
}

impl HoldSnapshot {
    /// Hold label of an entity
    #[must_use]
    pub fn label(&self, entity_id: &str) -> Option<&str> {
        self.labels.get(entity_id).map(String::as_str)
    }

    /// Number of active holds
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no hold is active
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Scans a channel for hold commands
#[derive(Clone)]
pub struct HoldScanner {
    channel: Arc<dyn ChatChannel>,
    window: usize,
}

impl std::fmt::Debug for HoldScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoldScanner")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl HoldScanner {
    /// Scanner over `channel` with [`DEFAULT_HOLD_WINDOW`]
    #[must_use]
    pub fn new(channel: Arc<dyn ChatChannel>) -> Self {
        Self {
            channel,
            window: DEFAULT_HOLD_WINDOW,
        }
    }

    /// Override the number of messages inspected
    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Collect active holds and delete expired ones
    ///
    /// A failed history read yields an empty snapshot; holds are advisory.
    pub async fn scan(&self, entities: &[Entity], now: DateTime<Utc>) -> HoldSnapshot {
        let history = match self.channel.history(self.window).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(error = %e, "hold scan failed, continuing without holds");
                return HoldSnapshot::default();
            }
        };

        let mut snapshot = HoldSnapshot::default();
        let mut longest: HashMap<String, Duration> = HashMap::new();
        let mut expired: Vec<MessageId> = Vec::new();

        for message in history {
            let Some(request) = parse_hold(&message.content) else {
                continue;
            };
            let Some(entity) = entities.iter().find(|e| e.is_named(&request.target)) else {
                continue;
            };

            let remaining = message.posted_at + Duration::hours(request.hours) - now;
            if remaining > Duration::zero() {
                // The hold ending last wins, whatever order it was posted in.
                let entry = longest.entry(entity.id.clone()).or_insert(remaining);
                *entry = (*entry).max(remaining);
            } else {
                tracing::info!(entity = %entity.name, "hold expired, removing message");
                expired.push(message.id);
            }
        }

        snapshot.labels = longest
            .into_iter()
            .map(|(id, remaining)| (id, hold_label(remaining)))
            .collect();

        for id in expired {
            match self.channel.delete(id).await {
                Ok(()) => snapshot.removed += 1,
                Err(e) => tracing::warn!(message = %id, error = %e, "expired hold not removed"),
            }
        }

        if !snapshot.is_empty() {
            tracing::info!(active = snapshot.len(), "holds active");
        }
        snapshot
    }
}
