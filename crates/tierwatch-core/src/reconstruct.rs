//! State reconstruction from channel history
//!
//! Nothing is persisted locally. After every (re)start the cards already
//! published in the channel are read back: each card's hidden tag seeds the
//! change cache with a degraded baseline, and its message id becomes the
//! player's publication slot.

use crate::cache::ChangeCache;
use crate::channel::{ChatChannel, PublishError};
use crate::model::Entity;
use crate::slots::SlotMap;
use crate::tag::{card_name, DataTag, TagError};
use std::collections::HashSet;

/// Messages inspected on restore
pub const DEFAULT_HISTORY_WINDOW: usize = 30;

/// Outcome of a reconstruction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Players whose slot and baseline were restored
    pub restored: usize,
    /// Players configured
    pub entities: usize,
    /// Messages inspected
    pub scanned: usize,
    /// Messages carrying a tag that could not be decoded
    pub malformed: usize,
}

/// Rebuild slots and baselines from the last `window` channel messages
pub async fn reconstruct(
    channel: &dyn ChatChannel,
    window: usize,
    entities: &[Entity],
    cache: &ChangeCache,
    slots: &SlotMap,
) -> Result<RestoreReport, PublishError> {
    let history = channel.history(window).await?;
    let mut report = RestoreReport {
        entities: entities.len(),
        scanned: history.len(),
        ..RestoreReport::default()
    };
    let mut seen: HashSet<&str> = HashSet::new();

    for message in &history {
        let tag = match DataTag::decode(&message.content) {
            Ok(tag) => tag,
            Err(TagError::Missing) => continue,
            Err(e) => {
                tracing::warn!(message = %message.id, error = %e, "skipping card with unreadable tag");
                report.malformed += 1;
                continue;
            }
        };
        let Some(name) = card_name(&message.content) else {
            continue;
        };
        let Some(entity) = entities.iter().find(|e| e.is_named(name)) else {
            tracing::debug!(name, "card for unknown player ignored");
            continue;
        };
        // History is newest first; an older card for the same player is stale.
        if !seen.insert(entity.id.as_str()) {
            continue;
        }

        cache.restore(&entity.id, tag.to_fingerprint());
        slots.set(&entity.id, message.id);
        report.restored += 1;
        tracing::debug!(entity = %entity.name, message = %message.id, status = %tag.status, "restored card");
    }

    tracing::info!(
        restored = report.restored,
        entities = report.entities,
        scanned = report.scanned,
        "state reconstructed from channel history"
    );
    Ok(report)
}
