//! Publication slots: which message currently shows which card

use crate::model::MessageId;
use dashmap::DashMap;

/// Key of the aggregate summary slot
pub const SUMMARY_SLOT: &str = "__summary__";

/// Slot key → published message
#[derive(Debug, Default)]
pub struct SlotMap {
    slots: DashMap<String, MessageId>,
}

impl SlotMap {
    /// Empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Message currently published for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<MessageId> {
        self.slots.get(key).map(|id| *id)
    }

    /// Point `key` at `message`, returning the previous message
    pub fn set(&self, key: &str, message: MessageId) -> Option<MessageId> {
        self.slots.insert(key.to_string(), message)
    }

    /// Forget `key` once its message is confirmed gone
    pub fn invalidate(&self, key: &str) -> Option<MessageId> {
        self.slots.remove(key).map(|(_, id)| id)
    }

    /// Number of slots
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is known
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
