//! Idempotent edit-or-create publishing
//!
//! A slot is edited in place when it exists. Not-found means the message is
//! gone, so a fresh one is created. Any other edit failure deletes the old
//! message (best effort) before recreating it, so a slot never ends up
//! pointing at a stale card.

use crate::channel::{Attachment, ChatChannel, PublishError};
use crate::model::MessageId;
use crate::slots::SlotMap;
use std::sync::Arc;

/// How a publish reached its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Existing message was edited
    Edited,
    /// No slot existed, a message was created
    Created,
    /// The slot's message was gone or unusable and was replaced
    Recreated,
}

/// Successful publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Message now holding the content
    pub message: MessageId,
    /// How it got there
    pub mode: PublishMode,
}

/// Publishes content into slots of one channel
#[derive(Clone)]
pub struct Publisher {
    channel: Arc<dyn ChatChannel>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}

impl Publisher {
    /// Publisher over `channel`
    #[must_use]
    pub fn new(channel: Arc<dyn ChatChannel>) -> Self {
        Self { channel }
    }

    /// Target channel
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &Arc<dyn ChatChannel> {
        &self.channel
    }

    /// Publish `content` into the slot `key`, updating the slot on success
    pub async fn publish_to_slot(
        &self,
        slots: &SlotMap,
        key: &str,
        content: &str,
        attachment: Option<&Attachment>,
    ) -> Result<PublishReceipt, PublishError> {
        let Some(existing) = slots.get(key) else {
            let message = self.channel.create(content, attachment).await?;
            slots.set(key, message);
            tracing::debug!(slot = key, %message, "message created");
            return Ok(PublishReceipt {
                message,
                mode: PublishMode::Created,
            });
        };

        match self.channel.edit(existing, content, attachment).await {
            Ok(()) => Ok(PublishReceipt {
                message: existing,
                mode: PublishMode::Edited,
            }),
            Err(PublishError::NotFound(_)) => {
                tracing::info!(slot = key, message = %existing, "message gone, recreating");
                slots.invalidate(key);
                self.recreate(slots, key, content, attachment).await
            }
            Err(e) => {
                tracing::warn!(slot = key, message = %existing, error = %e, "edit failed, replacing message");
                if let Err(delete_err) = self.channel.delete(existing).await {
                    tracing::debug!(slot = key, error = %delete_err, "delete before recreate failed");
                }
                slots.invalidate(key);
                self.recreate(slots, key, content, attachment).await
            }
        }
    }

    async fn recreate(
        &self,
        slots: &SlotMap,
        key: &str,
        content: &str,
        attachment: Option<&Attachment>,
    ) -> Result<PublishReceipt, PublishError> {
        let message = self.channel.create(content, attachment).await?;
        slots.set(key, message);
        Ok(PublishReceipt {
            message,
            mode: PublishMode::Recreated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChannel;
    use chrono::Utc;

    fn publisher() -> (Publisher, Arc<FakeChannel>) {
        let channel = Arc::new(FakeChannel::default());
        (Publisher::new(channel.clone()), channel)
    }

    #[tokio::test]
    async fn creates_then_edits_in_place() {
        let (publisher, channel) = publisher();
        let slots = SlotMap::new();

        let first = publisher.publish_to_slot(&slots, "a", "v1", None).await.unwrap();
        assert_eq!(first.mode, PublishMode::Created);

        let second = publisher.publish_to_slot(&slots, "a", "v2", None).await.unwrap();
        assert_eq!(second.mode, PublishMode::Edited);
        assert_eq!(second.message, first.message);
        assert_eq!(channel.content(first.message).as_deref(), Some("v2"));
        assert_eq!(channel.len(), 1);
    }

    #[tokio::test]
    async fn deleted_message_is_recreated() {
        let (publisher, channel) = publisher();
        let slots = SlotMap::new();
        slots.set("a", MessageId(99));

        let receipt = publisher.publish_to_slot(&slots, "a", "v1", None).await.unwrap();
        assert_eq!(receipt.mode, PublishMode::Recreated);
        assert_eq!(slots.get("a"), Some(receipt.message));
        assert_eq!(channel.creates(), 1);
    }

    #[tokio::test]
    async fn unusable_message_is_replaced() {
        let (publisher, channel) = publisher();
        let slots = SlotMap::new();
        let old = channel.seed("stale", Utc::now());
        slots.set("a", old);
        channel.fail_next_edit(PublishError::Forbidden("attachment".into()));

        let receipt = publisher.publish_to_slot(&slots, "a", "fresh", None).await.unwrap();
        assert_eq!(receipt.mode, PublishMode::Recreated);
        assert_ne!(receipt.message, old);
        assert!(channel.content(old).is_none());
        assert_eq!(channel.len(), 1);
    }

    #[tokio::test]
    async fn failed_create_leaves_slot_empty() {
        let (publisher, channel) = publisher();
        let slots = SlotMap::new();
        channel.fail_creates(true);

        assert!(publisher.publish_to_slot(&slots, "a", "v1", None).await.is_err());
        assert!(slots.get("a").is_none());
    }
}
