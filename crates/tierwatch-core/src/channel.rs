//! Chat channel boundary
//!
//! The chat platform binding lives outside this crate; it is reached only
//! through [`ChatChannel`].

use crate::model::MessageId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Image attached to a published message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown by the platform
    pub filename: String,
    /// Encoded image
    pub bytes: Arc<[u8]>,
}

impl Attachment {
    /// PNG attachment
    #[must_use]
    pub fn png(filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// A message read back from channel history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    /// Platform identifier
    pub id: MessageId,
    /// Text body
    pub content: String,
    /// Creation time
    pub posted_at: DateTime<Utc>,
}

/// Failure of a channel operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// The message no longer exists
    #[error("message {0} not found")]
    NotFound(MessageId),

    /// Missing permission on the channel
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Platform throttled the request
    #[error("rate limited by platform")]
    RateLimited,

    /// Any other platform failure
    #[error("platform error: {0}")]
    Platform(String),
}

impl PublishError {
    /// Whether the target message is confirmed gone
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Message primitives of one chat channel
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Most recent `limit` messages, newest first
    async fn history(&self, limit: usize) -> Result<Vec<ChannelMessage>, PublishError>;

    /// Post a new message
    async fn create(
        &self,
        content: &str,
        attachment: Option<&Attachment>,
    ) -> Result<MessageId, PublishError>;

    /// Replace the content and attachment of an existing message
    async fn edit(
        &self,
        id: MessageId,
        content: &str,
        attachment: Option<&Attachment>,
    ) -> Result<(), PublishError>;

    /// Delete a message
    async fn delete(&self, id: MessageId) -> Result<(), PublishError>;
}
