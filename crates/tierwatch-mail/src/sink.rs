//! Code delivery boundary

use crate::error::MailResult;
use async_trait::async_trait;

/// Receives newly found codes
#[async_trait]
pub trait CodeSink: Send + Sync {
    /// Publish one code
    async fn deliver(&self, code: &str) -> MailResult<()>;
}
