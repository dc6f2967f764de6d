//! Chat-channel backed sinks
//!
//! Crash logs, watchdog reports and sign-in codes all end up as messages in
//! configured channels.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tierwatch_core::{Attachment, ChatChannel};
use tierwatch_mail::{CodeSink, MailError, MailResult};
use tierwatch_runtime::{ReportSink, WatchdogReport};

/// Crash text longer than this is truncated in the message body
pub const CRASH_INLINE_LIMIT: usize = 1800;

/// Characters kept from the end of a truncated crash text
pub const CRASH_TAIL: usize = 1750;

/// Posts codes to a channel
pub struct ChannelCodeSink {
    channel: Arc<dyn ChatChannel>,
}

impl ChannelCodeSink {
    /// Sink posting to `channel`
    #[must_use]
    pub fn new(channel: Arc<dyn ChatChannel>) -> Self {
        Self { channel }
    }
}

/// Body of a code message
#[must_use]
pub fn code_message(code: &str) -> String {
    format!("🔐 **New sign-in code**\n🔢 **Authentication Code:** `{code}`")
}

#[async_trait]
impl CodeSink for ChannelCodeSink {
    async fn deliver(&self, code: &str) -> MailResult<()> {
        self.channel
            .create(&code_message(code), None)
            .await
            .map(|_| ())
            .map_err(|e| MailError::Delivery(e.to_string()))
    }
}

/// Posts crash logs and watchdog reports to a log channel
pub struct ChannelReportSink {
    channel: Arc<dyn ChatChannel>,
    latency: Mutex<Option<Duration>>,
}

impl ChannelReportSink {
    /// Sink posting to `channel`
    #[must_use]
    pub fn new(channel: Arc<dyn ChatChannel>) -> Self {
        Self {
            channel,
            latency: Mutex::new(None),
        }
    }

    /// Store the platform's latest round-trip measurement
    pub fn record_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }
}

/// Crash message body and, when truncated, the full text as an attachment
#[must_use]
pub fn crash_message(source: &str, error: &str) -> (String, Option<Attachment>) {
    let chars = error.chars().count();
    if chars <= CRASH_INLINE_LIMIT {
        return (format!("💥 **Crash in {source}**\n```\n{error}\n```"), None);
    }
    let tail: String = error.chars().skip(chars - CRASH_TAIL).collect();
    let body = format!("💥 **Crash in {source}** (truncated, full log attached)\n```\n...{tail}\n```");
    let attachment = Attachment {
        filename: "crash_log_full.txt".to_string(),
        bytes: Arc::from(error.as_bytes()),
    };
    (body, Some(attachment))
}

#[async_trait]
impl ReportSink for ChannelReportSink {
    async fn crash(&self, source: &str, error: &str) {
        let (body, attachment) = crash_message(source, error);
        if let Err(e) = self.channel.create(&body, attachment.as_ref()).await {
            tracing::error!(source, error = %e, "crash report not delivered");
        }
    }

    async fn watchdog(&self, report: &WatchdogReport) {
        let body = format!("🛡️ **Watchdog**\n```\n{report}\n```");
        if let Err(e) = self.channel.create(&body, None).await {
            tracing::error!(error = %e, "watchdog report not delivered");
        }
    }

    async fn latency(&self) -> Option<Duration> {
        *self.latency.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierwatch_test_utils::MemoryChannel;

    #[test]
    fn long_crash_keeps_the_tail_inline() {
        let error = format!("{}END", "x".repeat(2000));
        let (body, attachment) = crash_message("scheduler", &error);
        assert!(body.contains("...x"));
        assert!(body.ends_with("END\n```"));
        assert_eq!(attachment.unwrap().bytes.len(), 2003);

        let (body, attachment) = crash_message("mail", "boom");
        assert!(body.contains("boom"));
        assert!(attachment.is_none());
    }

    #[tokio::test]
    async fn codes_are_posted() {
        let channel = MemoryChannel::new();
        let sink = ChannelCodeSink::new(channel.clone());
        sink.deliver("482913").await.unwrap();
        assert!(channel.messages()[0].content.contains("`482913`"));

        channel.set_unavailable(true);
        assert!(matches!(sink.deliver("1").await, Err(MailError::Delivery(_))));
    }
}
