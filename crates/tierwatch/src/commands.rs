//! Operator commands
//!
//! Every command returns the text shown to the operator and never fails;
//! errors are folded into the reply.

use chrono::Utc;
use std::fmt::Write as _;
use std::sync::Arc;
use tierwatch_core::{ChatChannel, CycleOutcome, Scheduler};
use tierwatch_mail::{Delivery, MailIngestor};
use tierwatch_runtime::Supervised;
use tierwatch_supervisor::Supervisor;

/// Posted to the code channel when a manual check finds nothing
pub const NO_CODE_NOTICE: &str = "🚫 **No valid code found**\nNo recent sign-in mail carried a usable code.";

/// Command facade over the running loops
pub struct Console {
    scheduler: Arc<Scheduler>,
    ingestor: Option<Arc<MailIngestor>>,
    supervisor: Arc<Supervisor>,
    codes: Option<Arc<dyn ChatChannel>>,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("mail", &self.ingestor.is_some())
            .finish_non_exhaustive()
    }
}

impl Console {
    /// Console over the given loops
    #[must_use]
    pub fn new(
        scheduler: Arc<Scheduler>,
        ingestor: Option<Arc<MailIngestor>>,
        supervisor: Arc<Supervisor>,
    ) -> Self {
        Self {
            scheduler,
            ingestor,
            supervisor,
            codes: None,
        }
    }

    /// Post "no code" notices to `channel`
    #[must_use]
    pub fn with_code_channel(mut self, channel: Arc<dyn ChatChannel>) -> Self {
        self.codes = Some(channel);
        self
    }

    /// Run a reconciliation cycle now and restart the timer
    pub async fn force_update(&self) -> String {
        if self.scheduler.is_cycle_running() {
            return "⚠️ Update already in progress, please wait...".to_string();
        }
        match self.scheduler.run_cycle_now().await {
            CycleOutcome::Completed(report) => format!("✅ Forced update completed: {report}"),
            CycleOutcome::Skipped => "⚠️ Update already in progress, please wait...".to_string(),
        }
    }

    /// Run a supervision check and return its report
    pub async fn force_watchdog(&self) -> String {
        self.supervisor.check_now().await.to_string()
    }

    /// Check the mailbox once and deliver what it finds
    pub async fn fast_code(&self) -> String {
        let Some(ingestor) = &self.ingestor else {
            return "❌ Mail ingestion is not configured.".to_string();
        };

        let found = match ingestor.check_once().await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(error = %e, "manual mail check failed");
                return format!("❌ Error: {e}");
            }
        };
        let Some(found) = found else {
            if let Some(channel) = &self.codes {
                if let Err(e) = channel.create(NO_CODE_NOTICE, None).await {
                    tracing::warn!(error = %e, "no-code notice not posted");
                }
            }
            return "❌ No valid code found. Channel has been notified.".to_string();
        };

        match ingestor.deliver(&found).await {
            Delivery::Delivered(code) => format!("✅ Found and sent! Code: `{code}`"),
            Delivery::Duplicate(code) => format!("⚠️ Code found `{code}`, but already sent."),
            Delivery::Failed(code) => format!("❌ Code `{code}` found but could not be delivered."),
        }
    }

    /// Cancel every loop, drop the mail session and start everything again
    pub async fn restart(&self) -> String {
        self.supervisor.stop().await;
        self.scheduler.stop().await;
        if let Some(ingestor) = &self.ingestor {
            ingestor.stop().await;
            ingestor.disconnect().await;
            ingestor.heartbeat().reset();
        }

        self.scheduler.start();
        if let Some(ingestor) = &self.ingestor {
            ingestor.start();
        }
        self.supervisor.start();
        tracing::warn!("background tasks restarted by operator");
        "✅ Background tasks restarted".to_string()
    }

    /// Snapshot of every loop
    pub async fn status(&self) -> String {
        let now = Utc::now();
        let mut out = String::new();

        let update = if self.scheduler.is_cycle_running() {
            "in progress"
        } else {
            "idle"
        };
        let _ = writeln!(out, "Update: {update}");
        let next = match self.scheduler.next_run() {
            Some(next) if next > now => format!("in {}m", (next - now).num_minutes()),
            Some(next) => format!("overdue by {}s", (now - next).num_seconds()),
            None => "not scheduled".to_string(),
        };
        let _ = writeln!(out, "Next update: {next}");
        let _ = writeln!(out, "Cards tracked: {}", self.scheduler.slots().len());

        match &self.ingestor {
            Some(ingestor) => {
                let connected = if ingestor.is_connected().await { "connected" } else { "disconnected" };
                let _ = writeln!(out, "Mail: {connected}, {}", ingestor.detail(now));
                let _ = writeln!(out, "Codes delivered: {}", ingestor.history().len());
            }
            None => {
                let _ = writeln!(out, "Mail: not configured");
            }
        }

        let _ = writeln!(out, "Tasks:");
        let _ = writeln!(out, "  {}: {}", self.scheduler.name(), self.scheduler.task_status());
        if let Some(ingestor) = &self.ingestor {
            let _ = writeln!(out, "  {}: {}", ingestor.name(), ingestor.status());
        }
        let _ = write!(out, "  supervisor: {}", self.supervisor.status());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{App, Collaborators};
    use crate::config::Settings;
    use tierwatch_mail::MailboxConnector;
    use tierwatch_test_utils::{
        code_mail, standing, MemoryChannel, MemoryMailServer, ScriptedSource, StubRenderer,
    };

    const SETTINGS: &str = r#"
        [api]
        keys = ["k1"]

        [[entities]]
        id = "puuid-0"
        name = "Alice#EUW"
        region = "eu"

        [scheduler]
        entity_delay_secs = 0
        jitter_secs = 0

        [mail]
        address = "bot@example.com"
        password = "secret"

        [channels]
        cards = 1
        codes = 2
    "#;

    struct Fixture {
        app: App,
        cards: Arc<MemoryChannel>,
        codes: Arc<MemoryChannel>,
        mail: Arc<MemoryMailServer>,
    }

    fn fixture() -> Fixture {
        let settings = Settings::from_toml_str(SETTINGS).unwrap();
        let source = ScriptedSource::new();
        source.set_standing("puuid-0", Ok(Some(standing("Gold 2", 13, 40))));
        let cards = MemoryChannel::new();
        let codes = MemoryChannel::new();
        let mail = MemoryMailServer::new();
        let app = App::build(
            &settings,
            Collaborators {
                source,
                icons: None,
                renderer: StubRenderer::new(),
                cards: cards.clone(),
                summary: None,
                holds: None,
                codes: Some(codes.clone() as Arc<dyn ChatChannel>),
                logs: None,
                mailbox: Some(mail.connector() as Arc<dyn MailboxConnector>),
            },
        );
        Fixture { app, cards, codes, mail }
    }

    #[tokio::test]
    async fn force_update_publishes_and_arms_timer() {
        let f = fixture();
        let reply = f.app.console().force_update().await;
        assert!(reply.starts_with("✅"), "{reply}");
        assert_eq!(f.cards.creates(), 1);

        let again = f.app.console().force_update().await;
        assert!(again.starts_with("✅"));
        assert_eq!(f.cards.creates(), 1);
        assert_eq!(f.cards.edits(), 0);
        f.app.shutdown().await;
    }

    #[tokio::test]
    async fn fast_code_delivers_then_reports_duplicate() {
        let f = fixture();
        f.mail.deliver(code_mail(1, 1, "482913"));
        let console = f.app.console();

        assert_eq!(console.fast_code().await, "✅ Found and sent! Code: `482913`");
        assert_eq!(f.codes.len(), 1);
        assert_eq!(console.fast_code().await, "⚠️ Code found `482913`, but already sent.");
        assert_eq!(f.codes.len(), 1);
    }

    #[tokio::test]
    async fn fast_code_sends_only_newest_code() {
        let f = fixture();
        f.mail.deliver(code_mail(1, 6, "111111"));
        f.mail.deliver(code_mail(2, 1, "222222"));

        let reply = f.app.console().fast_code().await;
        assert_eq!(reply, "✅ Found and sent! Code: `222222`");
        assert_eq!(f.codes.len(), 1);
        assert!(f.codes.messages()[0].content.contains("222222"));
    }

    #[tokio::test]
    async fn fast_code_without_mail_notifies_channel() {
        let f = fixture();
        let reply = f.app.console().fast_code().await;
        assert!(reply.contains("Channel has been notified"));
        assert_eq!(f.codes.messages()[0].content, NO_CODE_NOTICE);
    }

    #[tokio::test]
    async fn status_lists_every_task() {
        let f = fixture();
        let status = f.app.console().status().await;
        assert!(status.contains("Update: idle"));
        assert!(status.contains("Mail: disconnected"));
        assert!(status.contains("scheduler: never started"));
        assert!(status.contains("mail: never started"));
        assert!(status.contains("supervisor: never started"));
    }

    #[tokio::test]
    async fn restart_resets_mail_session() {
        let f = fixture();
        let console = f.app.console();
        console.fast_code().await;
        assert!(f.app.ingestor().unwrap().is_connected().await);

        assert_eq!(console.restart().await, "✅ Background tasks restarted");
        assert_eq!(f.mail.logouts(), 1);
        assert!(f.app.scheduler().task_status().is_alive());
        f.app.shutdown().await;
    }
}
