//! Mailbox polling loop
//!
//! The connection lives in an async mutex, so at most one check runs at a
//! time. A check takes the session out of the mutex, hands it to the
//! blocking pool for every call, and only puts it back when the whole check
//! succeeded. Any early return therefore leaves the ingestor disconnected and
//! the next check reconnects.

use crate::classify::{Classifier, Verdict};
use crate::error::{MailError, MailResult};
use crate::extract::CodeExtractor;
use crate::history::CodeHistory;
use crate::mailbox::{MailMessage, Mailbox, MailboxConnector};
use crate::sink::CodeSink;
use chrono::{DateTime, Local, Utc};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tierwatch_runtime::{
    run_resilient, Heartbeat, ReportSink, Stall, Supervised, TaskHandle, TaskStatus,
    DEFAULT_COOLDOWN,
};
use tokio::sync::Mutex;

/// Module name used in reports
pub const MAIL_NAME: &str = "mail";

/// Most recent messages inspected per check
pub const DEFAULT_WINDOW: usize = 15;

/// Older messages are ignored
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(15 * 60);

/// Pause between checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Ingestion tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Whether the loop runs at all
    pub enabled: bool,
    /// Most recent messages inspected per check
    pub window: usize,
    /// Maximum message age
    pub max_age: Duration,
    /// Pause between checks
    pub poll_interval: Duration,
    /// Sleep after a crash before the loop resumes
    pub cooldown: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: DEFAULT_WINDOW,
            max_age: DEFAULT_MAX_AGE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl IngestConfig {
    /// Disabled configuration, used when no credentials are configured
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// A code found in one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundCode {
    /// Message the code came from
    pub uid: u32,
    /// Six-digit code
    pub code: String,
}

/// What happened to the code of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the sink for the first time
    Delivered(String),
    /// Delivered before, dropped
    Duplicate(String),
    /// Refused by the sink; it stays eligible
    Failed(String),
}

impl Delivery {
    /// The code concerned
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Delivered(code) | Self::Duplicate(code) | Self::Failed(code) => code,
        }
    }
}

/// Polls a mailbox and delivers new one-time codes
pub struct MailIngestor {
    me: Weak<MailIngestor>,
    config: IngestConfig,
    connector: Arc<dyn MailboxConnector>,
    connection: Mutex<Option<Box<dyn Mailbox>>>,
    classifier: Classifier,
    extractor: CodeExtractor,
    history: Arc<CodeHistory>,
    codes: Arc<dyn CodeSink>,
    sink: Arc<dyn ReportSink>,
    heartbeat: Heartbeat,
    task: TaskHandle,
}

impl std::fmt::Debug for MailIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailIngestor")
            .field("config", &self.config)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl MailIngestor {
    /// Build an ingestor with the default classifier and extractor
    #[must_use]
    pub fn new(
        config: IngestConfig,
        connector: Arc<dyn MailboxConnector>,
        codes: Arc<dyn CodeSink>,
        sink: Arc<dyn ReportSink>,
    ) -> Arc<Self> {
        Self::with_parts(
            config,
            connector,
            Classifier::default(),
            CodeExtractor::default(),
            Arc::new(CodeHistory::new()),
            codes,
            sink,
        )
    }

    /// Build an ingestor from explicit parts
    #[must_use]
    pub fn with_parts(
        config: IngestConfig,
        connector: Arc<dyn MailboxConnector>,
        classifier: Classifier,
        extractor: CodeExtractor,
        history: Arc<CodeHistory>,
        codes: Arc<dyn CodeSink>,
        sink: Arc<dyn ReportSink>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            connector,
            connection: Mutex::new(None),
            classifier,
            extractor,
            history,
            codes,
            sink,
            heartbeat: Heartbeat::new(),
            task: TaskHandle::new(MAIL_NAME),
        })
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Delivered-code history
    #[inline]
    #[must_use]
    pub fn history(&self) -> &Arc<CodeHistory> {
        &self.history
    }

    /// Liveness of the polling loop
    #[inline]
    #[must_use]
    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    /// Whether a session is currently held
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Spawn the polling loop, replacing a running one
    pub fn start(&self) {
        if !self.config.enabled {
            tracing::info!("mail ingestion disabled");
            return;
        }
        let weak = self.me.clone();
        let sink = Arc::clone(&self.sink);
        self.task.spawn(run_resilient(MAIL_NAME, self.config.cooldown, sink, move || {
            run_loop(weak.clone())
        }));
    }

    /// Cancel the loop and wait until it is gone
    pub async fn stop(&self) -> TaskStatus {
        self.task.shutdown().await
    }

    /// Run one check and deliver its code, for operator use
    pub async fn check_now(&self) -> MailResult<Option<Delivery>> {
        match self.check_once().await? {
            Some(found) => Ok(Some(self.deliver(&found).await)),
            None => Ok(None),
        }
    }

    /// Find the newest code among the most recent messages of today
    ///
    /// Messages are inspected newest first and the check stops at the first
    /// relevant code, so an older code it supersedes is never returned.
    /// Messages that fail to decode are skipped; a transport failure drops
    /// the session and ends the check.
    pub async fn check_once(&self) -> MailResult<Option<FoundCode>> {
        let mut connection = self.connection.lock().await;
        let mailbox = match connection.take() {
            Some(mailbox) => mailbox,
            None => self.connect().await?,
        };

        let since = Local::now().date_naive();
        let (mut mailbox, searched) = on_blocking(mailbox, move |m| m.search_since(since)).await?;
        let mut uids = match searched {
            Ok(uids) => uids,
            Err(e) => {
                tracing::error!(error = %e, "mailbox search failed, dropping connection");
                logout(mailbox).await;
                return Err(e);
            }
        };
        uids.sort_unstable();
        let recent: Vec<u32> = uids.into_iter().rev().take(self.config.window).collect();
        tracing::debug!(since = %since, inspected = recent.len(), "mailbox searched");

        let now = Utc::now();
        let mut found = None;
        for uid in recent {
            let (returned, fetched) = on_blocking(mailbox, move |m| m.fetch(uid)).await?;
            mailbox = returned;
            let message = match fetched {
                Ok(message) => message,
                Err(e) if e.is_connection_lost() => {
                    tracing::error!(uid, error = %e, "connection lost during fetch");
                    logout(mailbox).await;
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(uid, error = %e, "skipping unreadable message");
                    continue;
                }
            };
            if let Some(code) = self.inspect(&message, now) {
                found = Some(FoundCode { uid, code });
                break;
            }
        }

        *connection = Some(mailbox);
        Ok(found)
    }

    /// Code carried by `message`, if it is recent and relevant
    fn inspect(&self, message: &MailMessage, now: DateTime<Utc>) -> Option<String> {
        let age = now - message.date;
        let max_age = chrono::Duration::from_std(self.config.max_age).unwrap_or(chrono::Duration::MAX);
        if age > max_age {
            tracing::debug!(uid = message.uid, age_mins = age.num_minutes(), "message too old");
            return None;
        }

        match self.classifier.classify(&message.classification_text()) {
            Verdict::Relevant => {}
            Verdict::UnknownSender => return None,
            Verdict::Excluded(pattern) => {
                tracing::info!(uid = message.uid, pattern, "automated relay ignored");
                return None;
            }
        }

        let code = self.extractor.extract_from(&message.body, &message.subject);
        if let Some(code) = &code {
            tracing::info!(uid = message.uid, code, "code found");
        }
        code
    }

    /// Deliver a code not seen before
    ///
    /// The code is recorded before it is handed to the sink and forgotten
    /// again if the sink refuses it, so a concurrent check never delivers it
    /// twice.
    pub async fn deliver(&self, found: &FoundCode) -> Delivery {
        let FoundCode { uid, code } = found;
        if !self.history.record(code) {
            tracing::debug!(uid, code, "code already delivered");
            return Delivery::Duplicate(code.clone());
        }
        match self.codes.deliver(code).await {
            Ok(()) => {
                tracing::info!(uid, code, "new code delivered");
                Delivery::Delivered(code.clone())
            }
            Err(e) => {
                tracing::error!(uid, code, error = %e, "code delivery failed");
                self.history.forget(code);
                Delivery::Failed(code.clone())
            }
        }
    }

    /// Drop the session, if any
    pub async fn disconnect(&self) {
        if let Some(mailbox) = self.connection.lock().await.take() {
            logout(mailbox).await;
        }
    }

    async fn connect(&self) -> MailResult<Box<dyn Mailbox>> {
        let connector = Arc::clone(&self.connector);
        let mailbox = tokio::task::spawn_blocking(move || connector.connect())
            .await
            .map_err(|e| MailError::Worker(e.to_string()))??;
        tracing::info!("mailbox connected");
        Ok(mailbox)
    }
}

/// Run `call` against `mailbox` on the blocking pool and hand the session back
///
/// The outer error means the worker died and the session is lost.
async fn on_blocking<T, F>(
    mut mailbox: Box<dyn Mailbox>,
    call: F,
) -> MailResult<(Box<dyn Mailbox>, MailResult<T>)>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn Mailbox) -> MailResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = call(mailbox.as_mut());
        (mailbox, result)
    })
    .await
    .map_err(|e| MailError::Worker(e.to_string()))
}

/// Best-effort logout
async fn logout(mailbox: Box<dyn Mailbox>) {
    match on_blocking(mailbox, |m| m.logout()).await {
        Ok((_, Ok(()))) => tracing::debug!("mailbox logged out"),
        Ok((_, Err(e))) | Err(e) => tracing::debug!(error = %e, "logout failed"),
    }
}

async fn run_loop(weak: Weak<MailIngestor>) -> MailResult<()> {
    loop {
        let Some(ingestor) = weak.upgrade() else {
            return Ok(());
        };
        ingestor.heartbeat.beat();

        match ingestor.check_once().await {
            Ok(Some(found)) => {
                ingestor.deliver(&found).await;
            }
            Ok(None) => {}
            Err(e) if e.is_connection_lost() => {
                tracing::warn!(error = %e, "mail check failed, reconnecting next poll");
            }
            Err(e) => return Err(e),
        }

        let poll = ingestor.config.poll_interval;
        drop(ingestor);
        tokio::time::sleep(poll).await;
    }
}

impl Supervised for MailIngestor {
    fn name(&self) -> &'static str {
        MAIL_NAME
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn status(&self) -> TaskStatus {
        self.task.status()
    }

    fn stall(&self, now: DateTime<Utc>) -> Option<Stall> {
        self.heartbeat.age(now).map(Stall::silent)
    }

    fn detail(&self, now: DateTime<Utc>) -> String {
        match self.heartbeat.age(now) {
            Some(age) => format!("last check {}s ago", age.num_seconds()),
            None => "no check yet".to_string(),
        }
    }

    fn restart(&self) {
        self.start();
    }

    fn force_restart(&self, now: DateTime<Utc>) {
        self.task.cancel();
        if let Ok(mut connection) = self.connection.try_lock() {
            *connection = None;
        }
        self.heartbeat.beat_at(now);
        self.start();
    }
}
