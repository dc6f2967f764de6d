//! Application wiring
//!
//! Builds the scheduler, the mail ingestor and the supervisor from
//! [`Settings`] and a set of platform collaborators, and owns their
//! lifecycle.

use crate::adapters::{ChannelCodeSink, ChannelReportSink};
use crate::commands::Console;
use crate::config::{ApiSettings, Settings};
use std::sync::Arc;
use std::time::Duration;
use tierwatch_client::{
    AssetCache, ClientResult, DataSource, HttpDataSource, HttpTransport, KeyPool, ResilientClient,
};
use tierwatch_core::{ChatChannel, IconSource, MessageId, Renderer, Scheduler, SlotMap};
use tierwatch_mail::{IngestConfig, MailIngestor, MailboxConnector};
use tierwatch_runtime::{LogSink, ReportSink, Supervised};
use tierwatch_supervisor::Supervisor;

/// Platform bindings the daemon runs against
pub struct Collaborators {
    /// Ranking lookups
    pub source: Arc<dyn DataSource>,
    /// Icon downloads; cards are drawn without icons when absent
    pub icons: Option<Arc<dyn IconSource>>,
    /// Card and summary drawing
    pub renderer: Arc<dyn Renderer>,
    /// Player cards
    pub cards: Arc<dyn ChatChannel>,
    /// Summary board
    pub summary: Option<Arc<dyn ChatChannel>>,
    /// Hold commands
    pub holds: Option<Arc<dyn ChatChannel>>,
    /// Delivered codes
    pub codes: Option<Arc<dyn ChatChannel>>,
    /// Crash logs and watchdog reports
    pub logs: Option<Arc<dyn ChatChannel>>,
    /// Mailbox sessions
    pub mailbox: Option<Arc<dyn MailboxConnector>>,
}

/// HTTP-backed data source and icon cache sharing one key pool
pub fn http_source(api: &ApiSettings) -> ClientResult<(Arc<HttpDataSource>, Arc<AssetCache>)> {
    let transport = Arc::new(HttpTransport::with_timeout(Duration::from_secs(api.timeout_secs))?);
    let keys = Arc::new(KeyPool::new(api.keys.iter().map(String::as_str))?);
    let client = ResilientClient::new(transport, keys)
        .with_rotation_pause(Duration::from_millis(api.rotation_pause_ms));
    let icons = AssetCache::with_limits(
        client.clone(),
        api.icon_cache_capacity,
        Duration::from_secs(api.icon_ttl_secs),
    );
    let source = HttpDataSource::with_base_url(client, api.base_url.clone());
    Ok((Arc::new(source), Arc::new(icons)))
}

/// The running daemon
pub struct App {
    scheduler: Arc<Scheduler>,
    ingestor: Option<Arc<MailIngestor>>,
    supervisor: Arc<Supervisor>,
    sink: Arc<dyn ReportSink>,
    codes: Option<Arc<dyn ChatChannel>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("scheduler", &self.scheduler)
            .field("ingestor", &self.ingestor)
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Wire every component; nothing runs until [`App::start`]
    #[must_use]
    pub fn build(settings: &Settings, collaborators: Collaborators) -> Self {
        let sink: Arc<dyn ReportSink> = match &collaborators.logs {
            Some(channel) => Arc::new(ChannelReportSink::new(Arc::clone(channel))),
            None => Arc::new(LogSink),
        };

        let slots = Arc::new(SlotMap::new());
        for (entity_id, message) in settings.pinned_slots() {
            slots.set(&entity_id, message);
        }

        let mut builder = Scheduler::builder(
            settings.scheduler_config(),
            settings.entities(),
            collaborators.source,
            collaborators.renderer,
            collaborators.cards,
            Arc::clone(&sink),
        )
        .with_slots(slots);
        if let Some(icons) = collaborators.icons {
            builder = builder.with_icons(icons);
        }
        if let Some(summary) = collaborators.summary {
            let existing = settings.channels.summary_message.map(MessageId);
            builder = builder.with_summary_channel(summary, existing);
        }
        if let Some(holds) = collaborators.holds {
            builder = builder.with_hold_channel(holds);
        }
        let scheduler = builder.build();

        let codes = collaborators.codes;
        let ingestor = match (collaborators.mailbox, &codes) {
            (Some(connector), Some(channel)) => Some(MailIngestor::new(
                settings.ingest_config(),
                connector,
                Arc::new(ChannelCodeSink::new(Arc::clone(channel))),
                Arc::clone(&sink),
            )),
            (Some(connector), None) => {
                tracing::warn!("no code channel configured, mail ingestion disabled");
                Some(MailIngestor::new(
                    IngestConfig::disabled(),
                    connector,
                    Arc::new(LogCodes),
                    Arc::clone(&sink),
                ))
            }
            (None, _) => None,
        };

        let mut modules: Vec<Arc<dyn Supervised>> = vec![Arc::clone(&scheduler) as Arc<dyn Supervised>];
        if let Some(ingestor) = &ingestor {
            modules.push(Arc::clone(ingestor) as Arc<dyn Supervised>);
        }
        let supervisor = Supervisor::new(settings.supervisor_config(), modules, Arc::clone(&sink));

        Self {
            scheduler,
            ingestor,
            supervisor,
            sink,
            codes,
        }
    }

    /// Reconciliation scheduler
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Mail ingestor, if a mailbox is bound
    #[inline]
    #[must_use]
    pub fn ingestor(&self) -> Option<&Arc<MailIngestor>> {
        self.ingestor.as_ref()
    }

    /// Watchdog
    #[inline]
    #[must_use]
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Crash and report sink
    #[inline]
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn ReportSink> {
        &self.sink
    }

    /// Operator command facade
    #[must_use]
    pub fn console(&self) -> Console {
        let console = Console::new(
            Arc::clone(&self.scheduler),
            self.ingestor.clone(),
            Arc::clone(&self.supervisor),
        );
        match &self.codes {
            Some(channel) => console.with_code_channel(Arc::clone(channel)),
            None => console,
        }
    }

    /// Spawn every loop
    pub fn start(&self) {
        self.scheduler.start();
        if let Some(ingestor) = &self.ingestor {
            ingestor.start();
        }
        self.supervisor.start();
        tracing::info!(version = crate::VERSION, "tierwatch started");
    }

    /// Stop every loop and wait for them
    pub async fn shutdown(&self) {
        self.supervisor.stop().await;
        self.scheduler.stop().await;
        if let Some(ingestor) = &self.ingestor {
            ingestor.stop().await;
            ingestor.disconnect().await;
        }
        tracing::info!("tierwatch stopped");
    }
}

/// Code sink used when codes have nowhere to go
struct LogCodes;

#[async_trait::async_trait]
impl tierwatch_mail::CodeSink for LogCodes {
    async fn deliver(&self, code: &str) -> tierwatch_mail::MailResult<()> {
        tracing::info!(code, "code found, no channel to deliver it to");
        Ok(())
    }
}
