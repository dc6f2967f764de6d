//! Reconciliation scheduler
//!
//! Every cycle walks the configured players in order, observes their
//! upstream state, and republishes a card only when the change cache says
//! the state moved. The loop:
//! 1. rebuilds slots and baselines from channel history
//! 2. runs a cycle, unless the loop was restarted by a timer reset
//! 3. arms `next_run = now + interval` and sleeps the interval shifted by jitter
//! 4. runs a cycle and goes back to 3
//!
//! Any error or panic inside the loop is caught by the runtime boundary,
//! reported, and the loop resumes after a cool-down.

pub mod config;
pub mod guard;
pub mod report;

pub use config::{JitterPolicy, SchedulerConfig};
pub use guard::CycleGuard;
pub use report::{CycleOutcome, CycleReport, EntityOutcome};

use crate::cache::ChangeCache;
use crate::channel::{Attachment, ChatChannel};
use crate::error::SchedulerError;
use crate::holds::{HoldScanner, HoldSnapshot};
use crate::model::{Entity, Fingerprint, MessageId, Observation, Reading, UNKNOWN_AGENT};
use crate::publish::Publisher;
use crate::reconstruct::{reconstruct, RestoreReport};
use crate::render::{
    render_card_offloaded, render_summary_offloaded, summary_rows, CardAssets, CardRequest,
    IconSource, NoIcons, Renderer,
};
use crate::slots::{SlotMap, SUMMARY_SLOT};
use crate::tag::card_body;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tierwatch_client::{Activity, DataSource};
use tierwatch_runtime::{run_resilient, ReportSink, Stall, Supervised, TaskHandle, TaskStatus};

/// Module name used in reports
pub const SCHEDULER_NAME: &str = "scheduler";

const SUMMARY_CONTENT: &str = "🏆 **Leaderboard**";

/// Assembles a [`Scheduler`]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    entities: Vec<Entity>,
    source: Arc<dyn DataSource>,
    renderer: Arc<dyn Renderer>,
    cards: Arc<dyn ChatChannel>,
    sink: Arc<dyn ReportSink>,
    icons: Arc<dyn IconSource>,
    summary: Option<(Arc<dyn ChatChannel>, Option<MessageId>)>,
    holds: Option<Arc<dyn ChatChannel>>,
    cache: Arc<ChangeCache>,
    slots: Arc<SlotMap>,
}

impl SchedulerBuilder {
    /// Fetch card icons through `icons`
    #[must_use]
    pub fn with_icons(mut self, icons: Arc<dyn IconSource>) -> Self {
        self.icons = icons;
        self
    }

    /// Publish the summary board to `channel`, reusing `existing` if known
    #[must_use]
    pub fn with_summary_channel(
        mut self,
        channel: Arc<dyn ChatChannel>,
        existing: Option<MessageId>,
    ) -> Self {
        self.summary = Some((channel, existing));
        self
    }

    /// Scan `channel` for hold commands each cycle
    #[must_use]
    pub fn with_hold_channel(mut self, channel: Arc<dyn ChatChannel>) -> Self {
        self.holds = Some(channel);
        self
    }

    /// Share an existing change cache
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ChangeCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Share an existing slot map
    #[must_use]
    pub fn with_slots(mut self, slots: Arc<SlotMap>) -> Self {
        self.slots = slots;
        self
    }

    /// Build the scheduler; nothing runs until [`Scheduler::start`]
    #[must_use]
    pub fn build(self) -> Arc<Scheduler> {
        let hold_window = self.config.hold_window;
        let summary_slot = SlotMap::new();
        let summary = self.summary.map(|(channel, existing)| {
            if let Some(id) = existing {
                summary_slot.set(SUMMARY_SLOT, id);
            }
            Publisher::new(channel)
        });

        Arc::new_cyclic(|me| Scheduler {
            me: me.clone(),
            config: self.config,
            entities: self.entities,
            source: self.source,
            icons: self.icons,
            renderer: self.renderer,
            cards: Publisher::new(self.cards),
            summary,
            summary_slot,
            holds: self
                .holds
                .map(|channel| HoldScanner::new(channel).with_window(hold_window)),
            cache: self.cache,
            slots: self.slots,
            sink: self.sink,
            guard: CycleGuard::new(),
            skip_initial: AtomicBool::new(false),
            next_run: Mutex::new(None),
            task: TaskHandle::new(SCHEDULER_NAME),
            last_cycle: Mutex::new(None),
            last_restore: Mutex::new(None),
        })
    }
}

/// Periodic, change-detected publisher of player cards
pub struct Scheduler {
    me: Weak<Scheduler>,
    config: SchedulerConfig,
    entities: Vec<Entity>,
    source: Arc<dyn DataSource>,
    icons: Arc<dyn IconSource>,
    renderer: Arc<dyn Renderer>,
    cards: Publisher,
    summary: Option<Publisher>,
    summary_slot: SlotMap,
    holds: Option<HoldScanner>,
    cache: Arc<ChangeCache>,
    slots: Arc<SlotMap>,
    sink: Arc<dyn ReportSink>,
    guard: CycleGuard,
    skip_initial: AtomicBool,
    next_run: Mutex<Option<DateTime<Utc>>>,
    task: TaskHandle,
    last_cycle: Mutex<Option<CycleReport>>,
    last_restore: Mutex<Option<RestoreReport>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("entities", &self.entities.len())
            .field("next_run", &*self.next_run.lock())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Start assembling a scheduler
    #[must_use]
    pub fn builder(
        config: SchedulerConfig,
        entities: Vec<Entity>,
        source: Arc<dyn DataSource>,
        renderer: Arc<dyn Renderer>,
        cards: Arc<dyn ChatChannel>,
        sink: Arc<dyn ReportSink>,
    ) -> SchedulerBuilder {
        SchedulerBuilder {
            config,
            entities,
            source,
            renderer,
            cards,
            sink,
            icons: Arc::new(NoIcons),
            summary: None,
            holds: None,
            cache: Arc::new(ChangeCache::new()),
            slots: Arc::new(SlotMap::new()),
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Tracked players in configuration order
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Change cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<ChangeCache> {
        &self.cache
    }

    /// Card slots
    #[inline]
    #[must_use]
    pub fn slots(&self) -> &Arc<SlotMap> {
        &self.slots
    }

    /// Message currently holding the summary board
    #[must_use]
    pub fn summary_message(&self) -> Option<MessageId> {
        self.summary_slot.get(SUMMARY_SLOT)
    }

    /// When the next cycle is due
    #[must_use]
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        *self.next_run.lock()
    }

    /// Set when the next cycle is due
    pub fn arm(&self, at: DateTime<Utc>) {
        *self.next_run.lock() = Some(at);
    }

    /// Whether a cycle is in progress
    #[inline]
    #[must_use]
    pub fn is_cycle_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Report of the last completed cycle
    #[must_use]
    pub fn last_cycle(&self) -> Option<CycleReport> {
        self.last_cycle.lock().clone()
    }

    /// Report of the last reconstruction
    #[must_use]
    pub fn last_restore(&self) -> Option<RestoreReport> {
        *self.last_restore.lock()
    }

    /// Status of the loop task
    #[must_use]
    pub fn task_status(&self) -> TaskStatus {
        self.task.status()
    }

    /// Spawn the loop, replacing a running one
    pub fn start(&self) {
        let weak = self.me.clone();
        let sink = Arc::clone(&self.sink);
        let cooldown = self.config.cooldown;
        self.task.spawn(run_resilient(SCHEDULER_NAME, cooldown, sink, move || {
            run_loop(weak.clone())
        }));
    }

    /// Cancel the loop and wait until it is gone
    pub async fn stop(&self) -> TaskStatus {
        self.task.shutdown().await
    }

    /// Restart the loop without its automatic first cycle
    pub fn restart_timer(&self) {
        self.skip_initial.store(true, Ordering::SeqCst);
        self.start();
        tracing::info!("scheduler timer restarted");
    }

    /// Cancel the loop, run one cycle inline, then restart the timer
    ///
    /// Shutting the loop down drops the token of a cycle it was running, so
    /// a cycle still holding the guard belongs to another caller and this one
    /// is skipped.
    pub async fn run_cycle_now(&self) -> CycleOutcome {
        self.task.shutdown().await;
        let outcome = self.run_cycle().await;
        self.restart_timer();
        outcome
    }

    /// Rebuild slots and baselines from the card channel
    pub async fn restore_state(&self) -> Result<RestoreReport, SchedulerError> {
        let report = reconstruct(
            self.cards.channel().as_ref(),
            self.config.history_window,
            &self.entities,
            &self.cache,
            &self.slots,
        )
        .await?;
        *self.last_restore.lock() = Some(report);
        Ok(report)
    }

    /// Run one reconciliation cycle unless one is already running
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(_token) = self.guard.try_acquire() else {
            tracing::info!("cycle already running, skipped");
            return CycleOutcome::Skipped;
        };

        let started_at = Utc::now();
        tracing::info!(entities = self.entities.len(), "cycle started");

        let holds = match &self.holds {
            Some(scanner) => scanner.scan(&self.entities, started_at).await,
            None => HoldSnapshot::default(),
        };

        let mut outcomes = Vec::with_capacity(self.entities.len());
        let mut observations = Vec::with_capacity(self.entities.len());
        for entity in &self.entities {
            if !self.config.entity_delay.is_zero() {
                tokio::time::sleep(self.config.entity_delay).await;
            }

            let baseline = self.cache.baseline(&entity.id);
            let (reading, tier_icon) = self.read_standing(entity, baseline.as_ref()).await;
            let degraded = reading.is_degraded();
            let mut observation = reading.into_observation();
            let agent_icon = self
                .enrich(entity, &mut observation, baseline.as_ref(), &holds)
                .await;

            let outcome = self
                .reconcile(entity, &observation, degraded, tier_icon, agent_icon)
                .await;
            outcomes.push((entity.id.clone(), outcome));
            observations.push(observation);
        }

        let any_published = outcomes
            .iter()
            .any(|(_, o)| matches!(o, EntityOutcome::Published { .. }));
        let summary_published = any_published && self.publish_summary(&observations).await;

        let report = CycleReport {
            outcomes,
            summary_published,
            holds: holds.len(),
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            elapsed_secs = (report.finished_at - report.started_at).num_seconds(),
            "cycle finished: {report}"
        );
        *self.last_cycle.lock() = Some(report.clone());
        CycleOutcome::Completed(report)
    }

    /// Fetch the standing, falling back to the committed baseline
    async fn read_standing(
        &self,
        entity: &Entity,
        baseline: Option<&Fingerprint>,
    ) -> (Reading, Option<String>) {
        let failure = match self.source.standing(&entity.id, &entity.region).await {
            Ok(Some(standing)) => {
                let observation = Observation {
                    tier_label: standing.tier_label,
                    score: standing.score,
                    tier_progress: standing.tier_progress,
                    tier_ordinal: standing.tier_ordinal,
                    account_level: 0,
                    hold: None,
                    last_agent: UNKNOWN_AGENT.to_string(),
                };
                return (Reading::Fresh(observation), standing.icon_url);
            }
            Ok(None) => "not found".to_string(),
            Err(e) => e.to_string(),
        };

        match baseline {
            Some(baseline) => {
                tracing::warn!(entity = %entity.name, reason = %failure, "standing unavailable, using last published state");
                (Reading::Degraded(baseline.to_observation()), None)
            }
            None => {
                tracing::warn!(entity = %entity.name, reason = %failure, "standing unavailable and no baseline");
                (Reading::Absent, None)
            }
        }
    }

    /// Fill account level, last agent and hold; returns the agent icon URL
    async fn enrich(
        &self,
        entity: &Entity,
        observation: &mut Observation,
        baseline: Option<&Fingerprint>,
        holds: &HoldSnapshot,
    ) -> Option<String> {
        if observation.is_unranked() {
            observation.account_level =
                match self.source.account_level(&entity.id, &entity.region).await {
                    Ok(level) => level.unwrap_or(0),
                    Err(e) => {
                        tracing::warn!(entity = %entity.name, error = %e, "account level unavailable");
                        baseline
                            .and_then(|b| b.account_level)
                            .unwrap_or(observation.account_level)
                    }
                };
        }

        let agent_icon = match self.source.recent_activity(&entity.id, &entity.region).await {
            Ok(Some(Activity {
                agent,
                icon_url: Some(url),
            })) => {
                observation.last_agent = agent;
                Some(url)
            }
            Ok(_) => {
                observation.last_agent = UNKNOWN_AGENT.to_string();
                None
            }
            Err(e) => {
                tracing::warn!(entity = %entity.name, error = %e, "recent activity unavailable");
                if let Some(baseline) = baseline {
                    observation.last_agent = baseline.last_agent.clone();
                }
                None
            }
        };

        observation.hold = holds.label(&entity.id).map(str::to_string);
        agent_icon
    }

    /// Publish a card if the observation changed; commit only on success
    async fn reconcile(
        &self,
        entity: &Entity,
        observation: &Observation,
        degraded: bool,
        tier_icon: Option<String>,
        agent_icon: Option<String>,
    ) -> EntityOutcome {
        if !self.cache.should_publish(&entity.id, observation) {
            tracing::debug!(entity = %entity.name, "no change");
            return EntityOutcome::Unchanged;
        }

        let assets = CardAssets {
            tier_icon: self.icon(tier_icon.as_deref()).await,
            agent_icon: self.icon(agent_icon.as_deref()).await,
        };
        let request = CardRequest {
            entity: entity.clone(),
            observation: observation.clone(),
            assets,
        };
        let image = match render_card_offloaded(Arc::clone(&self.renderer), request).await {
            Ok(image) => image,
            Err(e) => {
                tracing::error!(entity = %entity.name, error = %e, "card render failed");
                return EntityOutcome::PublishFailed(e.to_string());
            }
        };

        let attachment = Attachment::png(
            format!("{}.png", entity.short_name().to_lowercase()),
            image,
        );
        let content = card_body(entity, observation);
        match self
            .cards
            .publish_to_slot(&self.slots, &entity.id, &content, Some(&attachment))
            .await
        {
            Ok(receipt) => {
                if degraded {
                    self.cache.commit_degraded(&entity.id, observation);
                } else {
                    self.cache.commit(&entity.id, observation);
                }
                tracing::info!(
                    entity = %entity.name,
                    message = %receipt.message,
                    mode = ?receipt.mode,
                    degraded,
                    tier = %observation.tier_label,
                    "card published"
                );
                EntityOutcome::Published {
                    message: receipt.message,
                    degraded,
                }
            }
            Err(e) => {
                tracing::error!(entity = %entity.name, error = %e, "card publish failed");
                EntityOutcome::PublishFailed(e.to_string())
            }
        }
    }

    async fn icon(&self, url: Option<&str>) -> Option<Arc<[u8]>> {
        match url {
            Some(url) => self.icons.icon(url).await,
            None => None,
        }
    }

    async fn publish_summary(&self, observations: &[Observation]) -> bool {
        let Some(publisher) = &self.summary else {
            return false;
        };
        let rows = summary_rows(self.entities.iter().zip(observations));
        let image = match render_summary_offloaded(Arc::clone(&self.renderer), rows).await {
            Ok(image) => image,
            Err(e) => {
                tracing::error!(error = %e, "summary render failed");
                return false;
            }
        };
        let attachment = Attachment::png("leaderboard.png", image);
        match publisher
            .publish_to_slot(&self.summary_slot, SUMMARY_SLOT, SUMMARY_CONTENT, Some(&attachment))
            .await
        {
            Ok(receipt) => {
                tracing::info!(message = %receipt.message, mode = ?receipt.mode, "summary published");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "summary publish failed");
                false
            }
        }
    }
}

async fn run_loop(weak: Weak<Scheduler>) -> Result<(), SchedulerError> {
    let Some(scheduler) = weak.upgrade() else {
        return Ok(());
    };
    scheduler.restore_state().await?;
    if scheduler.skip_initial.swap(false, Ordering::SeqCst) {
        tracing::info!("initial cycle skipped after timer restart");
    } else {
        scheduler.run_cycle().await;
    }
    drop(scheduler);

    loop {
        let sleep = {
            let Some(scheduler) = weak.upgrade() else {
                return Ok(());
            };
            let sleep = scheduler.config.jitter.sleep_for(scheduler.config.interval);
            scheduler.arm(Utc::now() + to_chrono(sleep));
            tracing::info!(sleep_secs = sleep.as_secs(), "next cycle scheduled");
            sleep
        };
        tokio::time::sleep(sleep).await;

        let Some(scheduler) = weak.upgrade() else {
            return Ok(());
        };
        scheduler.run_cycle().await;
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

impl Supervised for Scheduler {
    fn name(&self) -> &'static str {
        SCHEDULER_NAME
    }

    fn status(&self) -> TaskStatus {
        self.task.status()
    }

    fn stall(&self, now: DateTime<Utc>) -> Option<Stall> {
        self.next_run().map(|next| Stall::overdue(now - next))
    }

    fn detail(&self, now: DateTime<Utc>) -> String {
        if self.is_cycle_running() {
            return "cycle in progress".to_string();
        }
        match self.next_run() {
            Some(next) if next > now => {
                format!("next cycle in {}m", (next - now).num_minutes())
            }
            Some(next) => format!("next cycle overdue by {}s", (now - next).num_seconds()),
            None => "waiting for first cycle".to_string(),
        }
    }

    fn restart(&self) {
        self.start();
    }

    fn force_restart(&self, now: DateTime<Utc>) {
        self.task.cancel();
        self.arm(now + to_chrono(self.config.interval));
        self.start();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PublishError;
    use crate::render::RenderError;
    use crate::render::SummaryRow;
    use crate::testing::FakeChannel;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;
    use tierwatch_client::{ClientError, ClientResult, Standing};
    use tierwatch_runtime::LogSink;

    #[derive(Default)]
    struct Source {
        standings: Mutex<HashMap<String, ClientResult<Option<Standing>>>>,
    }

    impl Source {
        fn set(&self, id: &str, result: ClientResult<Option<Standing>>) {
            self.standings.lock().insert(id.to_string(), result);
        }
    }

    #[async_trait]
    impl DataSource for Source {
        async fn standing(&self, id: &str, _region: &str) -> ClientResult<Option<Standing>> {
            self.standings.lock().get(id).cloned().unwrap_or(Ok(None))
        }

        async fn recent_activity(&self, _id: &str, _region: &str) -> ClientResult<Option<Activity>> {
            Ok(Some(Activity {
                agent: "Jett".into(),
                icon_url: Some("https://img/jett.png".into()),
            }))
        }

        async fn account_level(&self, _id: &str, _region: &str) -> ClientResult<Option<u32>> {
            Ok(Some(42))
        }
    }

    struct Blank;

    impl Renderer for Blank {
        fn render_card(&self, _request: &CardRequest) -> Result<Vec<u8>, RenderError> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }

        fn render_summary(&self, _rows: &[SummaryRow]) -> Result<Vec<u8>, RenderError> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    fn standing(label: &str, progress: i64) -> Standing {
        Standing {
            tier_label: label.into(),
            score: 1000 + progress,
            tier_progress: progress,
            tier_ordinal: 12,
            icon_url: None,
        }
    }

    fn fixture(
        entities: Vec<Entity>,
    ) -> (Arc<Scheduler>, Arc<Source>, Arc<FakeChannel>, Arc<FakeChannel>) {
        let source = Arc::new(Source::default());
        let cards = Arc::new(FakeChannel::default());
        let summary = Arc::new(FakeChannel::default());
        let config = SchedulerConfig::new()
            .with_entity_delay(std::time::Duration::ZERO)
            .with_jitter(JitterPolicy::None);
        let scheduler = Scheduler::builder(
            config,
            entities,
            source.clone(),
            Arc::new(Blank),
            cards.clone(),
            Arc::new(LogSink),
        )
        .with_summary_channel(summary.clone(), None)
        .build();
        (scheduler, source, cards, summary)
    }

    fn completed(outcome: CycleOutcome) -> CycleReport {
        match outcome {
            CycleOutcome::Completed(report) => report,
            CycleOutcome::Skipped => panic!("cycle unexpectedly skipped"),
        }
    }

    #[tokio::test]
    async fn unchanged_state_is_not_republished() {
        let (scheduler, source, cards, summary) = fixture(vec![Entity::new("a", "Ann#1", "eu")]);
        source.set("a", Ok(Some(standing("Gold 1", 10))));

        let first = completed(scheduler.run_cycle().await);
        assert_eq!(first.published(), 1);
        assert!(first.summary_published);
        let slot = scheduler.slots().get("a");

        let second = completed(scheduler.run_cycle().await);
        assert_eq!(second.unchanged(), 1);
        assert!(!second.summary_published);
        assert_eq!(scheduler.slots().get("a"), slot);
        assert_eq!(cards.creates() + cards.edits(), 1);
        assert_eq!(summary.creates(), 1);
    }

    #[tokio::test]
    async fn change_is_published_exactly_once() {
        let (scheduler, source, cards, _) = fixture(vec![Entity::new("a", "Ann#1", "eu")]);
        source.set("a", Ok(Some(standing("Gold 1", 10))));
        completed(scheduler.run_cycle().await);

        source.set("a", Ok(Some(standing("Gold 1", 25))));
        let report = completed(scheduler.run_cycle().await);
        assert_eq!(report.published(), 1);
        assert_eq!(cards.edits(), 1);
        assert_eq!(cards.creates(), 1);

        let current = Observation {
            tier_label: "Gold 1".into(),
            score: 1025,
            tier_progress: 25,
            tier_ordinal: 12,
            account_level: 0,
            hold: None,
            last_agent: "Jett".into(),
        };
        assert!(!scheduler.cache().should_publish("a", &current));
    }

    #[tokio::test]
    async fn upstream_failure_degrades_to_baseline_or_placeholder() {
        let (scheduler, source, cards, _) = fixture(vec![
            Entity::new("a", "Ann#1", "eu"),
            Entity::new("b", "Ben#2", "eu"),
        ]);
        source.set("a", Ok(Some(standing("Gold 1", 10))));
        completed(scheduler.run_cycle().await);

        source.set("a", Err(ClientError::RateLimited { attempts: 3 }));
        source.set("b", Err(ClientError::Timeout));
        let report = completed(scheduler.run_cycle().await);

        // Baseline available and nothing else moved: nothing to publish.
        assert_eq!(report.outcome("a"), Some(&EntityOutcome::Unchanged));
        // No baseline yet: the placeholder card was already published last
        // cycle with the 404 answer, so the state is unchanged as well.
        assert_eq!(report.outcome("b"), Some(&EntityOutcome::Unchanged));

        let body = cards.content(scheduler.slots().get("b").unwrap()).unwrap();
        assert!(body.contains("||data:ERROR:0:0:None:Jett||"));
    }

    #[tokio::test]
    async fn failed_publish_does_not_commit() {
        let (scheduler, source, cards, _) = fixture(vec![Entity::new("a", "Ann#1", "eu")]);
        source.set("a", Ok(Some(standing("Gold 1", 10))));
        cards.fail_creates(true);

        let report = completed(scheduler.run_cycle().await);
        assert_eq!(report.failed(), 1);
        assert!(scheduler.cache().baseline("a").is_none());

        cards.fail_creates(false);
        let report = completed(scheduler.run_cycle().await);
        assert_eq!(report.published(), 1);
    }

    #[tokio::test]
    async fn vanished_card_is_recreated() {
        let (scheduler, source, cards, _) = fixture(vec![Entity::new("a", "Ann#1", "eu")]);
        source.set("a", Ok(Some(standing("Gold 1", 10))));
        completed(scheduler.run_cycle().await);
        let first = scheduler.slots().get("a").unwrap();

        cards.fail_next_edit(PublishError::NotFound(first));
        source.set("a", Ok(Some(standing("Gold 2", 0))));
        let report = completed(scheduler.run_cycle().await);

        let second = scheduler.slots().get("a").unwrap();
        assert_ne!(first, second);
        assert_eq!(
            report.outcome("a"),
            Some(&EntityOutcome::Published {
                message: second,
                degraded: false
            })
        );
    }

    #[tokio::test]
    async fn concurrent_cycle_is_skipped() {
        let (scheduler, _, _, _) = fixture(vec![Entity::new("a", "Ann#1", "eu")]);
        let _token = scheduler.guard.try_acquire().unwrap();
        assert_eq!(scheduler.run_cycle().await, CycleOutcome::Skipped);
    }

    #[tokio::test]
    async fn forced_cycle_waits_for_running_one() {
        let (scheduler, source, cards, _) = fixture(vec![Entity::new("a", "Ann#1", "eu")]);
        source.set("a", Ok(Some(standing("Gold 1", 10))));
        let token = scheduler.guard.try_acquire().unwrap();

        assert_eq!(scheduler.run_cycle_now().await, CycleOutcome::Skipped);
        assert!(scheduler.is_cycle_running());
        assert_eq!(cards.creates(), 0);

        drop(token);
        scheduler.stop().await;
        completed(scheduler.run_cycle_now().await);
        assert_eq!(cards.creates(), 1);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn next_run_is_the_jittered_wake_time() {
        let config = SchedulerConfig::new()
            .with_entity_delay(std::time::Duration::ZERO)
            .with_jitter(JitterPolicy::Uniform(std::time::Duration::from_secs(1800)));
        let scheduler = Scheduler::builder(
            config,
            Vec::new(),
            Arc::new(Source::default()),
            Arc::new(Blank),
            Arc::new(FakeChannel::default()),
            Arc::new(LogSink),
        )
        .build();

        scheduler.restart_timer();
        while scheduler.next_run().is_none() {
            tokio::task::yield_now().await;
        }
        let wait = (scheduler.next_run().unwrap() - Utc::now()).to_std().unwrap();

        tokio::time::advance(wait.saturating_sub(std::time::Duration::from_secs(2))).await;
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert!(scheduler.last_cycle().is_none());

        tokio::time::advance(std::time::Duration::from_secs(4)).await;
        for _ in 0..100 {
            if scheduler.last_cycle().is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(scheduler.last_cycle().is_some());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn restart_rebuilds_state_without_republishing() {
        let alice = Entity::new("a", "Ann#1", "eu");
        let (first, source, cards, _) = fixture(vec![alice.clone()]);
        source.set("a", Ok(Some(standing("Gold 1", 10))));
        completed(first.run_cycle().await);

        let fresh = Scheduler::builder(
            SchedulerConfig::new().with_entity_delay(std::time::Duration::ZERO),
            vec![alice],
            source.clone(),
            Arc::new(Blank),
            cards.clone(),
            Arc::new(LogSink),
        )
        .build();
        let restored = fresh.restore_state().await.unwrap();
        assert_eq!(restored.restored, 1);

        let report = completed(fresh.run_cycle().await);
        assert_eq!(report.unchanged(), 1);
        assert_eq!(cards.creates(), 1);
    }

    #[tokio::test]
    async fn supervision_view_tracks_next_run() {
        let (scheduler, _, _, _) = fixture(Vec::new());
        let now = Utc::now();
        assert!(scheduler.stall(now).is_none());
        assert_eq!(scheduler.status(), TaskStatus::Idle);

        scheduler.arm(now - ChronoDuration::seconds(301));
        let stall = scheduler.stall(now).unwrap();
        assert!(stall.exceeds(ChronoDuration::seconds(300)));

        scheduler.force_restart(now);
        assert!(scheduler.status().is_alive());
        assert!(!scheduler.stall(now).unwrap().exceeds(ChronoDuration::seconds(300)));
        scheduler.stop().await;
    }
}
