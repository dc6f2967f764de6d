//! Seeded end-to-end simulation
//!
//! Drives the real scheduler and mail ingestor against in-memory
//! collaborators. Each round randomly drifts standings, injects upstream
//! outages, deletes cards, restarts the scheduler from channel history and
//! delivers sign-in mail, then checks that:
//! - untouched players are never republished
//! - changed or missing players are published exactly once
//! - every player has at most one card
//! - the newest code reaches the sink, and no code reaches it twice
//!
//! Finally a supervisor is pointed at the loops, which were never started,
//! and must revive both.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tierwatch_core::{CycleOutcome, Entity, EntityOutcome, JitterPolicy, Scheduler, SchedulerConfig};
use tierwatch_mail::{Delivery, IngestConfig, MailIngestor};
use tierwatch_runtime::{LogSink, ModuleState, Supervised};
use tierwatch_supervisor::{Supervisor, SupervisorConfig};
use tierwatch_test_utils::{
    activity, code_mail, roster, standing, MemoryChannel, MemoryMailServer, RecordingCodeSink,
    RecordingReportSink, ScriptedSource, StubRenderer,
};

const TIERS: &[&str] = &[
    "Iron", "Bronze", "Silver", "Gold", "Platinum", "Diamond", "Ascendant", "Immortal",
];
const AGENTS: &[&str] = &["Jett", "Sova", "Omen", "Killjoy", "Reyna"];
const TOP_ORDINAL: i64 = 24;

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Reconciliation rounds
    pub cycles: u64,
    /// Tracked players
    pub entities: usize,
    /// Stop at the first violation
    pub stop_on_first_violation: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            cycles: 200,
            entities: 5,
            stop_on_first_violation: false,
        }
    }
}

/// Counters collected during a run
#[derive(Debug, Clone, Default)]
pub struct SimStats {
    /// Completed cycles
    pub cycles: u64,
    /// Cards published
    pub published: usize,
    /// Players left untouched by a cycle
    pub unchanged: usize,
    /// Standing changes injected
    pub drifts: usize,
    /// Upstream outages injected
    pub outages: usize,
    /// Cards deleted behind the scheduler's back
    pub deletions: usize,
    /// Scheduler rebuilds from channel history
    pub restarts: usize,
    /// Mails delivered to the mailbox
    pub mails: usize,
    /// Mails repeating an earlier code
    pub resent: usize,
    /// Mail checks that failed
    pub mail_failures: usize,
    /// Codes that reached the sink
    pub codes_delivered: usize,
    /// Loops revived by the supervisor
    pub supervisor_restarts: u64,
}

/// Outcome of a run
#[derive(Debug, Clone)]
pub struct SimReport {
    /// Parameters of the run
    pub config: SimConfig,
    /// Counters
    pub stats: SimStats,
    /// Broken expectations, in order
    pub violations: Vec<String>,
}

impl SimReport {
    /// Whether no violation was seen
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human-readable report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let s = &self.stats;
        let mut out = String::new();
        let _ = writeln!(out, "=== tierwatch simulation ===\n");
        let _ = writeln!(out, "Seed: {}", self.config.seed);
        let _ = writeln!(out, "Players: {}", self.config.entities);
        let _ = writeln!(out, "Cycles: {}", s.cycles);
        let _ = writeln!(out, "Published: {}", s.published);
        let _ = writeln!(out, "Unchanged: {}", s.unchanged);
        let _ = writeln!(out, "Drifts: {}", s.drifts);
        let _ = writeln!(out, "Outages: {}", s.outages);
        let _ = writeln!(out, "Deleted cards: {}", s.deletions);
        let _ = writeln!(out, "Restarts: {}", s.restarts);
        let _ = writeln!(out, "Mails: {} ({} resent codes)", s.mails, s.resent);
        let _ = writeln!(out, "Mail failures: {}", s.mail_failures);
        let _ = writeln!(out, "Codes delivered: {}", s.codes_delivered);
        let _ = writeln!(out, "Supervisor restarts: {}", s.supervisor_restarts);
        let _ = writeln!(out, "Violations: {}", self.violations.len());

        if !self.violations.is_empty() {
            let _ = writeln!(out, "\n=== Violations ===");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(out, "{}. {v}", i + 1);
            }
        }

        let _ = write!(
            out,
            "\n=== Result: {} ===",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        out
    }
}

/// Per-player upstream state
#[derive(Debug, Clone, Copy)]
struct Ladder {
    ordinal: i64,
    progress: i64,
}

impl Ladder {
    fn label(self) -> String {
        let tier = TIERS[((self.ordinal - 3).max(0) / 3) as usize % TIERS.len()];
        format!("{tier} {}", (self.ordinal % 3) + 1)
    }

    fn drift(&mut self, rng: &mut StdRng) {
        self.progress += rng.gen_range(1..=40);
        if self.progress >= 100 {
            self.progress -= 100;
            self.ordinal = (self.ordinal + 1).min(TOP_ORDINAL);
        }
    }
}

struct World {
    source: Arc<ScriptedSource>,
    renderer: Arc<StubRenderer>,
    cards: Arc<MemoryChannel>,
    ladders: HashMap<String, Ladder>,
    agents: HashMap<String, &'static str>,
}

impl World {
    fn publish_upstream(&self, id: &str) {
        let ladder = self.ladders[id];
        self.source.set_standing(
            id,
            Ok(Some(standing(&ladder.label(), ladder.ordinal, ladder.progress))),
        );
        self.source.set_activity(id, Ok(Some(activity(self.agents[id]))));
    }

    fn scheduler(&self, entities: Vec<Entity>) -> Arc<Scheduler> {
        let config = SchedulerConfig::new()
            .with_entity_delay(Duration::ZERO)
            .with_jitter(JitterPolicy::None);
        Scheduler::builder(
            config,
            entities,
            self.source.clone(),
            self.renderer.clone(),
            self.cards.clone(),
            Arc::new(LogSink),
        )
        .build()
    }
}

/// Run the simulation
pub async fn run_simulation(config: SimConfig) -> SimReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stats = SimStats::default();
    let mut violations = Vec::new();

    let entities = roster(config.entities.max(1));
    let ids: Vec<String> = entities.iter().map(|e| e.id.clone()).collect();
    let mut world = World {
        source: ScriptedSource::new(),
        renderer: StubRenderer::new(),
        cards: MemoryChannel::new(),
        ladders: HashMap::new(),
        agents: HashMap::new(),
    };
    for id in &ids {
        let ladder = Ladder {
            ordinal: rng.gen_range(3..=TOP_ORDINAL),
            progress: rng.gen_range(0..100),
        };
        world.ladders.insert(id.clone(), ladder);
        world.agents.insert(id.clone(), AGENTS[rng.gen_range(0..AGENTS.len())]);
        world.publish_upstream(id);
    }
    let mut scheduler = world.scheduler(entities.clone());

    let mail = MemoryMailServer::new();
    let codes = RecordingCodeSink::new();
    let ingestor = MailIngestor::new(
        IngestConfig::default(),
        mail.connector(),
        codes.clone(),
        Arc::new(LogSink),
    );
    let mut sent_codes: BTreeSet<String> = BTreeSet::new();
    let mut next_uid = 1u32;

    // Cards deleted from the channel and not yet republished
    let mut missing: HashSet<String> = HashSet::new();

    for round in 0..config.cycles {
        let mut expected: HashSet<String> = HashSet::new();
        let mut failed: HashSet<String> = HashSet::new();
        let first = round == 0;

        if first {
            expected.extend(ids.iter().cloned());
        } else {
            let restart = rng.gen_bool(0.1);
            if restart {
                scheduler = world.scheduler(entities.clone());
                match scheduler.restore_state().await {
                    Ok(report) if report.restored != ids.len() - missing.len() => {
                        violations.push(format!(
                            "round {round}: restored {} cards, {} live",
                            report.restored,
                            ids.len() - missing.len()
                        ));
                    }
                    Ok(_) => {}
                    Err(e) => violations.push(format!("round {round}: restore failed: {e}")),
                }
                stats.restarts += 1;
                expected.extend(missing.iter().cloned());
            }

            for id in &ids {
                if rng.gen_bool(0.2) {
                    if let Some(ladder) = world.ladders.get_mut(id) {
                        ladder.drift(&mut rng);
                    }
                    world.publish_upstream(id);
                    expected.insert(id.clone());
                    stats.drifts += 1;
                } else if !restart && !missing.contains(id) && rng.gen_bool(0.1) {
                    world.source.fail(id);
                    failed.insert(id.clone());
                    stats.outages += 1;
                }
            }

            if rng.gen_bool(0.1) {
                let victim = &ids[rng.gen_range(0..ids.len())];
                if let Some(message) = scheduler.slots().get(victim) {
                    world.cards.remove(message);
                    if !missing.contains(victim) {
                        missing.insert(victim.clone());
                        stats.deletions += 1;
                    }
                }
            }
        }

        match scheduler.run_cycle().await {
            CycleOutcome::Skipped => {
                violations.push(format!("round {round}: cycle skipped with no other cycle running"));
            }
            CycleOutcome::Completed(report) => {
                stats.cycles += 1;
                stats.published += report.published();
                stats.unchanged += report.unchanged();
                for (id, outcome) in &report.outcomes {
                    let published = matches!(outcome, EntityOutcome::Published { .. });
                    let wanted = expected.contains(id) && !failed.contains(id);
                    if published != wanted {
                        violations.push(format!(
                            "round {round}: {id} expected {}, got {outcome:?}",
                            if wanted { "a publish" } else { "no publish" }
                        ));
                    }
                    if published {
                        missing.remove(id);
                    }
                }
            }
        }

        let live = world.cards.len();
        if live != ids.len() - missing.len() {
            violations.push(format!(
                "round {round}: {live} cards in channel for {} live players",
                ids.len() - missing.len()
            ));
        }

        for id in &failed {
            world.publish_upstream(id);
            world.source.set_level(id, Ok(None));
        }

        let mut fresh = None;
        if rng.gen_bool(0.3) {
            let code = loop {
                let candidate = rng.gen_range(100_000..1_000_000u32).to_string();
                if !sent_codes.contains(&candidate) {
                    break candidate;
                }
            };
            mail.deliver(code_mail(next_uid, 1, &code));
            next_uid += 1;
            sent_codes.insert(code.clone());
            fresh = Some(code);
            stats.mails += 1;
        } else if !sent_codes.is_empty() && rng.gen_bool(0.1) {
            let index = rng.gen_range(0..sent_codes.len());
            if let Some(code) = sent_codes.iter().nth(index) {
                mail.deliver(code_mail(next_uid, 1, code));
                next_uid += 1;
                stats.mails += 1;
                stats.resent += 1;
            }
        }
        if rng.gen_bool(0.05) {
            mail.fail_next_search();
        }
        match ingestor.check_now().await {
            Ok(delivery) => {
                if let Some(code) = fresh {
                    if delivery != Some(Delivery::Delivered(code.clone())) {
                        violations.push(format!(
                            "round {round}: newest code {code} not delivered, got {delivery:?}"
                        ));
                    }
                }
            }
            Err(_) => stats.mail_failures += 1,
        }

        if config.stop_on_first_violation && !violations.is_empty() {
            break;
        }
    }

    if ingestor.check_now().await.is_err() {
        stats.mail_failures += 1;
    }
    let delivered = codes.codes();
    stats.codes_delivered = delivered.len();
    let unique: BTreeSet<String> = delivered.iter().cloned().collect();
    if unique.len() != delivered.len() {
        violations.push(format!(
            "{} duplicate code deliveries",
            delivered.len() - unique.len()
        ));
    }
    if !unique.is_subset(&sent_codes) {
        violations.push("delivered a code that was never sent".to_string());
    }

    supervise(&scheduler, &ingestor, &mut stats, &mut violations).await;

    SimReport {
        config,
        stats,
        violations,
    }
}

/// Hand the never-started loops to a supervisor and expect it to revive them
async fn supervise(
    scheduler: &Arc<Scheduler>,
    ingestor: &Arc<MailIngestor>,
    stats: &mut SimStats,
    violations: &mut Vec<String>,
) {
    let reports = RecordingReportSink::new();
    let supervisor = Supervisor::new(
        SupervisorConfig::default(),
        vec![
            Arc::clone(scheduler) as Arc<dyn Supervised>,
            Arc::clone(ingestor) as Arc<dyn Supervised>,
        ],
        reports.clone(),
    );

    let first = supervisor.check(false).await;
    stats.supervisor_restarts = supervisor.metrics().total_restarts();
    if first.actions != 2 || first.modules.iter().any(|m| m.state != ModuleState::Dead) {
        violations.push(format!("supervisor: expected two dead loops, got {}", first.summary()));
    }
    if reports.reports().len() != 1 {
        violations.push("supervisor: restart was not reported".to_string());
    }

    let second = supervisor.check(false).await;
    if second.actions != 0 {
        violations.push(format!("supervisor: revived loops still failing, {}", second.summary()));
    }

    scheduler.stop().await;
    ingestor.stop().await;
    ingestor.disconnect().await;
}
