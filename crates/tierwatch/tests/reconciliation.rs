//! Reconciliation tests - change detection, restart recovery, key rotation

use chrono::{Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tierwatch_client::{ClientError, DataSource, HttpDataSource, KeyPool, ResilientClient};
use tierwatch_core::{
    ChatChannel, CycleOutcome, CycleReport, EntityOutcome, JitterPolicy, Scheduler,
    SchedulerConfig,
};
use tierwatch_runtime::LogSink;
use tierwatch_test_utils::{
    roster, standing, MemoryChannel, ScriptedSource, ScriptedTransport, StubRenderer,
};

const MMR_GOLD_2: &str = r#"{"status":200,"data":{"current_data":{
    "currenttierpatched":"Gold 2","currenttier":13,"elo":1340,
    "ranking_in_tier":40,"images":{"large":"https://media.example/tiers/13.png"}}}}"#;

fn config() -> SchedulerConfig {
    SchedulerConfig::new()
        .with_entity_delay(Duration::ZERO)
        .with_jitter(JitterPolicy::None)
}

fn scheduler(source: Arc<dyn DataSource>, cards: &Arc<MemoryChannel>, players: usize) -> Arc<Scheduler> {
    Scheduler::builder(
        config(),
        roster(players),
        source,
        StubRenderer::new(),
        cards.clone(),
        Arc::new(LogSink),
    )
    .build()
}

fn seeded_source(players: usize) -> Arc<ScriptedSource> {
    let source = ScriptedSource::new();
    for (i, entity) in roster(players).iter().enumerate() {
        let ordinal = 10 + i as i64;
        source.set_standing(&entity.id, Ok(Some(standing("Gold 1", ordinal, 20))));
    }
    source
}

async fn completed(scheduler: &Scheduler) -> CycleReport {
    match scheduler.run_cycle().await {
        CycleOutcome::Completed(report) => report,
        CycleOutcome::Skipped => panic!("cycle unexpectedly skipped"),
    }
}

#[tokio::test]
async fn test_repeated_cycles_publish_once() {
    let source = seeded_source(3);
    let cards = MemoryChannel::new();
    let summary = MemoryChannel::new();
    let scheduler = Scheduler::builder(
        config(),
        roster(3),
        source,
        StubRenderer::new(),
        cards.clone(),
        Arc::new(LogSink),
    )
    .with_summary_channel(summary.clone(), None)
    .build();

    let first = completed(&scheduler).await;
    assert_eq!(first.published(), 3);
    assert!(first.summary_published);

    let second = completed(&scheduler).await;
    assert_eq!(second.published(), 0);
    assert_eq!(second.unchanged(), 3);
    assert!(!second.summary_published);

    assert_eq!(cards.creates(), 3);
    assert_eq!(cards.edits(), 0);
    assert_eq!(summary.creates(), 1);
    assert_eq!(summary.edits(), 0);
}

#[tokio::test]
async fn test_only_changed_player_is_edited() {
    let source = seeded_source(3);
    let cards = MemoryChannel::new();
    let scheduler = scheduler(source.clone(), &cards, 3);
    completed(&scheduler).await;

    let bruno = roster(3)[1].id.clone();
    source.set_standing(&bruno, Ok(Some(standing("Gold 2", 11, 55))));
    let report = completed(&scheduler).await;

    assert_eq!(report.published(), 1);
    assert!(matches!(
        report.outcome(&bruno),
        Some(EntityOutcome::Published { degraded: false, .. })
    ));
    assert_eq!(cards.creates(), 3);
    assert_eq!(cards.edits(), 1);
}

#[tokio::test]
async fn test_restart_rebuilds_state_from_history() {
    let source = seeded_source(3);
    let cards = MemoryChannel::new();
    completed(&scheduler(source.clone(), &cards, 3)).await;

    let restarted = scheduler(source.clone(), &cards, 3);
    let restore = restarted.restore_state().await.unwrap();
    assert_eq!(restore.restored, 3);
    assert_eq!(restarted.slots().len(), 3);

    let report = completed(&restarted).await;
    assert_eq!(report.published(), 0);
    assert_eq!(cards.creates(), 3);

    let alice = roster(1)[0].id.clone();
    source.set_standing(&alice, Ok(Some(standing("Platinum 1", 16, 5))));
    let report = completed(&restarted).await;
    assert_eq!(report.published(), 1);
    assert_eq!(cards.creates(), 3);
    assert_eq!(cards.edits(), 1);
}

#[tokio::test]
async fn test_pinned_slot_survives_missing_history() {
    let source = seeded_source(1);
    let cards = MemoryChannel::new();
    let pinned = cards.seed("placeholder", Utc::now() - ChronoDuration::days(30));

    let scheduler = scheduler(source, &cards, 1);
    scheduler.slots().set(&roster(1)[0].id, pinned);
    completed(&scheduler).await;

    assert_eq!(cards.creates(), 0);
    assert_eq!(cards.edits(), 1);
    assert!(cards.content(pinned).unwrap().contains("||data:"));
}

#[tokio::test]
async fn test_rate_limited_pool_tries_each_key_once() {
    let transport = ScriptedTransport::always(429);
    let keys = Arc::new(KeyPool::new(["k1", "k2", "k3"]).unwrap());
    let source = HttpDataSource::new(ResilientClient::new(transport.clone(), keys));

    let result = source.standing("puuid-0", "eu").await;

    assert_eq!(result, Err(ClientError::RateLimited { attempts: 3 }));
    assert_eq!(transport.call_count(), 3);
    let used: Vec<Option<String>> = transport.calls().into_iter().map(|(_, key)| key).collect();
    assert_eq!(
        used,
        vec![Some("k1".into()), Some("k2".into()), Some("k3".into())]
    );
}

#[tokio::test]
async fn test_exhausted_keys_keep_published_card() {
    let transport = ScriptedTransport::always(429);
    transport.push_json(200, MMR_GOLD_2);
    transport.push_json(404, "");
    let keys = Arc::new(KeyPool::new(["k1", "k2"]).unwrap());
    let source = Arc::new(HttpDataSource::new(ResilientClient::new(transport.clone(), keys)));
    let cards = MemoryChannel::new();
    let scheduler = scheduler(source, &cards, 1);

    let first = completed(&scheduler).await;
    assert_eq!(first.published(), 1);
    let id = scheduler.slots().get(&roster(1)[0].id).unwrap();
    let body = cards.content(id).unwrap();

    let second = completed(&scheduler).await;
    assert_eq!(second.published(), 0);
    assert_eq!(cards.content(id).unwrap(), body);
    assert_eq!(cards.edits(), 0);
}

#[tokio::test]
async fn test_unavailable_player_gets_placeholder_card() {
    let source = ScriptedSource::new();
    let alice = roster(1)[0].id.clone();
    source.fail(&alice);
    let cards = MemoryChannel::new();
    let scheduler = scheduler(source, &cards, 1);

    let report = completed(&scheduler).await;
    assert!(matches!(
        report.outcome(&alice),
        Some(EntityOutcome::Published { degraded: true, .. })
    ));
    let body = cards.content(scheduler.slots().get(&alice).unwrap()).unwrap();
    assert!(body.contains("ERROR"));
}

#[tokio::test]
async fn test_hold_is_shown_on_card() {
    let source = seeded_source(1);
    let cards = MemoryChannel::new();
    let holds = MemoryChannel::new();
    holds.seed("Alice#EUW ban 3h", Utc::now());
    let scheduler = Scheduler::builder(
        config(),
        roster(1),
        source,
        StubRenderer::new(),
        cards.clone(),
        Arc::new(LogSink),
    )
    .with_hold_channel(holds.clone() as Arc<dyn ChatChannel>)
    .build();

    let report = completed(&scheduler).await;
    assert_eq!(report.holds, 1);
    let body = cards.content(scheduler.slots().get(&roster(1)[0].id).unwrap()).unwrap();
    assert!(body.contains("BANNED"));
}
