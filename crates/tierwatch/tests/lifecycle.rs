//! Lifecycle tests - a host loads settings, builds the app, starts and stops it

use std::io::Write;
use std::time::Duration;
use tierwatch::{http_source, App, Collaborators, Settings};
use tierwatch_runtime::Supervised;
use tierwatch_test_utils::{standing, MemoryChannel, ScriptedSource, StubRenderer};

const SETTINGS: &str = r#"
    [api]
    keys = ["k1", "k2"]

    [[entities]]
    id = "puuid-0"
    name = "Alice#EUW"
    region = "eu"

    [scheduler]
    entity_delay_secs = 0
    jitter_secs = 0

    [channels]
    cards = 1
"#;

#[tokio::test]
async fn test_host_runs_app_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SETTINGS.as_bytes()).unwrap();
    let settings = Settings::load(file.path()).unwrap();
    assert!(http_source(&settings.api).is_ok());

    let source = ScriptedSource::new();
    source.set_standing("puuid-0", Ok(Some(standing("Gold 2", 13, 40))));
    let cards = MemoryChannel::new();
    let app = App::build(
        &settings,
        Collaborators {
            source,
            icons: None,
            renderer: StubRenderer::new(),
            cards: cards.clone(),
            summary: None,
            holds: None,
            codes: None,
            logs: None,
            mailbox: None,
        },
    );
    assert!(app.ingestor().is_none());

    app.start();
    for _ in 0..100 {
        if app.scheduler().next_run().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(app.scheduler().next_run().is_some());
    assert_eq!(cards.creates(), 1);
    assert!(app.scheduler().status().is_alive());

    app.shutdown().await;
    assert!(!app.scheduler().status().is_alive());
    assert!(!app.supervisor().status().is_alive());
}
