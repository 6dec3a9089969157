//! Startup from a config file with the exporter enabled

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use shard_counters::{start, Config, Engine, Mode, ThreadSelector};
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_start_from_file_serves_exporter() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"
[engine]
static_slots = 2
dynamic_slots = 1

[logging]
level = "warn"
format = "json"

[exporter]
enabled = true
bind_addr = "127.0.0.1:0"
subtree = "svc"
interval_secs = 1
prefix = "test"
"#,
    )
    .unwrap();
    let config = Config::load(file.path()).unwrap();

    let engine = Arc::new(Engine::new());
    let h = engine.create("svc.requests");
    let task = start(engine.clone(), &config).unwrap().expect("exporter enabled");

    assert_eq!(engine.mode(), Mode::Initialized);
    assert_eq!(engine.dynamic_slots(), 1);
    engine.increment(h);
    assert_eq!(engine.value(h, ThreadSelector::All), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!task.is_finished());
    task.abort();
}
