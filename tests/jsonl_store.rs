//! Configured engine writing to a JSON Lines file.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::tempdir;

use tagscan::config::{factory, ScanConfig, EXAMPLE_CONFIG};
use tagscan::prelude::*;
use tagscan::scan::ReadingWriter;

#[tokio::test]
async fn test_example_config_appends_one_batch_per_cycle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("readings.jsonl");

    let mut config = ScanConfig::from_toml_str(EXAMPLE_CONFIG).unwrap();
    config.store.path = Some(path.clone());
    let engine = factory::create_engine(&config).unwrap();
    assert_eq!(engine.store_name(), "jsonl");

    let first = engine.run_cycle().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = engine.run_cycle().await.unwrap();
    assert_eq!(first.readings_written, 3);
    assert_eq!(second.readings_written, 3);

    let readings = JsonlStore::new(&path).read_all().await.unwrap();
    assert_eq!(readings.len(), 6);

    let mut per_cycle: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
    for reading in &readings {
        *per_cycle.entry(reading.timestamp).or_default() += 1;
        assert!(reading.is_consistent());
    }
    assert_eq!(per_cycle.get(&first.timestamp), Some(&3));
    assert_eq!(per_cycle.get(&second.timestamp), Some(&3));

    let unreachable: Vec<&Reading> = readings
        .iter()
        .filter(|r| r.signal_id == SignalId(201))
        .collect();
    assert_eq!(unreachable.len(), 2);
    assert!(unreachable
        .iter()
        .all(|r| r.status == ReadStatus::ConnectionError && r.value.is_none()));
}

#[tokio::test]
async fn test_missing_file_reads_empty() {
    let dir = tempdir().unwrap();
    let store = JsonlStore::new(dir.path().join("absent.jsonl"));
    assert!(store.read_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_timed_out_commit_is_all_or_nothing() {
    let dir = tempdir().unwrap();
    let store = JsonlStore::new(dir.path().join("readings.jsonl"));
    let ts = Utc::now();
    let first = vec![Reading::from_result(SignalId(1), &ReadResult::success("a", 1.0), ts)];
    store.append_readings(ts, &first).await.unwrap();
    let before = std::fs::read(store.path()).unwrap();

    let ts2 = ts + chrono::Duration::seconds(60);
    let mut writer = ReadingWriter::new(ts2, Duration::from_nanos(1));
    writer.extend((0..100_000).map(|i| Reading::from_result(SignalId(i), &ReadResult::success("t", 1.0), ts2)));
    let committed = writer.commit(&store).await;

    // A later append queues behind the abandoned write and its rollback.
    let ts3 = ts2 + chrono::Duration::seconds(60);
    let last = vec![Reading::from_result(SignalId(2), &ReadResult::success("b", 2.0), ts3)];
    store.append_readings(ts3, &last).await.unwrap();

    let readings = store.read_all().await.unwrap();
    match committed {
        Ok(written) => {
            assert_eq!(written, 100_000);
            assert_eq!(readings.len(), 100_002);
        }
        Err(e) => {
            assert!(matches!(e, ScanError::Store(_)));
            assert!(std::fs::read(store.path()).unwrap().starts_with(&before));
            assert_eq!(readings, vec![first[0].clone(), last[0].clone()]);
        }
    }
}
