//! Contract Test: Bounded Concurrency
//!
//! Verifies how probing is scheduled within one run.
//!
//! Constraints verified:
//! - Never more than `workers` lookups in flight
//! - Every tracked row is probed exactly once
//! - The throttle delay precedes every lookup, failed or not
//! - A hung lookup is cut off by the probe timeout and counts as `ban`
//!
//! All tests run on a paused clock, so sleeps cost no wall time.

mod common;

use std::time::Duration;

use common::*;
use storewatch_core::MonitorEngine;
use storewatch_core::traits::AppMetadata;
use tokio::time::Instant;

fn rows(count: usize) -> (ScriptedProbe, Vec<Vec<String>>) {
    let mut probe = ScriptedProbe::new();
    let mut rows = Vec::with_capacity(count);
    for i in 0..count {
        let package = format!("com.pkg.{}", i);
        probe = if i % 2 == 0 {
            probe.listed(&package, AppMetadata::empty().with_released("2020-01-01"))
        } else {
            probe.missing(&package)
        };
        rows.push(tracked(&i.to_string(), "", "", "", &package));
    }
    (probe, rows)
}

#[tokio::test(start_paused = true)]
async fn in_flight_lookups_never_exceed_workers() {
    let (probe, rows) = rows(12);
    let probe = probe.with_latency(Duration::from_secs(1));
    let probe_stats = probe.stats();
    let store = RecordingStore::new(rows);

    let mut config = test_config();
    config.engine.workers = 3;

    let (engine, _events) = MonitorEngine::new(Box::new(probe), Box::new(store), config).unwrap();

    let started = Instant::now();
    let report = engine.run_on(run_date()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.tracked, 12);
    assert_eq!(probe_stats.calls(), 12);
    assert_eq!(probe_stats.max_in_flight(), 3);
    // 12 lookups, 3 at a time, 1s each
    assert!(elapsed >= Duration::from_secs(4), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn every_row_is_probed_exactly_once() {
    let (probe, rows) = rows(25);
    let probe_stats = probe.stats();
    let store = RecordingStore::new(rows);
    let stats = store.stats();

    let (engine, _events) =
        MonitorEngine::new(Box::new(probe), Box::new(store), test_config()).unwrap();
    let report = engine.run_on(run_date()).await.unwrap();

    let mut looked_up = probe_stats.looked_up();
    looked_up.sort();
    looked_up.dedup();
    assert_eq!(looked_up.len(), 25);
    assert_eq!(probe_stats.calls(), 25);

    assert_eq!(report.available + report.unavailable, 25);
    assert_eq!(report.available, 13);
    assert_eq!(stats.cell_batches()[0].len(), 75);
    assert_eq!(report.events_logged, 25, "every never-checked row is a new listing");
}

#[tokio::test(start_paused = true)]
async fn throttle_applies_to_every_lookup() {
    let (probe, rows) = rows(4);
    let store = RecordingStore::new(rows);

    let mut config = test_config();
    config.engine.workers = 1;
    config.engine.throttle_ms = 500;

    let (engine, _events) = MonitorEngine::new(Box::new(probe), Box::new(store), config).unwrap();

    let started = Instant::now();
    engine.run_on(run_date()).await.unwrap();

    // Two of the four lookups fail; they are throttled all the same
    assert!(started.elapsed() >= Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn hung_lookup_times_out_as_ban() {
    let probe = ScriptedProbe::new()
        .hanging("com.stuck")
        .listed("com.fine", AppMetadata::empty().with_released("2020-01-01"));
    let store = RecordingStore::new(vec![
        tracked("1", "ready", "2019-09-09", "", "com.stuck"),
        tracked("2", "ready", "2020-01-01", "", "com.fine"),
    ]);
    let sheet = store.sheet();

    let mut config = test_config();
    config.engine.probe_timeout_secs = 2;

    let (engine, _events) = MonitorEngine::new(Box::new(probe), Box::new(store), config).unwrap();
    let report = engine.run_on(run_date()).await.unwrap();

    assert_eq!(report.available, 1);
    assert_eq!(report.unavailable, 1);
    assert_eq!(sheet.cell("D2").await.as_deref(), Some("ban"));
    assert_eq!(sheet.cell("F2").await.as_deref(), Some("2019-09-09"));
    assert_eq!(sheet.cell("G2").await.as_deref(), Some(RUN_DATE));
    assert_eq!(logged(&sheet).await[0][1], "banned");
}

#[tokio::test(start_paused = true)]
async fn disabled_timeout_waits_on_the_probe() {
    let probe = ScriptedProbe::new().hanging("com.stuck");
    let store = RecordingStore::new(vec![tracked("1", "", "", "", "com.stuck")]);
    let stats = store.stats();

    let mut config = test_config();
    config.engine.probe_timeout_secs = 0;

    let (engine, _events) = MonitorEngine::new(Box::new(probe), Box::new(store), config).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(3600), engine.run_on(run_date())).await;
    assert!(outcome.is_err(), "run should still be waiting on the probe");
    assert_eq!(stats.cell_calls(), 0, "nothing is written while probing");
}
