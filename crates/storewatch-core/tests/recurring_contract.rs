//! Contract Test: Recurring Runs and Shutdown
//!
//! Verifies `MonitorEngine::run_until`.
//!
//! Constraints verified:
//! - The first run starts immediately, then one run per period
//! - A failed run does not stop the loop
//! - The loop returns once the shutdown future resolves
//! - A `Stopped` event is emitted on shutdown

mod common;

use std::time::Duration;

use common::*;
use storewatch_core::MonitorEngine;
use storewatch_core::engine::EngineEvent;
use storewatch_core::traits::AppMetadata;

fn store_and_probe() -> (RecordingStore, ScriptedProbe) {
    let store = RecordingStore::new(vec![tracked("1", "ready", "2020-01-01", "", "com.app")]);
    let probe =
        ScriptedProbe::new().listed("com.app", AppMetadata::empty().with_released("2020-01-01"));
    (store, probe)
}

#[tokio::test(start_paused = true)]
async fn runs_once_per_period_until_shutdown() {
    let (store, probe) = store_and_probe();
    let stats = store.stats();

    let (engine, mut events) =
        MonitorEngine::new(Box::new(probe), Box::new(store), test_config()).unwrap();

    let result = engine
        .run_until(
            Duration::from_secs(60),
            tokio::time::sleep(Duration::from_secs(150)),
        )
        .await;

    assert!(result.is_ok());
    // t = 0, 60, 120
    assert_eq!(stats.read_calls(), 3);

    let mut completed = 0;
    let mut stopped = false;
    while let Ok(event) = events.try_recv() {
        match event {
            EngineEvent::RunCompleted { .. } => completed += 1,
            EngineEvent::Stopped { .. } => stopped = true,
            _ => {}
        }
    }
    assert_eq!(completed, 3);
    assert!(stopped, "Stopped event should be emitted");
}

#[tokio::test(start_paused = true)]
async fn failed_runs_do_not_stop_the_loop() {
    let (store, probe) = store_and_probe();
    let stats = store.stats();
    stats.fail(FailPoint::Read);

    let (engine, _events) =
        MonitorEngine::new(Box::new(probe), Box::new(store), test_config()).unwrap();

    let result = engine
        .run_until(
            Duration::from_secs(60),
            tokio::time::sleep(Duration::from_secs(90)),
        )
        .await;

    assert!(result.is_ok());
    assert_eq!(stats.read_calls(), 2);
    assert_eq!(stats.cell_calls(), 0);
}

#[tokio::test]
async fn shutdown_signal_terminates_loop() {
    let (store, probe) = store_and_probe();
    let stats = store.stats();

    let (engine, _events) =
        MonitorEngine::new(Box::new(probe), Box::new(store), test_config()).unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = shutdown_tx.send(());
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        engine.run_until(Duration::from_secs(3600), async {
            let _ = shutdown_rx.await;
        }),
    )
    .await;

    assert!(result.is_ok(), "Engine should stop within 5 seconds");
    assert!(result.unwrap().is_ok());
    assert_eq!(stats.read_calls(), 1, "only the immediate first run happens");
}
