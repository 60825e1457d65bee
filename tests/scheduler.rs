//! Scheduler behavior under virtual time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use tagscan::catalog::{Catalog, Device};
use tagscan::prelude::*;
use tagscan::protocols::{SimulatedDevice, SimulatedTransport};
use tagscan::scan::{ReaderConfig, SchedulerState};

fn plc() -> Endpoint {
    Endpoint::new("10.107.210.111", 0)
}

fn one_signal_catalog() -> Arc<Catalog> {
    let catalog = Catalog::new();
    let zone = catalog.ensure_path(Some("Mina"), Some("Chancado"), Some("CC01")).unwrap();
    catalog.add_device(Device::new(1, "CC01", Some(plc()), zone)).unwrap();
    catalog
        .add_signal(SignalId(1), DeviceId(1), Metric::Current, "VDF_CC01_Corrientes[0]")
        .unwrap();
    Arc::new(catalog)
}

fn transport(latency: Duration) -> Arc<SimulatedTransport> {
    Arc::new(SimulatedTransport::new().with_device(
        plc(),
        SimulatedDevice::new()
            .with_value("VDF_CC01_Corrientes[0]", 12.5)
            .with_latency(latency),
    ))
}

fn engine(transport: Arc<SimulatedTransport>, store: Arc<MemoryStore>) -> Arc<ScanEngine> {
    let reader = ReaderConfig::default()
        .with_connect_timeout(Duration::from_secs(120))
        .with_read_timeout(Duration::from_secs(120));
    Arc::new(ScanEngine::new(
        one_signal_catalog(),
        transport,
        store,
        EngineConfig::default().with_reader(reader),
    ))
}

fn config(interval_secs: u64, grace_secs: u64) -> SchedulerConfig {
    SchedulerConfig {
        interval: Duration::from_secs(interval_secs),
        shutdown_grace: Duration::from_secs(grace_secs),
    }
}

async fn next(events: &mut broadcast::Receiver<SchedulerEvent>) -> SchedulerEvent {
    events.recv().await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_slow_cycle_skips_tick() {
    // Open and read take 50s each, so the cycle spans the 60s tick.
    let store = Arc::new(MemoryStore::new());
    let mut scheduler = CycleScheduler::new(
        engine(transport(Duration::from_secs(50)), store.clone()),
        config(60, 5),
    );
    let mut events = scheduler.subscribe();
    scheduler.start().unwrap();

    assert!(matches!(next(&mut events).await, SchedulerEvent::CycleStarted { .. }));
    assert!(matches!(next(&mut events).await, SchedulerEvent::TickSkipped { .. }));
    assert_eq!(scheduler.stats().cycles_started, 1);
    assert_eq!(scheduler.state(), SchedulerState::Running);

    match next(&mut events).await {
        SchedulerEvent::CycleCompleted { report } => {
            assert_eq!(report.outcome, CycleOutcome::Committed);
            assert_eq!(report.readings_written, 1);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(matches!(next(&mut events).await, SchedulerEvent::CycleStarted { .. }));

    let stats = scheduler.stats();
    assert_eq!(stats.cycles_started, 2);
    assert_eq!(stats.cycles_completed, 1);
    assert_eq!(stats.ticks_skipped, 1);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycle_recovers_on_next_tick() {
    let store = Arc::new(MemoryStore::new());
    store.set_failing(true);
    let mut scheduler = CycleScheduler::new(engine(transport(Duration::ZERO), store.clone()), config(60, 5));
    let mut events = scheduler.subscribe();
    scheduler.start().unwrap();

    assert!(matches!(next(&mut events).await, SchedulerEvent::CycleStarted { .. }));
    match next(&mut events).await {
        SchedulerEvent::CycleFailed { error } => assert!(error.contains("store"), "{}", error),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(scheduler.state(), SchedulerState::Failed);
    assert!(store.is_empty().await);

    store.set_failing(false);
    assert!(matches!(next(&mut events).await, SchedulerEvent::CycleStarted { .. }));
    assert!(matches!(next(&mut events).await, SchedulerEvent::CycleCompleted { .. }));
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(store.len().await, 1);
    assert_eq!(scheduler.stats().cycles_failed, 1);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_in_flight_reads() {
    let store = Arc::new(MemoryStore::new());
    let mut scheduler = CycleScheduler::new(
        engine(transport(Duration::from_secs(30)), store.clone()),
        config(60, 5),
    );
    let mut events = scheduler.subscribe();
    scheduler.start().unwrap();
    assert!(matches!(next(&mut events).await, SchedulerEvent::CycleStarted { .. }));

    let started = tokio::time::Instant::now();
    scheduler.stop().await;
    assert!(started.elapsed() < Duration::from_secs(5));

    match next(&mut events).await {
        SchedulerEvent::CycleCompleted { report } => {
            assert_eq!(report.outcome, CycleOutcome::Cancelled);
            assert_eq!(report.groups_abandoned, 1);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(matches!(next(&mut events).await, SchedulerEvent::Stopped));
    assert!(store.is_empty().await);
    assert!(!scheduler.is_started());
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_aborts_commit_past_grace() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_secs(100)));
    let mut scheduler = CycleScheduler::new(engine(transport(Duration::ZERO), store.clone()), config(60, 1));
    let mut events = scheduler.subscribe();
    scheduler.start().unwrap();
    assert!(matches!(next(&mut events).await, SchedulerEvent::CycleStarted { .. }));

    // Reads are instant; the cycle is now parked in its commit.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let started = tokio::time::Instant::now();
    scheduler.stop().await;
    assert!(started.elapsed() <= Duration::from_secs(2));

    assert!(matches!(next(&mut events).await, SchedulerEvent::Stopped));
    assert!(store.is_empty().await);
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(scheduler.stats().cycles_completed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let mut scheduler = CycleScheduler::new(
        engine(transport(Duration::ZERO), Arc::new(MemoryStore::new())),
        config(60, 5),
    );
    scheduler.stop().await;
    scheduler.start().unwrap();
    scheduler.stop().await;
    scheduler.stop().await;
    assert!(!scheduler.is_started());
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_triggering() {
    let transport = transport(Duration::ZERO);
    let scheduler_engine = engine(transport.clone(), Arc::new(MemoryStore::new()));
    let mut scheduler = CycleScheduler::new(scheduler_engine, config(60, 5));
    let mut events = scheduler.subscribe();
    scheduler.start().unwrap();

    assert!(matches!(next(&mut events).await, SchedulerEvent::CycleStarted { .. }));
    assert!(matches!(next(&mut events).await, SchedulerEvent::CycleCompleted { .. }));
    drop(scheduler);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(transport.opens(&plc()), 1);
    assert!(events.recv().await.is_err());
}
