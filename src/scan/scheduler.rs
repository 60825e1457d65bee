//! Recurring cycle scheduler.
//!
//! Owns one timer task that triggers [`ScanEngine`] cycles at a fixed
//! interval. The in-flight cycle is driven from inside the timer task, so at
//! most one cycle is ever active and stopping or dropping the scheduler
//! leaves nothing running behind it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::error::{Result, ScanError};
use crate::core::logging::ScanLogEvent;
use crate::core::report::CycleReport;
use crate::scan::engine::{wait_cancelled, ScanEngine};

/// Extra time `stop()` allows the timer task beyond the shutdown grace.
const STOP_SLACK: Duration = Duration::from_secs(1);

const EVENT_CAPACITY: usize = 64;

// ============================================================================
// State, Config, Events
// ============================================================================

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    /// The last cycle failed. Cleared by the next trigger.
    Failed,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between triggers.
    pub interval: Duration,
    /// How long `stop()` lets an in-flight cycle finish before aborting it.
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Notification broadcast to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    CycleStarted { at: DateTime<Utc> },
    CycleCompleted { report: CycleReport },
    CycleFailed { error: String },
    TickSkipped { at: DateTime<Utc> },
    Stopped,
}

/// Running counters.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    cycles_started: AtomicU64,
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    ticks_skipped: AtomicU64,
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStatsSnapshot {
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub ticks_skipped: u64,
}

impl SchedulerStats {
    pub fn snapshot(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Cycle Scheduler
// ============================================================================

type CycleFuture = Pin<Box<dyn Future<Output = Result<CycleReport>> + Send>>;

/// Handle owning the recurring trigger.
pub struct CycleScheduler {
    engine: Arc<ScanEngine>,
    config: SchedulerConfig,
    state_tx: Arc<watch::Sender<SchedulerState>>,
    state_rx: watch::Receiver<SchedulerState>,
    shutdown_tx: watch::Sender<bool>,
    events: broadcast::Sender<SchedulerEvent>,
    stats: Arc<SchedulerStats>,
    timer: Option<JoinHandle<()>>,
}

impl CycleScheduler {
    pub fn new(engine: Arc<ScanEngine>, config: SchedulerConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (shutdown_tx, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            engine,
            config,
            state_tx: Arc::new(state_tx),
            state_rx,
            shutdown_tx,
            events,
            stats: Arc::new(SchedulerStats::default()),
            timer: None,
        }
    }

    /// Start the timer. The first cycle is triggered immediately.
    pub fn start(&mut self) -> Result<()> {
        if self.timer.is_some() {
            return Err(ScanError::Internal("scheduler already started".into()));
        }
        if self.config.interval.is_zero() {
            return Err(ScanError::Config("scheduler interval must be > 0".into()));
        }

        self.shutdown_tx.send_replace(false);
        let worker = TimerLoop {
            engine: self.engine.clone(),
            config: self.config.clone(),
            state: self.state_tx.clone(),
            shutdown: self.shutdown_tx.subscribe(),
            events: self.events.clone(),
            stats: self.stats.clone(),
        };
        self.timer = Some(tokio::spawn(worker.run()));

        info!(interval_ms = self.config.interval.as_millis() as u64, "Scheduler started");
        Ok(())
    }

    /// Stop the timer and wind down the in-flight cycle.
    ///
    /// The cycle is cancelled and given `shutdown_grace` to finish; after
    /// that it is aborted. Calling `stop` on a stopped scheduler is a no-op.
    pub async fn stop(&mut self) {
        self.shutdown_tx.send_replace(true);

        if let Some(mut handle) = self.timer.take() {
            let bound = self.config.shutdown_grace + STOP_SLACK;
            if timeout(bound, &mut handle).await.is_err() {
                warn!("Scheduler did not stop in time, aborting");
                handle.abort();
                self.state_tx.send_replace(SchedulerState::Idle);
            }
            info!("Scheduler stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.timer.is_some()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    /// Receiver tracking every state transition.
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for CycleScheduler {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

// ============================================================================
// Timer Task
// ============================================================================

struct TimerLoop {
    engine: Arc<ScanEngine>,
    config: SchedulerConfig,
    state: Arc<watch::Sender<SchedulerState>>,
    shutdown: watch::Receiver<bool>,
    events: broadcast::Sender<SchedulerEvent>,
    stats: Arc<SchedulerStats>,
}

impl TimerLoop {
    async fn run(mut self) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cycle: Option<CycleFuture> = None;

        loop {
            tokio::select! {
                biased;
                _ = wait_cancelled(&mut self.shutdown) => break,
                result = next_result(&mut cycle), if cycle.is_some() => {
                    cycle = None;
                    self.finish(result);
                }
                _ = ticker.tick() => {
                    if cycle.is_some() {
                        self.skip().await;
                    } else {
                        cycle = Some(self.begin());
                    }
                }
            }
        }

        if let Some(in_flight) = cycle.take() {
            debug!("Waiting for in-flight cycle");
            match timeout(self.config.shutdown_grace, in_flight).await {
                Ok(result) => self.finish(result),
                Err(_) => {
                    warn!(
                        grace_ms = self.config.shutdown_grace.as_millis() as u64,
                        "In-flight cycle exceeded shutdown grace, aborted"
                    );
                    self.state.send_replace(SchedulerState::Idle);
                }
            }
        }

        let _ = self.events.send(SchedulerEvent::Stopped);
    }

    fn begin(&self) -> CycleFuture {
        if *self.state.borrow() == SchedulerState::Failed {
            self.state.send_replace(SchedulerState::Idle);
        }
        self.state.send_replace(SchedulerState::Running);
        self.stats.cycles_started.fetch_add(1, Ordering::Relaxed);
        let _ = self.events.send(SchedulerEvent::CycleStarted { at: Utc::now() });

        let engine = self.engine.clone();
        let cancel = self.shutdown.clone();
        Box::pin(async move { engine.run_cycle_until(cancel).await })
    }

    fn finish(&self, result: Result<CycleReport>) {
        match result {
            Ok(report) => {
                self.stats.cycles_completed.fetch_add(1, Ordering::Relaxed);
                self.state.send_replace(SchedulerState::Idle);
                let _ = self.events.send(SchedulerEvent::CycleCompleted { report });
            }
            Err(e) => {
                warn!(error = %e, "Scan cycle failed, waiting for next trigger");
                self.stats.cycles_failed.fetch_add(1, Ordering::Relaxed);
                self.state.send_replace(SchedulerState::Failed);
                let _ = self.events.send(SchedulerEvent::CycleFailed { error: e.to_string() });
            }
        }
    }

    async fn skip(&self) {
        let at = Utc::now();
        self.stats.ticks_skipped.fetch_add(1, Ordering::Relaxed);
        let _ = self.events.send(SchedulerEvent::TickSkipped { at });
        self.engine.log_handler().on_log(ScanLogEvent::TickSkipped { at }).await;
    }
}

async fn next_result(cycle: &mut Option<CycleFuture>) -> Result<CycleReport> {
    match cycle {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::protocols::simulated::SimulatedTransport;
    use crate::scan::engine::EngineConfig;
    use crate::store::MemoryStore;

    fn idle_engine() -> Arc<ScanEngine> {
        Arc::new(ScanEngine::new(
            Arc::new(Catalog::new()),
            Arc::new(SimulatedTransport::new()),
            Arc::new(MemoryStore::new()),
            EngineConfig::default(),
        ))
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(SchedulerEvent::TickSkipped {
            at: "2026-01-01T00:00:00Z".parse().unwrap(),
        })
        .unwrap();
        assert_eq!(json["type"], "tick_skipped");
        assert_eq!(serde_json::to_value(SchedulerEvent::Stopped).unwrap()["type"], "stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_fails() {
        let mut scheduler = CycleScheduler::new(idle_engine(), SchedulerConfig::default());
        scheduler.start().unwrap();
        assert!(scheduler.start().is_err());
        scheduler.stop().await;
        assert!(!scheduler.is_started());
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let mut scheduler = CycleScheduler::new(
            idle_engine(),
            SchedulerConfig {
                interval: Duration::ZERO,
                ..SchedulerConfig::default()
            },
        );
        assert!(matches!(scheduler.start(), Err(ScanError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_runs_immediately() {
        let mut scheduler = CycleScheduler::new(idle_engine(), SchedulerConfig::default());
        let mut events = scheduler.subscribe();
        scheduler.start().unwrap();

        assert!(matches!(events.recv().await.unwrap(), SchedulerEvent::CycleStarted { .. }));
        assert!(matches!(events.recv().await.unwrap(), SchedulerEvent::CycleCompleted { .. }));
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.stop().await;
        assert!(matches!(events.recv().await.unwrap(), SchedulerEvent::Stopped));
    }
}
