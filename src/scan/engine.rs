//! Scan cycle engine.
//!
//! One cycle: snapshot the directory, group by endpoint, read every group
//! concurrently, map results back to signals and commit one batch of
//! readings stamped with the cycle start time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::debug;

use crate::core::error::{Result, ScanError};
use crate::core::logging::{ScanLogEvent, ScanLogHandler, TracingLogHandler};
use crate::core::report::{CycleOutcome, CycleReport};
use crate::core::traits::{SignalDirectory, TagTransport};
use crate::scan::grouper::group_signals;
use crate::scan::mapper::ResultMapper;
use crate::scan::reader::{BatchReader, GroupReadOutcome, ReaderConfig};
use crate::scan::writer::ReadingWriter;
use crate::store::ReadingStore;

// ============================================================================
// Configuration
// ============================================================================

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub reader: ReaderConfig,
    /// Upper bound on groups read at the same time.
    pub max_concurrent_groups: usize,
    pub commit_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reader: ReaderConfig::default(),
            max_concurrent_groups: 8,
            commit_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    pub fn with_reader(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_max_concurrent_groups(mut self, max: usize) -> Self {
        self.max_concurrent_groups = max.max(1);
        self
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }
}

// ============================================================================
// Scan Engine
// ============================================================================

/// Runs scan cycles against a directory, a transport and a store.
pub struct ScanEngine {
    directory: Arc<dyn SignalDirectory>,
    transport: Arc<dyn TagTransport>,
    store: Arc<dyn ReadingStore>,
    reader: Arc<BatchReader>,
    config: EngineConfig,
    log_handler: Arc<dyn ScanLogHandler>,
}

impl ScanEngine {
    pub fn new(
        directory: Arc<dyn SignalDirectory>,
        transport: Arc<dyn TagTransport>,
        store: Arc<dyn ReadingStore>,
        config: EngineConfig,
    ) -> Self {
        let config = EngineConfig {
            max_concurrent_groups: config.max_concurrent_groups.max(1),
            ..config
        };
        Self {
            directory,
            transport,
            store,
            reader: Arc::new(BatchReader::new(config.reader.clone())),
            config,
            log_handler: Arc::new(TracingLogHandler),
        }
    }

    /// Replace the default `tracing` log handler.
    pub fn with_log_handler(mut self, handler: Arc<dyn ScanLogHandler>) -> Self {
        self.log_handler = handler;
        self
    }

    pub fn log_handler(&self) -> &Arc<dyn ScanLogHandler> {
        &self.log_handler
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Run one complete cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let (_never, cancel) = watch::channel(false);
        self.run_cycle_until(cancel).await
    }

    /// Run one cycle, abandoning unfinished groups once `cancel` turns true.
    ///
    /// Groups that completed before cancellation are still committed and
    /// the report is marked [`CycleOutcome::Cancelled`]. Directory and store
    /// failures abort the cycle with nothing persisted.
    pub async fn run_cycle_until(&self, mut cancel: watch::Receiver<bool>) -> Result<CycleReport> {
        let started = Instant::now();
        let timestamp = Utc::now();
        let mut report = CycleReport::new(timestamp);

        let snapshot = match self.directory.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let err = match e {
                    ScanError::Directory(_) => e,
                    other => ScanError::Directory(other.to_string()),
                };
                return Err(self.fail(timestamp, err).await);
            }
        };

        let grouping = group_signals(&snapshot);
        report.signals_total = snapshot.len();
        report.signals_excluded = grouping.excluded;

        if grouping.is_empty() {
            report.elapsed = started.elapsed();
            debug!(signals = report.signals_total, "No scannable signals, cycle is a no-op");
            self.log_handler.on_log(ScanLogEvent::CycleCompleted(report.clone())).await;
            return Ok(report);
        }

        report.groups_attempted = grouping.groups.len();
        self.log_handler
            .on_log(ScanLogEvent::CycleStarted {
                timestamp,
                signals: grouping.signal_count(),
                groups: grouping.groups.len(),
            })
            .await;

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_groups));
        let mut tasks: JoinSet<GroupReadOutcome> = JoinSet::new();
        for group in &grouping.groups {
            let permits = permits.clone();
            let transport = self.transport.clone();
            let reader = self.reader.clone();
            let endpoint = group.endpoint.clone();
            let tags = group.tags.clone();
            tasks.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = permits.acquire_owned().await.ok();
                reader.read_group(transport.as_ref(), &endpoint, &tags).await
            });
        }

        let mut mapper = ResultMapper::new(&grouping.index, timestamp);
        let mut completed = 0usize;
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;
                _ = wait_cancelled(&mut cancel), if !cancelled => {
                    debug!(pending = tasks.len(), "Cycle cancelled, abandoning unfinished groups");
                    cancelled = true;
                    tasks.abort_all();
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(outcome)) => {
                        completed += 1;
                        self.absorb(&outcome, &mut report).await;
                        mapper.map_group(&outcome.endpoint, &outcome.results);
                    }
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => {
                        let err = ScanError::Internal(format!("group task failed: {}", e));
                        return Err(self.fail(timestamp, err).await);
                    }
                },
            }
        }

        report.groups_abandoned = report.groups_attempted - completed;

        let mapped = mapper.finish();
        report.tags_read = mapped.tags_read;
        report.tags_failed = mapped.tags_failed;
        for anomaly in &mapped.anomalies {
            self.log_handler.on_log(ScanLogEvent::Anomaly(anomaly.clone())).await;
        }
        report.anomalies = mapped.anomalies;

        let mut writer = ReadingWriter::new(timestamp, self.config.commit_timeout);
        writer.extend(mapped.readings);
        report.readings_written = match writer.commit(self.store.as_ref()).await {
            Ok(written) => written,
            Err(e) => return Err(self.fail(timestamp, e).await),
        };

        report.outcome = if cancelled && report.groups_abandoned > 0 {
            CycleOutcome::Cancelled
        } else {
            CycleOutcome::Committed
        };
        report.elapsed = started.elapsed();
        self.log_handler.on_log(ScanLogEvent::CycleCompleted(report.clone())).await;

        Ok(report)
    }

    async fn absorb(&self, outcome: &GroupReadOutcome, report: &mut CycleReport) {
        if let Some(error) = &outcome.connection_error {
            report.groups_failed += 1;
            self.log_handler
                .on_log(ScanLogEvent::ConnectionFailed {
                    endpoint: outcome.endpoint.clone(),
                    tags: outcome.results.len(),
                    error: error.clone(),
                })
                .await;
        }

        report.chunks_failed += outcome.failed_chunks.len();
        for chunk in &outcome.failed_chunks {
            self.log_handler
                .on_log(ScanLogEvent::ChunkFailed {
                    endpoint: outcome.endpoint.clone(),
                    chunk_index: chunk.chunk_index,
                    tags: chunk.tags,
                    error: chunk.error.clone(),
                })
                .await;
        }
    }

    async fn fail(&self, timestamp: chrono::DateTime<Utc>, err: ScanError) -> ScanError {
        self.log_handler
            .on_log(ScanLogEvent::CycleFailed {
                timestamp,
                error: err.to_string(),
            })
            .await;
        err
    }
}

/// Resolves once `rx` holds `true`. Never resolves if the sender is gone.
pub(crate) async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
