//! Scan logging infrastructure.
//!
//! The engine and scheduler report diagnostic events through one pluggable
//! [`ScanLogHandler`]. The default handler forwards to `tracing`; embedding
//! applications can route events anywhere else (a database table, a metrics
//! pipeline) by implementing the trait.
//!
//! # Example
//!
//! ```ignore
//! use tagscan::core::logging::{ScanLogEvent, ScanLogHandler};
//!
//! struct MyLogHandler;
//!
//! #[async_trait]
//! impl ScanLogHandler for MyLogHandler {
//!     async fn on_log(&self, event: ScanLogEvent) {
//!         println!("[scan] {}", event.event_type());
//!     }
//! }
//!
//! let engine = ScanEngine::new(directory, transport, store, EngineConfig::default())
//!     .with_log_handler(Arc::new(MyLogHandler));
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::report::{Anomaly, CycleReport};
use crate::core::signal::Endpoint;

// ============================================================================
// Scan Log Event
// ============================================================================

/// Diagnostic event emitted during scanning.
#[derive(Debug, Clone)]
pub enum ScanLogEvent {
    /// A cycle took its directory snapshot and grouped it.
    CycleStarted {
        timestamp: DateTime<Utc>,
        signals: usize,
        groups: usize,
    },

    /// A group's connection could not be opened; all its tags failed.
    ConnectionFailed {
        endpoint: Endpoint,
        tags: usize,
        error: String,
    },

    /// One chunk read failed; only its tags failed.
    ChunkFailed {
        endpoint: Endpoint,
        chunk_index: usize,
        tags: usize,
        error: String,
    },

    /// A result was dropped instead of persisted.
    Anomaly(Anomaly),

    /// The cycle finished (committed, no-op or cancelled).
    CycleCompleted(CycleReport),

    /// The cycle was aborted; nothing was persisted.
    CycleFailed {
        timestamp: DateTime<Utc>,
        error: String,
    },

    /// A trigger fired while a cycle was still running and was skipped.
    TickSkipped { at: DateTime<Utc> },
}

impl ScanLogEvent {
    /// Get the event type as a string.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CycleStarted { .. } => "cycle_started",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::ChunkFailed { .. } => "chunk_failed",
            Self::Anomaly(_) => "anomaly",
            Self::CycleCompleted(_) => "cycle_completed",
            Self::CycleFailed { .. } => "cycle_failed",
            Self::TickSkipped { .. } => "tick_skipped",
        }
    }

    /// True for events describing a failure or anomaly.
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::ChunkFailed { .. }
                | Self::Anomaly(_)
                | Self::CycleFailed { .. }
                | Self::TickSkipped { .. }
        )
    }
}

// ============================================================================
// Scan Log Handler Trait
// ============================================================================

/// Receiver of scan log events.
#[async_trait]
pub trait ScanLogHandler: Send + Sync {
    /// Handle a log event.
    async fn on_log(&self, event: ScanLogEvent);
}

// ============================================================================
// Built-in Log Handlers
// ============================================================================

/// No-op log handler that discards all events.
pub struct NoopLogHandler;

#[async_trait]
impl ScanLogHandler for NoopLogHandler {
    async fn on_log(&self, _event: ScanLogEvent) {}
}

/// Composite log handler that forwards events to multiple handlers.
pub struct CompositeLogHandler {
    handlers: Vec<Arc<dyn ScanLogHandler>>,
}

impl CompositeLogHandler {
    /// Create a new composite handler.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler.
    #[must_use]
    pub fn add(mut self, handler: Arc<dyn ScanLogHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for CompositeLogHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanLogHandler for CompositeLogHandler {
    async fn on_log(&self, event: ScanLogEvent) {
        for handler in &self.handlers {
            handler.on_log(event.clone()).await;
        }
    }
}

/// Log handler that integrates with the `tracing` crate.
pub struct TracingLogHandler;

#[async_trait]
impl ScanLogHandler for TracingLogHandler {
    async fn on_log(&self, event: ScanLogEvent) {
        use tracing::{debug, error, info, warn};

        match &event {
            ScanLogEvent::CycleStarted {
                timestamp,
                signals,
                groups,
            } => {
                debug!(
                    timestamp = %timestamp,
                    signals = signals,
                    groups = groups,
                    "Scan cycle started"
                );
            }
            ScanLogEvent::ConnectionFailed {
                endpoint,
                tags,
                error,
            } => {
                warn!(
                    endpoint = %endpoint,
                    tags = tags,
                    error = %error,
                    "Connection failed, group marked failed"
                );
            }
            ScanLogEvent::ChunkFailed {
                endpoint,
                chunk_index,
                tags,
                error,
            } => {
                warn!(
                    endpoint = %endpoint,
                    chunk = chunk_index,
                    tags = tags,
                    error = %error,
                    "Chunk read failed"
                );
            }
            ScanLogEvent::Anomaly(anomaly) => {
                warn!(anomaly = %anomaly, "Result dropped");
            }
            ScanLogEvent::CycleCompleted(report) => {
                info!(
                    timestamp = %report.timestamp,
                    outcome = ?report.outcome,
                    groups_attempted = report.groups_attempted,
                    groups_failed = report.groups_failed,
                    tags_read = report.tags_read,
                    tags_failed = report.tags_failed,
                    readings_written = report.readings_written,
                    anomalies = report.anomalies.len(),
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Scan cycle completed"
                );
            }
            ScanLogEvent::CycleFailed { timestamp, error } => {
                error!(timestamp = %timestamp, error = %error, "Scan cycle failed");
            }
            ScanLogEvent::TickSkipped { at } => {
                warn!(at = %at, "Previous cycle still running, trigger skipped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct Recorder(Mutex<Vec<&'static str>>);

    #[async_trait]
    impl ScanLogHandler for Recorder {
        async fn on_log(&self, event: ScanLogEvent) {
            self.0.lock().await.push(event.event_type());
        }
    }

    #[tokio::test]
    async fn test_composite_forwards_to_all() {
        let a = Arc::new(Recorder(Mutex::new(Vec::new())));
        let b = Arc::new(Recorder(Mutex::new(Vec::new())));
        let composite = CompositeLogHandler::new()
            .add(a.clone())
            .add(b.clone())
            .add(Arc::new(NoopLogHandler));
        assert_eq!(composite.len(), 3);

        composite
            .on_log(ScanLogEvent::TickSkipped { at: Utc::now() })
            .await;

        assert_eq!(*a.0.lock().await, vec!["tick_skipped"]);
        assert_eq!(*b.0.lock().await, vec!["tick_skipped"]);
    }

    #[test]
    fn test_problem_classification() {
        let started = ScanLogEvent::CycleStarted {
            timestamp: Utc::now(),
            signals: 3,
            groups: 2,
        };
        assert!(!started.is_problem());

        let failed = ScanLogEvent::ConnectionFailed {
            endpoint: Endpoint::new("host2", 0),
            tags: 1,
            error: "refused".into(),
        };
        assert!(failed.is_problem());
        assert_eq!(failed.event_type(), "connection_failed");
    }
}
