//! Cycle-level reporting types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::core::signal::{Endpoint, SignalId};

/// How a scan cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Readings were committed to the store.
    Committed,
    /// Nothing to scan; no store call was made.
    NoOp,
    /// Shutdown interrupted the reads; completed groups were committed.
    Cancelled,
}

/// Something unexpected that was dropped instead of persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// The transport returned a tag no signal is configured for.
    UnmatchedTag { endpoint: Endpoint, tag: String },
    /// A second result arrived for a signal already mapped this cycle.
    DuplicateTag {
        endpoint: Endpoint,
        tag: String,
        signal_id: SignalId,
    },
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnmatchedTag { endpoint, tag } => {
                write!(f, "unmatched tag '{}' from {}", tag, endpoint)
            }
            Self::DuplicateTag {
                endpoint,
                tag,
                signal_id,
            } => write!(
                f,
                "duplicate result for tag '{}' (signal {}) from {}",
                tag, signal_id, endpoint
            ),
        }
    }
}

/// Summary of one scan cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Cycle start time; every reading of the cycle carries it.
    pub timestamp: DateTime<Utc>,
    pub outcome: CycleOutcome,
    /// Signals in the directory snapshot.
    pub signals_total: usize,
    /// Signals skipped for lacking an endpoint or tag.
    pub signals_excluded: usize,
    pub groups_attempted: usize,
    /// Groups whose connection could not be opened.
    pub groups_failed: usize,
    /// Groups not completed because of cancellation.
    pub groups_abandoned: usize,
    pub chunks_failed: usize,
    pub tags_read: usize,
    pub tags_failed: usize,
    pub readings_written: usize,
    pub anomalies: Vec<Anomaly>,
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
}

impl CycleReport {
    /// An empty report for a cycle starting at `timestamp`.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            outcome: CycleOutcome::NoOp,
            signals_total: 0,
            signals_excluded: 0,
            groups_attempted: 0,
            groups_failed: 0,
            groups_abandoned: 0,
            chunks_failed: 0,
            tags_read: 0,
            tags_failed: 0,
            readings_written: 0,
            anomalies: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.outcome == CycleOutcome::NoOp
    }

    /// One-line summary suitable for logs.
    pub fn summary(&self) -> String {
        format!(
            "groups={} failed={} tags_ok={} tags_failed={} written={} anomalies={} ({}ms)",
            self.groups_attempted,
            self.groups_failed,
            self.tags_read,
            self.tags_failed,
            self.readings_written,
            self.anomalies.len(),
            self.elapsed.as_millis()
        )
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
