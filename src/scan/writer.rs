//! Reading writer.
//!
//! Buffers a cycle's readings and commits them with a single append.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::timeout;

use crate::core::data::Reading;
use crate::core::error::{Result, ScanError};
use crate::store::ReadingStore;

/// Cycle-scoped buffer in front of the historical store.
#[derive(Debug)]
pub struct ReadingWriter {
    timestamp: DateTime<Utc>,
    buffer: Vec<Reading>,
    commit_timeout: Duration,
}

impl ReadingWriter {
    pub fn new(timestamp: DateTime<Utc>, commit_timeout: Duration) -> Self {
        Self {
            timestamp,
            buffer: Vec::new(),
            commit_timeout,
        }
    }

    /// Add readings to the pending commit.
    pub fn extend(&mut self, readings: impl IntoIterator<Item = Reading>) {
        self.buffer.extend(readings);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Commit every buffered reading as one append.
    ///
    /// Returns the number of readings written. An empty buffer is a no-op
    /// that never touches the store. On failure nothing from this writer is
    /// persisted and the error is always `ScanError::Store`.
    ///
    /// A timed-out append is dropped mid-flight; stores must treat a dropped
    /// `append_readings` future as a discarded batch.
    pub async fn commit(self, store: &dyn ReadingStore) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        match timeout(self.commit_timeout, store.append_readings(self.timestamp, &self.buffer)).await {
            Ok(Ok(())) => Ok(self.buffer.len()),
            Ok(Err(ScanError::Store(msg))) => Err(ScanError::Store(msg)),
            Ok(Err(e)) => Err(ScanError::Store(e.to_string())),
            Err(_) => Err(ScanError::Store(
                ScanError::timeout("commit", self.commit_timeout).to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::ReadResult;
    use crate::core::signal::SignalId;
    use crate::store::MemoryStore;

    fn reading(id: u32, ts: DateTime<Utc>) -> Reading {
        Reading::from_result(SignalId(id), &ReadResult::success("t", id as f64), ts)
    }

    #[tokio::test]
    async fn test_commit_appends_once() {
        let store = MemoryStore::new();
        let ts = Utc::now();
        let mut writer = ReadingWriter::new(ts, Duration::from_secs(1));
        writer.extend([reading(1, ts), reading(2, ts)]);

        let written = writer.commit(&store).await.unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.append_count(), 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_empty_commit_is_noop() {
        let store = MemoryStore::new();
        let writer = ReadingWriter::new(Utc::now(), Duration::from_secs(1));

        assert_eq!(writer.commit(&store).await.unwrap(), 0);
        assert_eq!(store.append_count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_discards_all() {
        let store = MemoryStore::new();
        store.set_failing(true);
        let ts = Utc::now();
        let mut writer = ReadingWriter::new(ts, Duration::from_secs(1));
        writer.extend([reading(1, ts), reading(2, ts)]);

        let err = writer.commit(&store).await.unwrap_err();

        assert!(matches!(err, ScanError::Store(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_timeout_is_store_error() {
        let store = MemoryStore::new().with_latency(Duration::from_secs(60));
        let ts = Utc::now();
        let mut writer = ReadingWriter::new(ts, Duration::from_secs(2));
        writer.extend([reading(1, ts)]);

        let err = writer.commit(&store).await.unwrap_err();

        assert!(matches!(err, ScanError::Store(ref m) if m.contains("timed out")));
        assert!(store.is_empty().await);
    }
}
