//! JSON Lines reading store.
//!
//! One JSON object per reading, one line each. A cycle's batch is serialized
//! up front and written by a spawned task that owns the file until the batch
//! either lands completely or is truncated away again. Callers may stop
//! waiting at any point (commit timeout, shutdown abort); the task then rolls
//! the file back to its previous length instead of leaving a torn tail.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::core::data::Reading;
use crate::core::error::{Result, ScanError};

use super::traits::{validate_batch, ReadingStore};

const PENDING: u8 = 0;
const COMMITTED: u8 = 1;
const ABANDONED: u8 = 2;

/// File-backed append-only store.
pub struct JsonlStore {
    path: PathBuf,
    /// Held by the write task for the whole append, rollback included.
    write_lock: Arc<Mutex<()>>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every reading in the file. A missing file is an empty history.
    pub async fn read_all(&self) -> Result<Vec<Reading>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(ScanError::from))
            .collect()
    }

    fn encode(readings: &[Reading]) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(readings.len() * 96);
        for reading in readings {
            serde_json::to_writer(&mut buf, reading)?;
            buf.push(b'\n');
        }
        Ok(buf)
    }
}

/// Flags the append as abandoned when the caller's future is dropped before
/// the write task committed.
struct AbandonOnDrop(Arc<AtomicU8>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        let _ = self
            .0
            .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Append `buf` and fsync. The batch counts as committed only if the task
/// wins the `PENDING -> COMMITTED` transition; otherwise it is truncated off.
async fn write_batch(path: &Path, buf: &[u8], state: &AtomicU8) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    let previous_len = file.metadata().await?.len();

    let written = async {
        file.write_all(buf).await?;
        file.flush().await?;
        file.sync_data().await
    }
    .await;

    let err = match written {
        Ok(()) => match state.compare_exchange(PENDING, COMMITTED, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return Ok(()),
            Err(_) => {
                warn!(path = %path.display(), "Append abandoned by caller, rolling back");
                std::io::Error::new(std::io::ErrorKind::Interrupted, "append abandoned")
            }
        },
        Err(e) => {
            error!(path = %path.display(), error = %e, "Append failed, rolling back");
            e
        }
    };

    rollback(&mut file, path, previous_len).await;
    Err(err)
}

async fn rollback(file: &mut File, path: &Path, len: u64) {
    let truncated = async {
        file.set_len(len).await?;
        file.sync_data().await
    }
    .await;
    if let Err(e) = truncated {
        error!(path = %path.display(), error = %e, "Rollback failed");
    }
}

#[async_trait]
impl ReadingStore for JsonlStore {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn append_readings(&self, timestamp: DateTime<Utc>, readings: &[Reading]) -> Result<()> {
        validate_batch(timestamp, readings)?;
        let buf = Self::encode(readings).map_err(|e| ScanError::Store(e.to_string()))?;

        let guard = self.write_lock.clone().lock_owned().await;
        let state = Arc::new(AtomicU8::new(PENDING));
        let _abandon = AbandonOnDrop(state.clone());
        let path = self.path.clone();

        let task = tokio::spawn(async move {
            let result = write_batch(&path, &buf, &state).await;
            drop(guard);
            result
        });

        task.await
            .map_err(|e| ScanError::Store(format!("append task failed: {}", e)))?
            .map_err(|e| ScanError::Store(format!("{}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), count = readings.len(), "Readings appended");
        Ok(())
    }
}
