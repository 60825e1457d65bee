//! In-memory reading store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::core::data::Reading;
use crate::core::error::{Result, ScanError};
use crate::core::signal::SignalId;

use super::traits::{validate_batch, ReadingStore};

#[derive(Default)]
struct History {
    readings: Vec<Reading>,
    /// signal -> index into `readings` of its newest reading
    latest: HashMap<SignalId, usize>,
}

/// In-memory append-only history.
///
/// Each batch is applied under one write lock, so readers never observe a
/// partially appended cycle.
///
/// # Example
///
/// ```rust
/// use tagscan::store::MemoryStore;
///
/// let store = MemoryStore::new();
/// assert_eq!(store.append_count(), 0);
/// ```
pub struct MemoryStore {
    history: RwLock<History>,
    append_calls: AtomicUsize,
    failing: AtomicBool,
    latency: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            history: RwLock::new(History::default()),
            append_calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            latency: Duration::ZERO,
        }
    }

    /// Delay every append by `latency` before it is applied.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make subsequent appends fail without writing anything.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `append_readings` calls, successful or not.
    pub fn append_count(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    /// Newest reading of a signal.
    pub async fn latest(&self, signal_id: SignalId) -> Option<Reading> {
        let history = self.history.read().await;
        history
            .latest
            .get(&signal_id)
            .and_then(|&idx| history.readings.get(idx))
            .cloned()
    }

    /// Every reading of a signal, oldest first.
    pub async fn history(&self, signal_id: SignalId) -> Vec<Reading> {
        self.history
            .read()
            .await
            .readings
            .iter()
            .filter(|r| r.signal_id == signal_id)
            .cloned()
            .collect()
    }

    /// Every stored reading in append order.
    pub async fn all_readings(&self) -> Vec<Reading> {
        self.history.read().await.readings.clone()
    }

    pub async fn len(&self) -> usize {
        self.history.read().await.readings.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.history.read().await.readings.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn append_readings(&self, timestamp: DateTime<Utc>, readings: &[Reading]) -> Result<()> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ScanError::Store("memory store is failing".into()));
        }
        validate_batch(timestamp, readings)?;

        let mut history = self.history.write().await;
        for reading in readings {
            let idx = history.readings.len();
            history.readings.push(reading.clone());
            history.latest.insert(reading.signal_id, idx);
        }
        Ok(())
    }
}
