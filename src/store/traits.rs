//! ReadingStore trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::data::Reading;
use crate::core::error::Result;

/// Append-only sink for historical readings.
///
/// The scan engine calls `append_readings` at most once per cycle with every
/// reading of that cycle. Implementations must apply the batch atomically:
/// either all readings become visible or none do.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Append one cycle's readings.
    ///
    /// # Arguments
    ///
    /// * `timestamp` - The cycle timestamp every reading carries
    /// * `readings` - The readings to persist, in mapping order
    async fn append_readings(&self, timestamp: DateTime<Utc>, readings: &[Reading]) -> Result<()>;
}

/// Reject a batch that breaks the cycle contract.
pub(crate) fn validate_batch(timestamp: DateTime<Utc>, readings: &[Reading]) -> Result<()> {
    use crate::core::error::ScanError;

    for reading in readings {
        if reading.timestamp != timestamp {
            return Err(ScanError::Store(format!(
                "reading for signal {} carries {} instead of cycle timestamp {}",
                reading.signal_id, reading.timestamp, timestamp
            )));
        }
        if !reading.is_consistent() {
            return Err(ScanError::Store(format!(
                "reading for signal {} has status {} with value {:?}",
                reading.signal_id, reading.status, reading.value
            )));
        }
    }
    Ok(())
}
