//! Result mapping.
//!
//! Resolves raw read results back onto signal identities through the
//! per-cycle [`SignalIndex`]. Results that resolve to nothing, or to a signal
//! already served this cycle, are dropped and reported as anomalies.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::core::data::{ReadResult, Reading};
use crate::core::report::Anomaly;
use crate::core::signal::{Endpoint, SignalId};
use crate::scan::grouper::SignalIndex;

/// Accumulated mapping output for one cycle.
#[derive(Debug, Clone, Default)]
pub struct MappedResults {
    pub readings: Vec<Reading>,
    pub anomalies: Vec<Anomaly>,
    /// Matched results that succeeded.
    pub tags_read: usize,
    /// Matched results that failed.
    pub tags_failed: usize,
}

/// Maps read results to readings, one group at a time.
pub struct ResultMapper<'a> {
    index: &'a SignalIndex,
    timestamp: DateTime<Utc>,
    mapped: HashSet<SignalId>,
    out: MappedResults,
}

impl<'a> ResultMapper<'a> {
    /// Create a mapper stamping every reading with `timestamp`.
    pub fn new(index: &'a SignalIndex, timestamp: DateTime<Utc>) -> Self {
        Self {
            index,
            timestamp,
            mapped: HashSet::new(),
            out: MappedResults::default(),
        }
    }

    /// Map the results read from `endpoint`.
    pub fn map_group(&mut self, endpoint: &Endpoint, results: &[ReadResult]) {
        for result in results {
            let signal_ids = match self.index.lookup(endpoint, result.tag()) {
                Some(ids) => ids,
                None => {
                    self.out.anomalies.push(Anomaly::UnmatchedTag {
                        endpoint: endpoint.clone(),
                        tag: result.tag().to_string(),
                    });
                    continue;
                }
            };

            let mut matched = false;
            for &signal_id in signal_ids {
                if !self.mapped.insert(signal_id) {
                    self.out.anomalies.push(Anomaly::DuplicateTag {
                        endpoint: endpoint.clone(),
                        tag: result.tag().to_string(),
                        signal_id,
                    });
                    continue;
                }
                self.out
                    .readings
                    .push(Reading::from_result(signal_id, result, self.timestamp));
                matched = true;
            }

            if matched {
                if result.is_success() {
                    self.out.tags_read += 1;
                } else {
                    self.out.tags_failed += 1;
                }
            }
        }
    }

    /// Number of readings produced so far.
    pub fn reading_count(&self) -> usize {
        self.out.readings.len()
    }

    pub fn finish(self) -> MappedResults {
        self.out
    }
}

/// Map the results of a single group.
pub fn map_results(
    index: &SignalIndex,
    endpoint: &Endpoint,
    results: &[ReadResult],
    timestamp: DateTime<Utc>,
) -> MappedResults {
    let mut mapper = ResultMapper::new(index, timestamp);
    mapper.map_group(endpoint, results);
    mapper.finish()
}
