//! Batch tag reader.
//!
//! Reads one connection group: one connection, sequential chunked reads,
//! failures isolated per chunk and per connection. Every requested tag comes
//! back as exactly one [`ReadResult`], in request order.

use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::core::data::{ReadResult, ReadStatus, TagResponse};
use crate::core::error::ScanError;
use crate::core::signal::Endpoint;
use crate::core::traits::TagTransport;

/// Default maximum number of tags per read request.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Reader tuning.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Maximum tags per request.
    pub chunk_size: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub close_timeout: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(3),
            close_timeout: Duration::from_secs(1),
        }
    }
}

impl ReaderConfig {
    /// Set chunk size (clamped to at least 1).
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// A chunk whose batched read failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub tags: usize,
    pub error: String,
}

/// Everything a group read produced.
#[derive(Debug, Clone)]
pub struct GroupReadOutcome {
    pub endpoint: Endpoint,
    /// One result per requested tag (request order), followed by any
    /// unsolicited responses the transport returned.
    pub results: Vec<ReadResult>,
    /// Set when the connection could not be opened.
    pub connection_error: Option<String>,
    pub failed_chunks: Vec<ChunkFailure>,
}

impl GroupReadOutcome {
    pub fn is_connection_failed(&self) -> bool {
        self.connection_error.is_some()
    }
}

/// Reads connection groups in bounded chunks.
#[derive(Debug, Clone, Default)]
pub struct BatchReader {
    config: ReaderConfig,
}

impl BatchReader {
    pub fn new(config: ReaderConfig) -> Self {
        let config = ReaderConfig {
            chunk_size: config.chunk_size.max(1),
            ..config
        };
        Self { config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Read all `tags` from `endpoint` over one connection.
    ///
    /// Never fails as a whole: connection and chunk failures are folded into
    /// the returned results.
    pub async fn read_group(
        &self,
        transport: &dyn TagTransport,
        endpoint: &Endpoint,
        tags: &[String],
    ) -> GroupReadOutcome {
        let mut outcome = GroupReadOutcome {
            endpoint: endpoint.clone(),
            results: Vec::with_capacity(tags.len()),
            connection_error: None,
            failed_chunks: Vec::new(),
        };

        let opened = match timeout(self.config.connect_timeout, transport.open(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::timeout("connect", self.config.connect_timeout)),
        };

        let mut conn = match opened {
            Ok(conn) => conn,
            Err(e) => {
                let status = if e.is_no_transport() {
                    ReadStatus::NoTransport
                } else {
                    ReadStatus::ConnectionError
                };
                let message = e.to_string();
                outcome.results = tags
                    .iter()
                    .map(|tag| ReadResult::failed(tag.as_str(), status, message.as_str()))
                    .collect();
                outcome.connection_error = Some(message);
                return outcome;
            }
        };

        for (chunk_index, chunk) in tags.chunks(self.config.chunk_size).enumerate() {
            let read = match timeout(self.config.read_timeout, conn.read(chunk)).await {
                Ok(result) => result,
                Err(_) => Err(ScanError::timeout("chunk read", self.config.read_timeout)),
            };

            match read {
                Ok(responses) => outcome.results.extend(reconcile_chunk(chunk, responses)),
                Err(e) => {
                    let message = e.to_string();
                    outcome.results.extend(
                        chunk
                            .iter()
                            .map(|tag| ReadResult::failed(tag.as_str(), ReadStatus::ChunkError, message.as_str())),
                    );
                    outcome.failed_chunks.push(ChunkFailure {
                        chunk_index,
                        tags: chunk.len(),
                        error: message,
                    });
                }
            }
        }

        match timeout(self.config.close_timeout, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(endpoint = %endpoint, error = %e, "Close failed"),
            Err(_) => debug!(endpoint = %endpoint, "Close timed out"),
        }

        outcome
    }
}

/// Line up a chunk's responses with the tags that were requested.
///
/// Each requested tag takes the first response carrying its name (exact
/// match first, then ASCII case-insensitive since controller tag names are
/// case-insensitive). Requested tags with no response become `ChunkError`.
/// Unconsumed responses are appended after the requested ones.
fn reconcile_chunk(requested: &[String], responses: Vec<TagResponse>) -> Vec<ReadResult> {
    let mut pending: Vec<Option<TagResponse>> = responses.into_iter().map(Some).collect();
    let mut results = Vec::with_capacity(requested.len());

    for (i, tag) in requested.iter().enumerate() {
        // Fast path: response in the requested position.
        let aligned = matches!(pending.get(i), Some(Some(r)) if r.tag == *tag);
        let slot = if aligned {
            Some(i)
        } else {
            pending
                .iter()
                .position(|r| matches!(r, Some(r) if r.tag == *tag))
                .or_else(|| {
                    pending
                        .iter()
                        .position(|r| matches!(r, Some(r) if r.tag.eq_ignore_ascii_case(tag)))
                })
        };

        match slot.and_then(|idx| pending[idx].take()) {
            Some(mut response) => {
                response.tag = tag.clone();
                results.push(ReadResult::from_response(response));
            }
            None => results.push(ReadResult::failed(
                tag.as_str(),
                ReadStatus::ChunkError,
                "tag missing from response",
            )),
        }
    }

    results.extend(pending.into_iter().flatten().map(ReadResult::from_response));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::simulated::{SimulatedDevice, SimulatedTransport};

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reconcile_in_order() {
        let requested = tags(&["a", "b"]);
        let results = reconcile_chunk(&requested, vec![TagResponse::ok("a", 1.0), TagResponse::ok("b", 2.0)]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tag(), "a");
        assert_eq!(results[1].value(), Some(2.0));
    }

    #[test]
    fn test_reconcile_out_of_order_and_case() {
        let requested = tags(&["Motor_Amp", "Motor_Temp"]);
        let responses = vec![TagResponse::ok("motor_temp", 55.0), TagResponse::ok("Motor_Amp", 12.0)];

        let results = reconcile_chunk(&requested, responses);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tag(), "Motor_Amp");
        assert_eq!(results[0].value(), Some(12.0));
        assert_eq!(results[1].tag(), "Motor_Temp");
        assert_eq!(results[1].value(), Some(55.0));
    }

    #[test]
    fn test_reconcile_missing_and_extra() {
        let requested = tags(&["a", "b"]);
        let responses = vec![TagResponse::ok("a", 1.0), TagResponse::ok("ghost", 9.0)];

        let results = reconcile_chunk(&requested, responses);

        assert_eq!(results.len(), 3);
        assert_eq!(results[1].tag(), "b");
        assert_eq!(results[1].status(), ReadStatus::ChunkError);
        assert_eq!(results[2].tag(), "ghost");
    }

    #[tokio::test]
    async fn test_read_group_chunks_requests() {
        let endpoint = Endpoint::new("host1", 0);
        let mut device = SimulatedDevice::new();
        let names: Vec<String> = (0..45).map(|i| format!("T[{}]", i)).collect();
        for (i, name) in names.iter().enumerate() {
            device = device.with_value(name, i as f64);
        }
        let transport = SimulatedTransport::new().with_device(endpoint.clone(), device);
        let reader = BatchReader::new(ReaderConfig::default().with_chunk_size(20));

        let outcome = reader.read_group(&transport, &endpoint, &names).await;

        assert_eq!(outcome.results.len(), 45);
        assert!(outcome.results.iter().all(|r| r.is_success()));
        assert_eq!(transport.chunk_sizes(&endpoint), vec![20, 20, 5]);
        assert_eq!(transport.opens(&endpoint), 1);
        assert_eq!(transport.closes(&endpoint), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_marks_all_tags() {
        let endpoint = Endpoint::new("host2", 0);
        let transport = SimulatedTransport::new().with_device(endpoint.clone(), SimulatedDevice::unreachable());
        let reader = BatchReader::default();

        let outcome = reader.read_group(&transport, &endpoint, &tags(&["x", "y"])).await;

        assert!(outcome.is_connection_failed());
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.status() == ReadStatus::ConnectionError && r.value().is_none()));
        assert!(transport.chunk_sizes(&endpoint).is_empty());
    }

    #[tokio::test]
    async fn test_failed_chunk_is_isolated() {
        let endpoint = Endpoint::new("host1", 0);
        let device = SimulatedDevice::new()
            .with_value("a", 1.0)
            .with_value("b", 2.0)
            .with_value("c", 3.0)
            .failing_on("b");
        let transport = SimulatedTransport::new().with_device(endpoint.clone(), device);
        let reader = BatchReader::new(ReaderConfig::default().with_chunk_size(1));

        let outcome = reader.read_group(&transport, &endpoint, &tags(&["a", "b", "c"])).await;

        let statuses: Vec<_> = outcome.results.iter().map(|r| r.status()).collect();
        assert_eq!(
            statuses,
            vec![ReadStatus::Success, ReadStatus::ChunkError, ReadStatus::Success]
        );
        assert_eq!(outcome.failed_chunks.len(), 1);
        assert_eq!(outcome.failed_chunks[0].chunk_index, 1);
        assert_eq!(transport.closes(&endpoint), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_chunk_times_out() {
        let endpoint = Endpoint::new("host1", 0);
        let device = SimulatedDevice::new()
            .with_value("a", 1.0)
            .with_latency(Duration::from_secs(10));
        let transport = SimulatedTransport::new().with_device(endpoint.clone(), device);
        let reader = BatchReader::new(
            ReaderConfig::default()
                .with_connect_timeout(Duration::from_secs(30))
                .with_read_timeout(Duration::from_secs(2)),
        );

        let outcome = reader.read_group(&transport, &endpoint, &tags(&["a"])).await;

        assert_eq!(outcome.results[0].status(), ReadStatus::ChunkError);
        assert!(outcome.failed_chunks[0].error.contains("timed out"));
    }
}
