//! Error types for the scan engine.
//!
//! Failures at tag and chunk granularity never surface as `ScanError` out of a
//! cycle; they are recorded as [`ReadStatus`](crate::core::data::ReadStatus)
//! values on readings. `ScanError` is what crosses component boundaries.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors produced by the scan engine and its collaborators.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The protocol capability is not available in this process.
    #[error("no transport available: {0}")]
    NoTransport(String),

    /// Endpoint unreachable or handshake failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// One batched read failed as a whole.
    #[error("chunk read error: {0}")]
    Chunk(String),

    /// The historical store rejected the cycle commit.
    #[error("store error: {0}")]
    Store(String),

    /// The signal directory snapshot could not be taken.
    #[error("directory error: {0}")]
    Directory(String),

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catalog constraint violation (duplicate tag, unknown device, ...).
    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal invariant broken (poisoned lock, task panic).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Build a timeout error for the given operation.
    pub fn timeout(operation: &'static str, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// True if the transport capability itself is missing.
    #[inline]
    pub fn is_no_transport(&self) -> bool {
        matches!(self, Self::NoTransport(_))
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
