//! Core traits at the seams of the scan engine.
//!
//! # Trait Map
//!
//! ```text
//! External collaborators consumed by the core
//! ├── SignalDirectory   // immutable snapshot of signals per cycle
//! ├── TagTransport      // open(endpoint) -> TagConnection
//! │   └── TagConnection // read(tags) -> ordered responses, close()
//! └── ReadingStore      // append-only sink (see crate::store)
//! ```
//!
//! All traits use `async_trait` because the engine holds them as trait
//! objects (`Arc<dyn ...>`) shared across group tasks.

use async_trait::async_trait;

use crate::core::data::TagResponse;
use crate::core::error::Result;
use crate::core::signal::{Endpoint, SignalEntry};

/// Read-only access to the signals that must be scanned.
#[async_trait]
pub trait SignalDirectory: Send + Sync {
    /// Take a snapshot of all signals, in stable directory order.
    ///
    /// Called once at the start of each cycle; the returned list is treated
    /// as immutable for the rest of that cycle.
    async fn snapshot(&self) -> Result<Vec<SignalEntry>>;
}

/// Protocol capability: opens connections to controllers.
#[async_trait]
pub trait TagTransport: Send + Sync {
    /// Transport name (for logs and diagnostics).
    fn name(&self) -> &'static str;

    /// Open one connection to `endpoint`.
    ///
    /// Fails with `ScanError::Connection` when the endpoint is unreachable
    /// or the handshake fails, and with `ScanError::NoTransport` when the
    /// capability itself is unavailable.
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn TagConnection>>;
}

/// An open connection to one controller.
///
/// A connection is used by one task at a time; reads on it are sequential.
#[async_trait]
pub trait TagConnection: Send {
    /// Read a batch of tags.
    ///
    /// Returns one response per tag, normalized to an ordered list even for
    /// a single tag. Individual tag failures are reported through
    /// `TagResponse::status`; an `Err` means the whole batch failed.
    async fn read(&mut self, tags: &[String]) -> Result<Vec<TagResponse>>;

    /// Close the connection.
    async fn close(&mut self) -> Result<()>;
}
