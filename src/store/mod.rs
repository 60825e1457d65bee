//! Historical reading storage.
//!
//! This module provides the `ReadingStore` trait, the sink a scan cycle
//! commits its readings to, and two backends:
//!
//! - `MemoryStore`: in-memory history, used by tests and the `scan` command
//! - `JsonlStore`: one JSON object per line in an append-only file
//!
//! # Example
//!
//! ```rust,ignore
//! use tagscan::store::{MemoryStore, ReadingStore};
//!
//! let store = MemoryStore::new();
//! store.append_readings(timestamp, &readings).await?;
//! ```

mod jsonl;
mod memory;
mod traits;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use traits::ReadingStore;
