//! # tagscan
//!
//! Scan cycle engine for tag-based industrial controllers.
//!
//! ## Features
//!
//! - **One connection per controller**: signals are grouped by
//!   `(host, sub_unit)` and each group is read over a single connection
//! - **Bounded requests**: tags are read in chunks (20 by default); a failed
//!   chunk or connection only degrades its own tags
//! - **Atomic cycles**: every reading of a cycle carries the cycle start
//!   timestamp and is committed in one append
//! - **Deterministic scheduling**: at most one cycle in flight, overlapping
//!   triggers are skipped and reported, clean shutdown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tagscan::prelude::*;
//!
//! let config = ScanConfig::from_file("tagscan.toml")?;
//! let engine = Arc::new(tagscan::config::factory::create_engine(&config)?);
//!
//! // One cycle
//! let report = engine.run_cycle().await?;
//! println!("{}", report.summary());
//!
//! // Or on a timer
//! let mut scheduler = CycleScheduler::new(engine, config.scanner.scheduler_config());
//! scheduler.start()?;
//! ```
//!
//! ## Collaborators
//!
//! | Seam | Trait | Built-in |
//! |------|-------|----------|
//! | Signal directory | `SignalDirectory` | `Catalog` |
//! | Controller protocol | `TagTransport` | `SimulatedTransport`, `UnavailableTransport` |
//! | Historical store | `ReadingStore` | `MemoryStore`, `JsonlStore` |

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod catalog;
pub mod config;
pub mod core;
pub mod protocols;
pub mod scan;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::catalog::Catalog;
    pub use crate::config::ScanConfig;
    pub use crate::core::{
        data::*,
        error::{Result, ScanError},
        logging::{ScanLogEvent, ScanLogHandler, TracingLogHandler},
        report::*,
        signal::*,
        traits::*,
    };
    pub use crate::scan::{CycleScheduler, EngineConfig, ScanEngine, SchedulerConfig, SchedulerEvent};
    pub use crate::store::{JsonlStore, MemoryStore, ReadingStore};
}

// Re-export core types at crate root for convenience
pub use crate::core::error::{Result, ScanError};
pub use crate::core::data::{ReadResult, ReadStatus, Reading};
pub use crate::core::report::{CycleOutcome, CycleReport};
pub use crate::core::signal::{Endpoint, Metric, SignalEntry, SignalId};
pub use crate::core::traits::{SignalDirectory, TagConnection, TagTransport};

pub use crate::scan::{CycleScheduler, ScanEngine};
pub use crate::store::{MemoryStore, ReadingStore};
