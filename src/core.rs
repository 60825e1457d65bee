//! Core abstractions for the scan engine.
//!
//! This module provides the data model, error type and the traits that
//! external collaborators (directory, transport, store) implement.

pub mod data;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod report;
pub mod signal;
pub mod traits;

pub use data::*;
pub use error::{Result, ScanError};
pub use report::*;
pub use signal::*;
pub use traits::*;
