//! Backend factory.
//!
//! Creates the transport, store and engine described by a [`ScanConfig`].

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::core::error::{Result, ScanError};
use crate::core::metadata::get_transport_registry;
use crate::core::traits::TagTransport;
use crate::protocols::simulated::SimulatedTransport;
use crate::protocols::unavailable::UnavailableTransport;
use crate::scan::engine::ScanEngine;
use crate::store::{JsonlStore, MemoryStore, ReadingStore};

use super::ScanConfig;

/// Create the transport selected by `transport.kind`.
pub fn create_transport(config: &ScanConfig) -> Result<Arc<dyn TagTransport>> {
    let kind = &config.transport.kind;

    if kind.eq_ignore_ascii_case("simulated") {
        return Ok(Arc::new(SimulatedTransport::from_config(&config.simulated)?));
    }

    if kind.eq_ignore_ascii_case("none") {
        return Ok(Arc::new(UnavailableTransport));
    }

    Err(ScanError::Config(format!(
        "Unsupported transport: {}. Available: {}",
        kind,
        get_transport_registry().names()
    )))
}

/// Create the store selected by `store.kind`.
pub fn create_store(config: &ScanConfig) -> Result<Arc<dyn ReadingStore>> {
    let kind = &config.store.kind;

    if kind.eq_ignore_ascii_case("memory") {
        return Ok(Arc::new(MemoryStore::new()));
    }

    if kind.eq_ignore_ascii_case("jsonl") {
        let path = config
            .store
            .path
            .clone()
            .ok_or_else(|| ScanError::Config("store.path is required for the jsonl store".into()))?;
        return Ok(Arc::new(JsonlStore::new(path)));
    }

    Err(ScanError::Config(format!(
        "Unsupported store: {}. Available: memory, jsonl",
        kind
    )))
}

/// Build the catalog, transport and store, and wire them into an engine.
pub fn create_engine(config: &ScanConfig) -> Result<ScanEngine> {
    let catalog = Catalog::from_devices(&config.devices)?;
    let transport = create_transport(config)?;
    let store = create_store(config)?;

    Ok(ScanEngine::new(
        Arc::new(catalog),
        transport,
        store,
        config.scanner.engine_config(),
    ))
}
