//! Legacy device list import.
//!
//! Older deployments kept one record per controller tag in a flat
//! `devices.json` list and typed each tag by name. These helpers map that
//! data onto the catalog.

use std::collections::HashSet;

use serde::Deserialize;

use crate::core::error::Result;
use crate::core::signal::{parse_endpoint, Endpoint, Metric};

use super::directory::Catalog;
use super::model::Device;

/// Metric implied by a tag name: tags mentioning `Amp` carry current,
/// everything else temperature.
pub fn metric_from_tag(tag: &str) -> Metric {
    if tag.contains("Amp") {
        Metric::Current
    } else {
        Metric::Temperature
    }
}

/// Metric implied by a legacy free-text type field.
///
/// Text starting with `amp` or `temp` (any case) maps accordingly; blank or
/// unrecognized text defaults to current.
pub fn metric_from_legacy_type(legacy_type: Option<&str>) -> Metric {
    let t = legacy_type.unwrap_or("").trim().to_ascii_lowercase();
    if t.starts_with("temp") {
        Metric::Temperature
    } else {
        Metric::Current
    }
}

/// One entry of a legacy `devices.json` list.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceListEntry {
    pub ip: String,
    #[serde(default)]
    pub slot: u16,
    pub tags: Vec<String>,
}

/// What an import created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub devices_created: usize,
    pub signals_created: usize,
    pub signals_existing: usize,
}

/// Import a device list: one device per endpoint, one signal per tag.
///
/// Devices land in the placeholder zone. Tags already bound on the endpoint's
/// device are left alone, so re-running an import creates nothing.
pub fn import_device_list(catalog: &Catalog, entries: &[DeviceListEntry]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for entry in entries {
        let endpoint = parse_endpoint(&entry.ip).map(|ep| Endpoint::new(ep.host, entry.slot))?;
        let device_id = match catalog.device_at(&endpoint)? {
            Some(id) => id,
            None => {
                let zone = catalog.ensure_path(None, None, None)?;
                let id = catalog.next_device_id()?;
                catalog.add_device(Device::new(id.0, endpoint.to_string(), Some(endpoint.clone()), zone))?;
                summary.devices_created += 1;
                id
            }
        };

        let mut bound: HashSet<String> = catalog
            .signals_of(device_id)?
            .into_iter()
            .map(|s| s.tag)
            .collect();
        for tag in &entry.tags {
            let tag = tag.trim();
            if tag.is_empty() {
                continue;
            }
            if !bound.insert(tag.to_string()) {
                summary.signals_existing += 1;
                continue;
            }
            let id = catalog.next_signal_id()?;
            catalog.add_signal(id, device_id, metric_from_tag(tag), tag)?;
            summary.signals_created += 1;
        }
    }

    Ok(summary)
}
