//! Legacy data backfill.
//!
//! Older records described each device with free-text location fields plus
//! a single tag and type, and stored readings against the device instead of
//! a signal. The backfill maps that data onto the normalized catalog:
//!
//! 1. Location text becomes `Division / Area / Zone` entities, with blank
//!    levels mapped to the "Unassigned" placeholder.
//! 2. Missing devices are created and their legacy tag becomes a signal.
//! 3. Every reading without a signal is assigned the `(device, metric)`
//!    signal, creating it (tag `VDF{device}_{metric}`) when needed.
//!
//! Readings that point at no known device are counted as orphaned and left
//! untouched. Running the backfill again creates nothing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::Result;
use crate::core::signal::{parse_endpoint, DeviceId, Endpoint, Metric, SignalId};

use super::directory::Catalog;
use super::import::metric_from_legacy_type;
use super::model::Device;

/// A device record with legacy free-text fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyDevice {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub slot: u16,
    #[serde(default)]
    pub division: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub tag: String,
    /// Legacy type text ("Amp", "Temp", or blank).
    #[serde(default, rename = "type")]
    pub legacy_type: String,
}

impl LegacyDevice {
    fn metric(&self) -> Metric {
        metric_from_legacy_type(Some(&self.legacy_type))
    }

    fn endpoint(&self) -> Option<Endpoint> {
        match parse_endpoint(&self.ip) {
            Ok(ep) => Some(Endpoint::new(ep.host, self.slot)),
            Err(e) => {
                debug!(device = self.id, error = %e, "Legacy device has no usable address");
                None
            }
        }
    }

    fn display_name(&self) -> String {
        let name = self.name.trim();
        if !name.is_empty() {
            name.to_string()
        } else if !self.tag.trim().is_empty() {
            self.tag.trim().to_string()
        } else {
            format!("VDF{}", self.id)
        }
    }
}

/// A reading stored against a device rather than a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyReading {
    pub id: u64,
    #[serde(default)]
    pub device: Option<u32>,
    #[serde(default)]
    pub signal: Option<SignalId>,
    #[serde(default)]
    pub value: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: String,
}

/// A legacy export: devices plus readings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyExport {
    #[serde(default)]
    pub devices: Vec<LegacyDevice>,
    #[serde(default)]
    pub readings: Vec<LegacyReading>,
}

/// What a backfill run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub divisions_created: usize,
    pub areas_created: usize,
    pub zones_created: usize,
    pub devices_created: usize,
    pub signals_created: usize,
    pub readings_assigned: usize,
    pub readings_already_assigned: usize,
    pub readings_orphaned: usize,
}

impl BackfillSummary {
    /// True if the run changed nothing.
    pub fn is_noop(&self) -> bool {
        self.divisions_created == 0
            && self.areas_created == 0
            && self.zones_created == 0
            && self.devices_created == 0
            && self.signals_created == 0
            && self.readings_assigned == 0
    }
}

/// Run the backfill, assigning signals to `export.readings` in place.
pub fn backfill(catalog: &Catalog, export: &mut LegacyExport) -> Result<BackfillSummary> {
    let before = catalog.counts()?;
    let mut summary = BackfillSummary::default();
    let mut legacy: HashMap<u32, &LegacyDevice> = HashMap::new();

    for device in &export.devices {
        legacy.insert(device.id, device);
        let id = DeviceId(device.id);

        if catalog.device(id)?.is_none() {
            let zone = catalog.ensure_path(Some(&device.division), Some(&device.area), Some(&device.zone))?;
            catalog.add_device(Device::new(device.id, device.display_name(), device.endpoint(), zone))?;
        }

        let tag = device.tag.trim();
        if !tag.is_empty() {
            let bound = catalog.signals_of(id)?.iter().any(|s| s.tag == tag);
            if !bound && catalog.find_signal(id, device.metric())?.is_none() {
                let signal_id = catalog.next_signal_id()?;
                catalog.add_signal(signal_id, id, device.metric(), tag)?;
            }
        }
    }

    for reading in export.readings.iter_mut() {
        if reading.signal.is_some() {
            summary.readings_already_assigned += 1;
            continue;
        }
        let device_id = match reading.device {
            Some(id) if catalog.device(DeviceId(id))?.is_some() => DeviceId(id),
            _ => {
                summary.readings_orphaned += 1;
                continue;
            }
        };

        let metric = legacy
            .get(&device_id.0)
            .map_or(Metric::Current, |d| d.metric());
        let signal_id = match catalog.find_signal(device_id, metric)? {
            Some(signal) => signal.id,
            None => {
                let tag = legacy
                    .get(&device_id.0)
                    .map(|d| d.tag.trim())
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("VDF{}_{}", device_id, metric.code()));
                let signal_id = catalog.next_signal_id()?;
                catalog.add_signal(signal_id, device_id, metric, &tag)?;
                signal_id
            }
        };

        reading.signal = Some(signal_id);
        summary.readings_assigned += 1;
    }

    let after = catalog.counts()?;
    summary.divisions_created = after.divisions - before.divisions;
    summary.areas_created = after.areas - before.areas;
    summary.zones_created = after.zones - before.zones;
    summary.devices_created = after.devices - before.devices;
    summary.signals_created = after.signals - before.signals;

    if summary.readings_orphaned > 0 {
        warn!(orphaned = summary.readings_orphaned, "Readings reference unknown devices");
    }
    Ok(summary)
}
