//! In-crate signal directory.
//!
//! [`Catalog`] holds the location hierarchy, devices and signals, enforces
//! their constraints and serves ordered snapshots to the scan engine.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::config::DeviceConfig;
use crate::core::error::{Result, ScanError};
use crate::core::signal::{parse_endpoint, DeviceId, Endpoint, Metric, SignalEntry, SignalId};
use crate::core::traits::SignalDirectory;

use super::model::{level_name, Area, AreaId, Device, Division, DivisionId, Signal, Zone, ZoneId};

#[derive(Default)]
struct CatalogInner {
    divisions: BTreeMap<DivisionId, Division>,
    areas: BTreeMap<AreaId, Area>,
    zones: BTreeMap<ZoneId, Zone>,
    devices: BTreeMap<DeviceId, Device>,
    signals: BTreeMap<SignalId, Signal>,
}

impl CatalogInner {
    fn zone_path(&self, zone: ZoneId) -> (&str, &str, &str) {
        let zone = self.zones.get(&zone);
        let area = zone.and_then(|z| self.areas.get(&z.area));
        let division = area.and_then(|a| self.divisions.get(&a.division));
        (
            division.map_or("", |d| d.name.as_str()),
            area.map_or("", |a| a.name.as_str()),
            zone.map_or("", |z| z.name.as_str()),
        )
    }
}

/// Entity counts, used to report what an operation created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub divisions: usize,
    pub areas: usize,
    pub zones: usize,
    pub devices: usize,
    pub signals: usize,
}

/// Hierarchy, devices and signals behind one lock.
#[derive(Default)]
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `[[devices]]` configuration tables.
    pub fn from_devices(devices: &[DeviceConfig]) -> Result<Self> {
        let catalog = Self::new();
        for cfg in devices {
            let zone = catalog.ensure_path(cfg.division.as_deref(), cfg.area.as_deref(), cfg.zone.as_deref())?;
            let endpoint = cfg.endpoint.as_deref().map(parse_endpoint).transpose()?;
            let mut device = Device::new(cfg.id, cfg.name.as_str(), endpoint, zone);
            device.description = cfg.description.clone();
            catalog.add_device(device)?;

            for signal in &cfg.signals {
                catalog.add_signal(SignalId(signal.id), DeviceId(cfg.id), signal.metric, signal.tag.as_str())?;
            }
        }
        Ok(catalog)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CatalogInner>> {
        self.inner
            .read()
            .map_err(|_| ScanError::Internal("catalog lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CatalogInner>> {
        self.inner
            .write()
            .map_err(|_| ScanError::Internal("catalog lock poisoned".into()))
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Get or create a division. Blank names map to the placeholder.
    pub fn ensure_division(&self, name: Option<&str>) -> Result<DivisionId> {
        let name = level_name(name);
        let mut inner = self.write()?;
        if let Some(d) = inner.divisions.values().find(|d| d.name == name) {
            return Ok(d.id);
        }
        let id = DivisionId(next_id("division", inner.divisions.keys().map(|k| k.0))?);
        inner.divisions.insert(id, Division { id, name });
        Ok(id)
    }

    pub fn ensure_area(&self, division: DivisionId, name: Option<&str>) -> Result<AreaId> {
        let name = level_name(name);
        let mut inner = self.write()?;
        if !inner.divisions.contains_key(&division) {
            return Err(ScanError::Catalog(format!("unknown division {}", division.0)));
        }
        if let Some(a) = inner
            .areas
            .values()
            .find(|a| a.division == division && a.name == name)
        {
            return Ok(a.id);
        }
        let id = AreaId(next_id("area", inner.areas.keys().map(|k| k.0))?);
        inner.areas.insert(id, Area { id, division, name });
        Ok(id)
    }

    pub fn ensure_zone(&self, area: AreaId, name: Option<&str>) -> Result<ZoneId> {
        let name = level_name(name);
        let mut inner = self.write()?;
        if !inner.areas.contains_key(&area) {
            return Err(ScanError::Catalog(format!("unknown area {}", area.0)));
        }
        if let Some(z) = inner.zones.values().find(|z| z.area == area && z.name == name) {
            return Ok(z.id);
        }
        let id = ZoneId(next_id("zone", inner.zones.keys().map(|k| k.0))?);
        inner.zones.insert(id, Zone { id, area, name });
        Ok(id)
    }

    /// Get or create the whole `division/area/zone` path.
    pub fn ensure_path(&self, division: Option<&str>, area: Option<&str>, zone: Option<&str>) -> Result<ZoneId> {
        let division = self.ensure_division(division)?;
        let area = self.ensure_area(division, area)?;
        self.ensure_zone(area, zone)
    }

    /// `division / area / zone` names of a zone.
    pub fn path_of(&self, zone: ZoneId) -> Result<(String, String, String)> {
        let inner = self.read()?;
        let (d, a, z) = inner.zone_path(zone);
        Ok((d.to_string(), a.to_string(), z.to_string()))
    }

    // ========================================================================
    // Devices and signals
    // ========================================================================

    pub fn add_device(&self, device: Device) -> Result<()> {
        let mut inner = self.write()?;
        if inner.devices.contains_key(&device.id) {
            return Err(ScanError::Catalog(format!("duplicate device id {}", device.id)));
        }
        if !inner.zones.contains_key(&device.zone) {
            return Err(ScanError::Catalog(format!(
                "device {} references unknown zone {}",
                device.id, device.zone.0
            )));
        }
        inner.devices.insert(device.id, device);
        Ok(())
    }

    /// Bind a new signal to a device. Tags are unique per device.
    pub fn add_signal(&self, id: SignalId, device: DeviceId, metric: Metric, tag: &str) -> Result<()> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(ScanError::Catalog(format!("signal {} has an empty tag", id)));
        }

        let mut inner = self.write()?;
        if !inner.devices.contains_key(&device) {
            return Err(ScanError::Catalog(format!(
                "signal {} references unknown device {}",
                id, device
            )));
        }
        if inner.signals.contains_key(&id) {
            return Err(ScanError::Catalog(format!("duplicate signal id {}", id)));
        }
        if inner
            .signals
            .values()
            .any(|s| s.device == device && s.tag == tag)
        {
            return Err(ScanError::Catalog(format!(
                "tag '{}' already bound on device {}",
                tag, device
            )));
        }

        inner.signals.insert(
            id,
            Signal {
                id,
                device,
                metric,
                tag: tag.to_string(),
            },
        );
        Ok(())
    }

    pub fn remove_signal(&self, id: SignalId) -> Result<Signal> {
        self.write()?
            .signals
            .remove(&id)
            .ok_or_else(|| ScanError::Catalog(format!("unknown signal {}", id)))
    }

    pub fn device(&self, id: DeviceId) -> Result<Option<Device>> {
        Ok(self.read()?.devices.get(&id).cloned())
    }

    /// First device (by id) connected through `endpoint`.
    pub fn device_at(&self, endpoint: &Endpoint) -> Result<Option<DeviceId>> {
        Ok(self
            .read()?
            .devices
            .values()
            .find(|d| d.endpoint.as_ref() == Some(endpoint))
            .map(|d| d.id))
    }

    pub fn next_device_id(&self) -> Result<DeviceId> {
        next_id("device", self.read()?.devices.keys().map(|k| k.0)).map(DeviceId)
    }

    /// Signals of a device, ordered by metric then tag.
    pub fn signals_of(&self, device: DeviceId) -> Result<Vec<Signal>> {
        let inner = self.read()?;
        let mut signals: Vec<Signal> = inner
            .signals
            .values()
            .filter(|s| s.device == device)
            .cloned()
            .collect();
        signals.sort_by(|a, b| (a.metric, &a.tag).cmp(&(b.metric, &b.tag)));
        Ok(signals)
    }

    /// First signal of a device carrying `metric`.
    pub fn find_signal(&self, device: DeviceId, metric: Metric) -> Result<Option<Signal>> {
        Ok(self
            .read()?
            .signals
            .values()
            .find(|s| s.device == device && s.metric == metric)
            .cloned())
    }

    /// Lowest unused signal id above every existing one.
    pub fn next_signal_id(&self) -> Result<SignalId> {
        next_id("signal", self.read()?.signals.keys().map(|k| k.0)).map(SignalId)
    }

    pub fn counts(&self) -> Result<CatalogCounts> {
        let inner = self.read()?;
        Ok(CatalogCounts {
            divisions: inner.divisions.len(),
            areas: inner.areas.len(),
            zones: inner.zones.len(),
            devices: inner.devices.len(),
            signals: inner.signals.len(),
        })
    }

    /// All signals, ordered by division, area, zone and device name, then
    /// metric and tag.
    pub fn entries(&self) -> Result<Vec<SignalEntry>> {
        let inner = self.read()?;

        let mut rows: Vec<(&Signal, &Device)> = inner
            .signals
            .values()
            .filter_map(|s| inner.devices.get(&s.device).map(|d| (s, d)))
            .collect();

        rows.sort_by(|(sa, da), (sb, db)| {
            let pa = inner.zone_path(da.zone);
            let pb = inner.zone_path(db.zone);
            (pa, da.name.as_str(), da.id, sa.metric, sa.tag.as_str(), sa.id).cmp(&(
                pb,
                db.name.as_str(),
                db.id,
                sb.metric,
                sb.tag.as_str(),
                sb.id,
            ))
        });

        Ok(rows
            .into_iter()
            .map(|(signal, device)| SignalEntry {
                signal_id: signal.id,
                device_id: device.id,
                metric: signal.metric,
                endpoint: device.endpoint.clone(),
                tag: signal.tag.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl SignalDirectory for Catalog {
    async fn snapshot(&self) -> Result<Vec<SignalEntry>> {
        self.entries()
    }
}

fn next_id(kind: &str, existing: impl Iterator<Item = u32>) -> Result<u32> {
    match existing.max() {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| ScanError::Catalog(format!("{} id space exhausted", kind))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::UNASSIGNED;

    fn catalog_with_device(id: u32, name: &str, zone_name: &str) -> (Catalog, ZoneId) {
        let catalog = Catalog::new();
        let zone = catalog.ensure_path(Some("Mina"), Some("Chancado"), Some(zone_name)).unwrap();
        catalog
            .add_device(Device::new(id, name, Some(Endpoint::new("10.0.0.5", 0)), zone))
            .unwrap();
        (catalog, zone)
    }

    #[test]
    fn test_ensure_path_is_idempotent() {
        let catalog = Catalog::new();
        let z1 = catalog.ensure_path(Some("Mina"), Some("Chancado"), Some("CC01")).unwrap();
        let z2 = catalog.ensure_path(Some("Mina"), Some("Chancado"), Some("CC01")).unwrap();
        assert_eq!(z1, z2);
        assert_eq!(catalog.counts().unwrap().zones, 1);
    }

    #[test]
    fn test_blank_levels_use_placeholder() {
        let catalog = Catalog::new();
        let zone = catalog.ensure_path(None, Some(" "), Some("CC01")).unwrap();
        let (division, area, zone_name) = catalog.path_of(zone).unwrap();
        assert_eq!(division, UNASSIGNED);
        assert_eq!(area, UNASSIGNED);
        assert_eq!(zone_name, "CC01");
    }

    #[test]
    fn test_tag_unique_per_device() {
        let (catalog, zone) = catalog_with_device(1, "VDF-01", "CC01");
        catalog
            .add_device(Device::new(2, "VDF-02", Some(Endpoint::new("10.0.0.5", 0)), zone))
            .unwrap();

        catalog.add_signal(SignalId(1), DeviceId(1), Metric::Current, "Amp[0]").unwrap();
        let err = catalog
            .add_signal(SignalId(2), DeviceId(1), Metric::Temperature, "Amp[0]")
            .unwrap_err();
        assert!(matches!(err, ScanError::Catalog(_)));

        // Same tag on another device is allowed.
        catalog.add_signal(SignalId(3), DeviceId(2), Metric::Current, "Amp[0]").unwrap();
    }

    #[test]
    fn test_unknown_references_rejected() {
        let catalog = Catalog::new();
        assert!(catalog
            .add_signal(SignalId(1), DeviceId(9), Metric::Current, "t")
            .is_err());
        assert!(catalog
            .add_device(Device::new(1, "VDF", None, ZoneId(42)))
            .is_err());
    }

    #[test]
    fn test_remove_signal() {
        let (catalog, _) = catalog_with_device(1, "VDF-01", "CC01");
        catalog.add_signal(SignalId(5), DeviceId(1), Metric::Current, "t").unwrap();

        let removed = catalog.remove_signal(SignalId(5)).unwrap();
        assert_eq!(removed.tag, "t");
        assert!(catalog.signals_of(DeviceId(1)).unwrap().is_empty());
        assert!(catalog.remove_signal(SignalId(5)).is_err());
    }

    #[tokio::test]
    async fn test_snapshot_order() {
        let catalog = Catalog::new();
        let zb = catalog.ensure_path(Some("Mina"), Some("Chancado"), Some("CC02")).unwrap();
        let za = catalog.ensure_path(Some("Mina"), Some("Chancado"), Some("CC01")).unwrap();
        catalog.add_device(Device::new(1, "B-drive", None, zb)).unwrap();
        catalog
            .add_device(Device::new(2, "A-drive", Some(Endpoint::new("10.0.0.6", 0)), za))
            .unwrap();
        catalog.add_signal(SignalId(10), DeviceId(1), Metric::Current, "b_amp").unwrap();
        catalog.add_signal(SignalId(11), DeviceId(2), Metric::Temperature, "a_temp").unwrap();
        catalog.add_signal(SignalId(12), DeviceId(2), Metric::Current, "a_amp").unwrap();

        let ids: Vec<u32> = catalog.snapshot().await.unwrap().iter().map(|e| e.signal_id.0).collect();

        assert_eq!(ids, vec![12, 11, 10]);
        assert_eq!(catalog.next_signal_id().unwrap(), SignalId(13));
    }

    #[test]
    fn test_next_id_at_u32_max_is_error() {
        let (catalog, _) = catalog_with_device(u32::MAX, "last", "CC01");
        catalog.add_signal(SignalId(u32::MAX), DeviceId(u32::MAX), Metric::Current, "tag").unwrap();

        assert!(matches!(catalog.next_device_id(), Err(ScanError::Catalog(_))));
        assert!(matches!(catalog.next_signal_id(), Err(ScanError::Catalog(_))));
    }
}
