//! Catalog entities.
//!
//! Location hierarchy `Division -> Area -> Zone`, the devices placed in
//! zones and the signals each device exposes.

use serde::{Deserialize, Serialize};

use crate::core::signal::{DeviceId, Endpoint, Metric, SignalId};

/// Name given to a hierarchy level whose legacy text was blank.
pub const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DivisionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Division {
    pub id: DivisionId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Area {
    pub id: AreaId,
    pub division: DivisionId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Zone {
    pub id: ZoneId,
    pub area: AreaId,
    pub name: String,
}

/// A drive (or any controller-backed asset) placed in a zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    /// `None` when the address is unknown; such devices are never scanned.
    pub endpoint: Option<Endpoint>,
    pub zone: ZoneId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Device {
    pub fn new(id: u32, name: impl Into<String>, endpoint: Option<Endpoint>, zone: ZoneId) -> Self {
        Self {
            id: DeviceId(id),
            name: name.into(),
            endpoint,
            zone,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One measured quantity of a device, bound to a controller tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signal {
    pub id: SignalId,
    pub device: DeviceId,
    pub metric: Metric,
    pub tag: String,
}

/// Normalize a hierarchy name: trimmed, blank becomes [`UNASSIGNED`].
pub fn level_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => UNASSIGNED.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_name() {
        assert_eq!(level_name(Some(" Mina ")), "Mina");
        assert_eq!(level_name(Some("   ")), UNASSIGNED);
        assert_eq!(level_name(None), UNASSIGNED);
    }
}
