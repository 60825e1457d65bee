//! Signal identities and connection endpoints.
//!
//! A signal is a named measurement point bound to one device. The scan core
//! never owns signals; it receives them as [`SignalEntry`] values from a
//! [`SignalDirectory`](crate::core::traits::SignalDirectory) snapshot and
//! derives the physical [`Endpoint`] of each one per cycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, ScanError};

/// Identity of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(pub u32);

/// Identity of a device (one physical drive or controller module).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u32);

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of measurement a signal carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    /// Motor current in amperes.
    #[serde(rename = "amp")]
    Current,
    /// Temperature in degrees Celsius.
    #[serde(rename = "temp")]
    Temperature,
}

impl Metric {
    /// Short code used in configuration and storage.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Current => "amp",
            Self::Temperature => "temp",
        }
    }

    /// Unit symbol.
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::Current => "A",
            Self::Temperature => "°C",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Metric {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("amp") {
            Ok(Self::Current)
        } else if s.eq_ignore_ascii_case("temp") {
            Ok(Self::Temperature)
        } else {
            Err(ScanError::Config(format!("Unknown metric: {}", s)))
        }
    }
}

/// Physical connection target: controller host plus sub-unit (backplane slot).
///
/// Textual form is `"host"` (sub-unit 0) or `"host/sub_unit"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub sub_unit: u16,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, sub_unit: u16) -> Self {
        Self {
            host: host.into(),
            sub_unit,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.sub_unit)
    }
}

impl FromStr for Endpoint {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        parse_endpoint(s)
    }
}

/// Parse `"host"` or `"host/sub_unit"` into an [`Endpoint`].
///
/// The slash separator keeps IPv6 literals (which contain `:`) unambiguous.
pub fn parse_endpoint(address: &str) -> Result<Endpoint> {
    let address = address.trim();

    let (host, sub_unit) = match address.split_once('/') {
        None => (address, 0),
        Some((host, slot_str)) => {
            let slot = slot_str.trim().parse::<u16>().map_err(|_| {
                ScanError::Config(format!(
                    "Invalid sub-unit '{}' in endpoint '{}'",
                    slot_str, address
                ))
            })?;
            (host.trim(), slot)
        }
    };

    if host.is_empty() {
        return Err(ScanError::Config(format!(
            "Missing host in endpoint '{}'",
            address
        )));
    }
    if host.contains(char::is_whitespace) {
        return Err(ScanError::Config(format!("Invalid host: {}", host)));
    }

    Ok(Endpoint::new(host, sub_unit))
}

/// One signal as delivered by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEntry {
    pub signal_id: SignalId,
    pub device_id: DeviceId,
    pub metric: Metric,
    /// `None` when the owning device has no usable connection data.
    pub endpoint: Option<Endpoint>,
    /// Exact controller tag name.
    pub tag: String,
}

impl SignalEntry {
    /// Create an entry bound to an endpoint.
    pub fn new(
        signal_id: u32,
        device_id: u32,
        metric: Metric,
        endpoint: Endpoint,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            signal_id: SignalId(signal_id),
            device_id: DeviceId(device_id),
            metric,
            endpoint: Some(endpoint),
            tag: tag.into(),
        }
    }

    /// True if the entry can take part in a scan.
    pub fn is_scannable(&self) -> bool {
        self.endpoint.is_some() && !self.tag.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_host_only() {
        let ep = parse_endpoint("10.107.210.111").unwrap();
        assert_eq!(ep, Endpoint::new("10.107.210.111", 0));
    }

    #[test]
    fn test_parse_endpoint_with_slot() {
        let ep: Endpoint = "10.107.210.121/3".parse().unwrap();
        assert_eq!(ep.host, "10.107.210.121");
        assert_eq!(ep.sub_unit, 3);
        assert_eq!(ep.to_string(), "10.107.210.121/3");
    }

    #[test]
    fn test_parse_endpoint_ipv6() {
        let ep = parse_endpoint("fe80::1/2").unwrap();
        assert_eq!(ep.host, "fe80::1");
        assert_eq!(ep.sub_unit, 2);
    }

    #[test]
    fn test_parse_endpoint_errors() {
        assert!(parse_endpoint("").is_err());
        assert!(parse_endpoint("/1").is_err());
        assert!(parse_endpoint("host/abc").is_err());
        assert!(parse_endpoint("host/70000").is_err());
        assert!(parse_endpoint("bad host/1").is_err());
    }

    #[test]
    fn test_metric_codes() {
        assert_eq!("amp".parse::<Metric>().unwrap(), Metric::Current);
        assert_eq!("TEMP".parse::<Metric>().unwrap(), Metric::Temperature);
        assert!("volt".parse::<Metric>().is_err());
        assert_eq!(Metric::Current.unit(), "A");
    }

    #[test]
    fn test_scannable() {
        let mut entry = SignalEntry::new(1, 1, Metric::Current, Endpoint::new("h", 0), "tagX");
        assert!(entry.is_scannable());

        entry.tag = "  ".into();
        assert!(!entry.is_scannable());

        entry.tag = "tagX".into();
        entry.endpoint = None;
        assert!(!entry.is_scannable());
    }
}
