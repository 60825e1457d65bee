//! Simulated tag transport.
//!
//! In-memory controllers keyed by endpoint. Used by the binary for dry runs
//! and by tests to exercise every failure path of a scan cycle:
//!
//! - unreachable controllers (open fails)
//! - device-side tag rejection (per-tag error status)
//! - failing tags that make their whole batched read fail
//! - injected latency on open and read
//! - unsolicited extra responses
//!
//! The transport counts opens, closes and the size of every read request per
//! endpoint so tests can assert on chunking and connection reuse.
//!
//! # Example
//!
//! ```rust,ignore
//! use tagscan::protocols::simulated::{SimulatedDevice, SimulatedTransport};
//!
//! let transport = SimulatedTransport::new()
//!     .with_device(Endpoint::new("10.0.0.5", 0), SimulatedDevice::new().with_value("Motor_Amp", 12.5))
//!     .with_device(Endpoint::new("10.0.0.6", 0), SimulatedDevice::unreachable());
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;

use crate::core::data::{RawValue, TagResponse};
use crate::core::error::{Result, ScanError};
use crate::core::metadata::{HasMetadata, ParameterMetadata, ParameterType, TransportMetadata};
use crate::core::signal::{parse_endpoint, Endpoint};
use crate::core::traits::{TagConnection, TagTransport};

/// Status text a controller returns for a tag it does not know.
pub const UNKNOWN_TAG_STATUS: &str = "Path destination unknown";

// ============================================================================
// Simulated Device
// ============================================================================

/// One simulated controller.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    reachable: bool,
    values: HashMap<String, RawValue>,
    tag_errors: HashMap<String, String>,
    failing: HashSet<String>,
    extra: Vec<TagResponse>,
    latency: Duration,
}

impl SimulatedDevice {
    /// A reachable controller with no tags.
    pub fn new() -> Self {
        Self {
            reachable: true,
            values: HashMap::new(),
            tag_errors: HashMap::new(),
            failing: HashSet::new(),
            extra: Vec::new(),
            latency: Duration::ZERO,
        }
    }

    /// A controller that refuses connections.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    pub fn with_value(mut self, tag: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.values.insert(tag.into(), value.into());
        self
    }

    /// Reject `tag` with a device status.
    pub fn with_tag_error(mut self, tag: impl Into<String>, status: impl Into<String>) -> Self {
        self.tag_errors.insert(tag.into(), status.into());
        self
    }

    /// Fail any batched read that contains `tag`.
    pub fn failing_on(mut self, tag: impl Into<String>) -> Self {
        self.failing.insert(tag.into());
        self
    }

    /// Append an unsolicited response to every successful read.
    pub fn with_extra(mut self, tag: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.extra.push(TagResponse::ok(tag, value));
        self
    }

    /// Delay every open and read.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn lookup<'a, T>(map: &'a HashMap<String, T>, tag: &str) -> Option<&'a T> {
        map.get(tag).or_else(|| {
            map.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(tag))
                .map(|(_, v)| v)
        })
    }

    fn respond(&self, tags: &[String]) -> Result<Vec<TagResponse>> {
        if let Some(bad) = tags
            .iter()
            .find(|t| self.failing.iter().any(|f| f.eq_ignore_ascii_case(t)))
        {
            return Err(ScanError::Chunk(format!(
                "controller rejected batch containing '{}'",
                bad
            )));
        }

        let mut responses: Vec<TagResponse> = tags
            .iter()
            .map(|tag| {
                if let Some(status) = Self::lookup(&self.tag_errors, tag) {
                    TagResponse::error(tag.as_str(), status.as_str())
                } else if let Some(value) = Self::lookup(&self.values, tag) {
                    TagResponse::ok(tag.as_str(), value.clone())
                } else {
                    TagResponse::error(tag.as_str(), UNKNOWN_TAG_STATUS)
                }
            })
            .collect();
        responses.extend(self.extra.iter().cloned());
        Ok(responses)
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Strongly-typed config for TOML deserialization
// ============================================================================

/// One `[[simulated]]` table.
///
/// # Example TOML
/// ```toml
/// [[simulated]]
/// endpoint = "10.107.210.111/0"
/// reachable = true
/// latency_ms = 20
/// failing_tags = ["VDF_CC01_Corrientes[7]"]
///
/// [simulated.values]
/// "VDF_CC01_Corrientes[0]" = 12.5
///
/// [simulated.tag_errors]
/// "VDF_CC01_Temp[3]" = "Path segment error"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatedEndpointConfig {
    pub endpoint: String,

    #[serde(default = "default_reachable")]
    pub reachable: bool,

    #[serde(default)]
    pub values: BTreeMap<String, RawValue>,

    #[serde(default)]
    pub tag_errors: BTreeMap<String, String>,

    #[serde(default)]
    pub failing_tags: Vec<String>,

    #[serde(default)]
    pub latency_ms: u64,
}

fn default_reachable() -> bool {
    true
}

impl SimulatedEndpointConfig {
    /// Parse the endpoint and build the device.
    pub fn to_device(&self) -> Result<(Endpoint, SimulatedDevice)> {
        let endpoint = parse_endpoint(&self.endpoint)?;
        let mut device = if self.reachable {
            SimulatedDevice::new()
        } else {
            SimulatedDevice::unreachable()
        };
        for (tag, value) in &self.values {
            device = device.with_value(tag.as_str(), value.clone());
        }
        for (tag, status) in &self.tag_errors {
            device = device.with_tag_error(tag.as_str(), status.as_str());
        }
        for tag in &self.failing_tags {
            device = device.failing_on(tag.as_str());
        }
        Ok((endpoint, device.with_latency(Duration::from_millis(self.latency_ms))))
    }
}

// ============================================================================
// Simulated Transport
// ============================================================================

/// Per-endpoint traffic counters.
#[derive(Debug, Clone, Default)]
struct EndpointTraffic {
    opens: usize,
    closes: usize,
    chunk_sizes: Vec<usize>,
}

#[derive(Default)]
struct Shared {
    devices: DashMap<Endpoint, SimulatedDevice>,
    traffic: DashMap<Endpoint, EndpointTraffic>,
}

impl Shared {
    fn device(&self, endpoint: &Endpoint) -> Option<SimulatedDevice> {
        self.devices.get(endpoint).map(|d| d.value().clone())
    }
}

/// Transport backed by [`SimulatedDevice`]s.
#[derive(Clone, Default)]
pub struct SimulatedTransport {
    shared: Arc<Shared>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `[[simulated]]` tables.
    pub fn from_config(endpoints: &[SimulatedEndpointConfig]) -> Result<Self> {
        let transport = Self::new();
        for cfg in endpoints {
            let (endpoint, device) = cfg.to_device()?;
            transport.insert_device(endpoint, device);
        }
        Ok(transport)
    }

    pub fn with_device(self, endpoint: Endpoint, device: SimulatedDevice) -> Self {
        self.insert_device(endpoint, device);
        self
    }

    /// Add or replace a controller.
    pub fn insert_device(&self, endpoint: Endpoint, device: SimulatedDevice) {
        self.shared.devices.insert(endpoint, device);
    }

    /// Change a tag value on a live controller.
    pub fn set_value(&self, endpoint: &Endpoint, tag: impl Into<String>, value: impl Into<RawValue>) {
        if let Some(mut device) = self.shared.devices.get_mut(endpoint) {
            device.values.insert(tag.into(), value.into());
        }
    }

    /// Take a controller off or back on the network.
    pub fn set_reachable(&self, endpoint: &Endpoint, reachable: bool) {
        if let Some(mut device) = self.shared.devices.get_mut(endpoint) {
            device.reachable = reachable;
        }
    }

    pub fn device_count(&self) -> usize {
        self.shared.devices.len()
    }

    /// Successful opens of `endpoint`.
    pub fn opens(&self, endpoint: &Endpoint) -> usize {
        self.shared.traffic.get(endpoint).map_or(0, |t| t.opens)
    }

    pub fn closes(&self, endpoint: &Endpoint) -> usize {
        self.shared.traffic.get(endpoint).map_or(0, |t| t.closes)
    }

    /// Size of every read request sent to `endpoint`, in order.
    pub fn chunk_sizes(&self, endpoint: &Endpoint) -> Vec<usize> {
        self.shared
            .traffic
            .get(endpoint)
            .map(|t| t.chunk_sizes.clone())
            .unwrap_or_default()
    }
}

impl HasMetadata for SimulatedTransport {
    fn metadata() -> TransportMetadata {
        TransportMetadata {
            name: "simulated",
            display_name: "Simulated Controllers",
            description: "In-memory controllers declared in [[simulated]] tables",
            parameters: vec![
                ParameterMetadata::required(
                    "endpoint",
                    "Controller address as host/slot",
                    ParameterType::String,
                ),
                ParameterMetadata::optional(
                    "reachable",
                    "Accept connections",
                    ParameterType::Boolean,
                    json!(true),
                ),
                ParameterMetadata::optional(
                    "values",
                    "Tag name to value",
                    ParameterType::Table,
                    json!({}),
                ),
                ParameterMetadata::optional(
                    "tag_errors",
                    "Tag name to device error status",
                    ParameterType::Table,
                    json!({}),
                ),
                ParameterMetadata::optional(
                    "failing_tags",
                    "Tags whose batched read fails",
                    ParameterType::Table,
                    json!([]),
                ),
                ParameterMetadata::optional(
                    "latency_ms",
                    "Delay applied to open and read",
                    ParameterType::Integer,
                    json!(0),
                ),
            ],
        }
    }
}

#[async_trait]
impl TagTransport for SimulatedTransport {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn TagConnection>> {
        let device = self
            .shared
            .device(endpoint)
            .ok_or_else(|| ScanError::Connection(format!("no route to {}", endpoint)))?;

        if !device.latency.is_zero() {
            tokio::time::sleep(device.latency).await;
        }
        if !device.reachable {
            return Err(ScanError::Connection(format!(
                "connection to {} refused",
                endpoint
            )));
        }

        self.shared
            .traffic
            .entry(endpoint.clone())
            .or_default()
            .opens += 1;

        Ok(Box::new(SimulatedConnection {
            shared: self.shared.clone(),
            endpoint: endpoint.clone(),
        }))
    }
}

struct SimulatedConnection {
    shared: Arc<Shared>,
    endpoint: Endpoint,
}

#[async_trait]
impl TagConnection for SimulatedConnection {
    async fn read(&mut self, tags: &[String]) -> Result<Vec<TagResponse>> {
        self.shared
            .traffic
            .entry(self.endpoint.clone())
            .or_default()
            .chunk_sizes
            .push(tags.len());

        let device = self
            .shared
            .device(&self.endpoint)
            .ok_or_else(|| ScanError::Chunk(format!("{} went away", self.endpoint)))?;

        if !device.latency.is_zero() {
            tokio::time::sleep(device.latency).await;
        }
        if !device.reachable {
            return Err(ScanError::Chunk(format!("connection to {} lost", self.endpoint)));
        }

        device.respond(tags)
    }

    async fn close(&mut self) -> Result<()> {
        self.shared
            .traffic
            .entry(self.endpoint.clone())
            .or_default()
            .closes += 1;
        Ok(())
    }
}
