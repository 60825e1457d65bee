//! TOML configuration.
//!
//! One file describes the scanner tuning, the transport and store backends,
//! the device catalog and (for dry runs) the simulated controllers.
//!
//! # Example
//!
//! ```rust,ignore
//! use tagscan::config::ScanConfig;
//!
//! let config = ScanConfig::from_file("tagscan.toml")?;
//! let engine = tagscan::config::factory::create_engine(&config)?;
//! ```

pub mod factory;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::core::error::{Result, ScanError};
use crate::core::signal::{parse_endpoint, Metric};
use crate::protocols::simulated::SimulatedEndpointConfig;
use crate::scan::engine::EngineConfig;
use crate::scan::reader::{ReaderConfig, DEFAULT_CHUNK_SIZE};
use crate::scan::scheduler::SchedulerConfig;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    #[serde(default)]
    pub simulated: Vec<SimulatedEndpointConfig>,
}

/// `[scanner]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_max_concurrent_groups")]
    pub max_concurrent_groups: usize,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,

    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_interval_ms() -> u64 {
    60_000
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_concurrent_groups() -> usize {
    8
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_read_timeout_ms() -> u64 {
    3_000
}

fn default_commit_timeout_ms() -> u64 {
    10_000
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            chunk_size: default_chunk_size(),
            max_concurrent_groups: default_max_concurrent_groups(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            commit_timeout_ms: default_commit_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl ScannerConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_reader(
                ReaderConfig::default()
                    .with_chunk_size(self.chunk_size)
                    .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
                    .with_read_timeout(Duration::from_millis(self.read_timeout_ms)),
            )
            .with_max_concurrent_groups(self.max_concurrent_groups)
            .with_commit_timeout(Duration::from_millis(self.commit_timeout_ms))
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_millis(self.interval_ms),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
        }
    }
}

/// `[transport]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Registered transport name, see `list-transports`.
    #[serde(default = "default_transport_kind")]
    pub kind: String,
}

fn default_transport_kind() -> String {
    "none".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
        }
    }
}

/// `[store]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// `memory` or `jsonl`.
    #[serde(default = "default_store_kind")]
    pub kind: String,

    /// Output file for the `jsonl` store.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_store_kind() -> String {
    "memory".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            path: None,
        }
    }
}

/// `[[devices]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub id: u32,
    pub name: String,
    /// `host` or `host/slot`; devices without one are never scanned.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
}

/// `[[devices.signals]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    pub id: u32,
    pub metric: Metric,
    pub tag: String,
}

impl ScanConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.scanner;
        if s.interval_ms == 0 {
            return Err(ScanError::Config("scanner.interval_ms must be > 0".into()));
        }
        if s.chunk_size == 0 {
            return Err(ScanError::Config("scanner.chunk_size must be >= 1".into()));
        }
        if s.max_concurrent_groups == 0 {
            return Err(ScanError::Config(
                "scanner.max_concurrent_groups must be >= 1".into(),
            ));
        }
        for (name, value) in [
            ("connect_timeout_ms", s.connect_timeout_ms),
            ("read_timeout_ms", s.read_timeout_ms),
            ("commit_timeout_ms", s.commit_timeout_ms),
            ("shutdown_grace_ms", s.shutdown_grace_ms),
        ] {
            if value == 0 {
                return Err(ScanError::Config(format!("scanner.{} must be > 0", name)));
            }
        }

        let mut device_ids = HashSet::new();
        let mut signal_ids = HashSet::new();
        for device in &self.devices {
            if !device_ids.insert(device.id) {
                return Err(ScanError::Config(format!("Duplicate device id: {}", device.id)));
            }
            if let Some(endpoint) = &device.endpoint {
                parse_endpoint(endpoint)?;
            }
            for signal in &device.signals {
                if !signal_ids.insert(signal.id) {
                    return Err(ScanError::Config(format!("Duplicate signal id: {}", signal.id)));
                }
            }
        }

        for sim in &self.simulated {
            parse_endpoint(&sim.endpoint)?;
        }
        Ok(())
    }

    pub fn signal_count(&self) -> usize {
        self.devices.iter().map(|d| d.signals.len()).sum()
    }
}

/// Configuration printed by `tagscan example`.
pub const EXAMPLE_CONFIG: &str = r#"# tagscan configuration

[scanner]
interval_ms = 60000
chunk_size = 20
max_concurrent_groups = 8
connect_timeout_ms = 5000
read_timeout_ms = 3000
commit_timeout_ms = 10000
shutdown_grace_ms = 5000

[transport]
kind = "simulated"

[store]
kind = "jsonl"
path = "readings.jsonl"

[[devices]]
id = 1
name = "CC01"
endpoint = "10.107.210.111/0"
division = "Mina"
area = "Chancado"
zone = "CC01"

[[devices.signals]]
id = 101
metric = "amp"
tag = "VDF_CC01_Corrientes[0]"

[[devices.signals]]
id = 102
metric = "temp"
tag = "VDF_CC01_Temperaturas[0]"

[[devices]]
id = 2
name = "CC02"
endpoint = "10.107.210.121/0"
division = "Mina"
area = "Chancado"
zone = "CC02"

[[devices.signals]]
id = 201
metric = "amp"
tag = "VDF_CC02_Corrientes[0]"

[[simulated]]
endpoint = "10.107.210.111/0"

[simulated.values]
"VDF_CC01_Corrientes[0]" = 12.5
"VDF_CC01_Temperaturas[0]" = 40.0

[[simulated]]
endpoint = "10.107.210.121/0"
reachable = false
"#;
