//! Transport metadata registry.
//!
//! Transports describe themselves so the CLI can list them and the factory
//! can reject unknown `transport.kind` values with a helpful message.

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;

/// Parameter type for configuration options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Integer,
    Boolean,
    Float,
    Table,
}

/// Metadata for a single configuration parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterMetadata {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    pub param_type: ParameterType,
}

impl ParameterMetadata {
    /// Create a new required parameter.
    pub const fn required(
        name: &'static str,
        description: &'static str,
        param_type: ParameterType,
    ) -> Self {
        Self {
            name,
            description,
            required: true,
            default_value: None,
            param_type,
        }
    }

    /// Create a new optional parameter with a default value.
    pub fn optional(
        name: &'static str,
        description: &'static str,
        param_type: ParameterType,
        default_value: Value,
    ) -> Self {
        Self {
            name,
            description,
            required: false,
            default_value: Some(default_value),
            param_type,
        }
    }
}

/// Metadata for a transport implementation.
#[derive(Debug, Clone, Serialize)]
pub struct TransportMetadata {
    /// Value of `transport.kind` selecting this transport.
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterMetadata>,
}

/// Registry of all available transports.
pub struct TransportRegistry {
    transports: Vec<TransportMetadata>,
}

impl TransportRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            transports: Vec::new(),
        }
    }

    /// Register a transport.
    pub fn register(&mut self, transport: TransportMetadata) {
        self.transports.push(transport);
    }

    /// Get all registered transports.
    pub fn transports(&self) -> &[TransportMetadata] {
        &self.transports
    }

    /// Get a transport by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&TransportMetadata> {
        self.transports
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Comma-separated list of registered names.
    pub fn names(&self) -> String {
        self.transports
            .iter()
            .map(|t| t.name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for types that can provide their own metadata.
pub trait HasMetadata {
    /// Get the metadata for this type.
    fn metadata() -> TransportMetadata;
}

/// Build the global transport registry.
fn build_registry() -> TransportRegistry {
    use crate::protocols::simulated::SimulatedTransport;
    use crate::protocols::unavailable::UnavailableTransport;

    let mut registry = TransportRegistry::new();
    registry.register(SimulatedTransport::metadata());
    registry.register(UnavailableTransport::metadata());
    registry
}

static TRANSPORT_REGISTRY: Lazy<TransportRegistry> = Lazy::new(build_registry);

/// Get the global transport registry.
pub fn get_transport_registry() -> &'static TransportRegistry {
    &TRANSPORT_REGISTRY
}
