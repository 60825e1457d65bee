//! Placeholder transport for hosts without a tag protocol driver.
//!
//! Every open fails with [`ScanError::NoTransport`], so a cycle still runs
//! to completion and records every tag with the `no_transport` status.

use async_trait::async_trait;

use crate::core::error::{Result, ScanError};
use crate::core::metadata::{HasMetadata, TransportMetadata};
use crate::core::signal::Endpoint;
use crate::core::traits::{TagConnection, TagTransport};

#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableTransport;

impl HasMetadata for UnavailableTransport {
    fn metadata() -> TransportMetadata {
        TransportMetadata {
            name: "none",
            display_name: "No Transport",
            description: "No protocol driver installed; every tag is recorded as no_transport",
            parameters: Vec::new(),
        }
    }
}

#[async_trait]
impl TagTransport for UnavailableTransport {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn TagConnection>> {
        Err(ScanError::NoTransport(format!(
            "no tag protocol driver available to reach {}",
            endpoint
        )))
    }
}
