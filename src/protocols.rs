//! Tag transport implementations.
//!
//! Real controller drivers live outside this crate and plug in through
//! [`TagTransport`](crate::core::traits::TagTransport). The transports here
//! cover dry runs, tests and hosts with no driver installed.

pub mod simulated;
pub mod unavailable;

pub use simulated::{SimulatedDevice, SimulatedEndpointConfig, SimulatedTransport};
pub use unavailable::UnavailableTransport;
