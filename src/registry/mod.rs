//! Registries owned by the manager: engines by gateway kind, gateways by entity type.

pub mod engines;
pub mod gateways;

pub use engines::EngineRegistry;
pub use gateways::{GatewayState, GatewayTable};
