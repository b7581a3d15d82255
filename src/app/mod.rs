pub mod ports;

pub use ports::{CacheBackend, CacheHandle, Gateway, GatewayEngine, MetadataSource};
