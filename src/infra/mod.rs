//! In-process collaborators: cache backend, metadata source and gateway engine.

pub mod memory_cache;
pub mod memory_gateway;
pub mod metadata_registry;

pub use memory_cache::MemoryCacheBackend;
pub use memory_gateway::{MemoryEngine, MemoryGateway, MemoryStore};
pub use metadata_registry::MetadataRegistry;
