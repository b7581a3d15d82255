pub mod analyzer;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod proxy;
pub mod registry;
pub mod request;

// Layered boundaries: ports in `app`, in-process adapters in `infra`
pub mod app;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;

pub use analyzer::EntityAnalyzer;
pub use app::ports::{CacheBackend, CacheHandle, Gateway, GatewayEngine, MetadataSource};
pub use config::Config;
pub use domain::{
    Entity, EntityCollection, EntityId, EntityMetadata, EntityModel, EntityType, Record,
    RelationMetadata,
};
pub use error::{OrmError, Result};
pub use manager::{Manager, ManagerHandle};
pub use proxy::EntityProxy;
pub use registry::{EngineRegistry, GatewayState};
pub use request::{SelectCriteria, SelectRequest, SortOrder};
