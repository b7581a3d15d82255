use crate::analyzer::EntityAnalyzer;
use crate::domain::{Entity, EntityCollection, EntityId, EntityMetadata, EntityType};
use crate::error::Result;
use crate::manager::ManagerHandle;
use crate::request::SelectCriteria;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// Persistence component for one entity type.
#[async_trait]
pub trait Gateway: Send + Sync {
    fn entity_type(&self) -> &EntityType;

    async fn find_by_ids(&self, ids: &[EntityId]) -> Result<EntityCollection>;

    async fn select(&self, criteria: &SelectCriteria) -> Result<EntityCollection>;

    async fn save(&self, entity: &dyn Entity, with_relations: bool) -> Result<()>;

    async fn remove(&self, entity: &dyn Entity) -> Result<()>;

    /// Drop gateway-internal state (identity maps, loaded relations).
    async fn refresh(&self) -> Result<()>;

    /// Lazily-loaded stand-in for the entity with `id`.
    fn get_proxy(self: Arc<Self>, id: EntityId) -> Result<Arc<dyn Entity>>;

    /// Gateway of a related entity type wired during construction.
    fn relation(&self, _name: &str) -> Option<Arc<dyn Gateway>> {
        None
    }
}

/// Factory registered in the engine registry under a gateway-kind code.
///
/// `build` may call [`Manager::set_gateway_link`](crate::manager::Manager::set_gateway_link)
/// with the half-built gateway before asking the manager for the gateways it
/// depends on; that is what lets two gateways referencing each other resolve.
#[async_trait]
pub trait GatewayEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn build(&self, manager: ManagerHandle, analyzer: EntityAnalyzer) -> Result<Arc<dyn Gateway>>;
}

/// Expiring key-value store the analyzer caches metadata in.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get_cache(&self, key: &str, ttl: Duration) -> Result<Arc<dyn CacheHandle>>;
}

#[async_trait]
pub trait CacheHandle: Send + Sync {
    async fn get(&self, field: &str) -> Result<Option<Value>>;

    async fn set(&self, field: &str, value: Value) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Source of entity metadata, the expensive inspection the analyzer caches.
pub trait MetadataSource: Send + Sync {
    fn inspect(&self, entity_type: &EntityType) -> Result<EntityMetadata>;

    /// View `item` as an entity if its concrete type is a registered one.
    fn as_entity<'a>(&self, item: &'a (dyn Any + Send + Sync)) -> Option<&'a dyn Entity>;
}
