//! The manager resolves entity types to gateways and runs bulk operations over them.
//!
//! Resolution order for an entity type is: committed gateway, then the link
//! published by a gateway still under construction, then a fresh build through
//! the engine the analyzer selects. Gateways live as long as the manager.
//!
//! The manager does not serialize resolutions. Its tables sit behind short
//! locks that are never held across an `.await` or a gateway build. While a
//! type is being built without a published link, any other request for it
//! fails with `ResolutionCycle`, whether it comes from inside the build or
//! from another task; callers sharing a manager across tasks must serialize
//! first resolutions.

use crate::analyzer::EntityAnalyzer;
use crate::app::ports::{CacheBackend, Gateway, GatewayEngine, MetadataSource};
use crate::config::{Config, ManagerConfig};
use crate::constants::{analyzer_cache_key, MEMORY_ENGINE};
use crate::domain::{Entity, EntityId, EntityModel, EntityType};
use crate::error::{OrmError, Result};
use crate::infra::memory_cache::MemoryCacheBackend;
use crate::infra::memory_gateway::{MemoryEngine, MemoryStore};
use crate::infra::metadata_registry::MetadataRegistry;
use crate::metrics::ManagerMetrics;
use crate::registry::{EngineRegistry, GatewayState, GatewayTable};
use crate::request::SelectRequest;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Manager {
    settings: ManagerConfig,
    cache: Arc<dyn CacheBackend>,
    metadata: Arc<dyn MetadataSource>,
    engines: RwLock<EngineRegistry>,
    gateways: Mutex<GatewayTable>,
    me: Weak<Manager>,
}

/// Non-owning reference to a [`Manager`], held by the gateways it builds.
#[derive(Clone)]
pub struct ManagerHandle(Weak<Manager>);

impl ManagerHandle {
    /// Handle that never upgrades, for gateways built outside a manager.
    pub fn detached() -> Self {
        Self(Weak::new())
    }

    pub fn upgrade(&self) -> Result<Arc<Manager>> {
        self.0.upgrade().ok_or(OrmError::ManagerDropped)
    }
}

impl fmt::Debug for ManagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ManagerHandle")
            .field(&(self.0.strong_count() > 0))
            .finish()
    }
}

impl Manager {
    pub fn new(
        settings: ManagerConfig,
        cache: Arc<dyn CacheBackend>,
        metadata: Arc<dyn MetadataSource>,
        engines: EngineRegistry,
    ) -> Arc<Self> {
        crate::metrics::init_metrics();
        info!(
            "Creating manager `{}` with engines {:?}",
            settings.identity,
            engines.codes()
        );
        Arc::new_cyclic(|me| Manager {
            settings,
            cache,
            metadata,
            engines: RwLock::new(engines),
            gateways: Mutex::new(GatewayTable::new()),
            me: me.clone(),
        })
    }

    /// Manager over in-process collaborators: memory cache, the memory engine
    /// on `store`, and `metadata` seeded with the configured entities.
    pub fn from_config(config: &Config, metadata: MetadataRegistry, store: MemoryStore) -> Result<Arc<Self>> {
        metadata.load_config(&config.entities);
        let engines = EngineRegistry::new().with_engine(MEMORY_ENGINE, Arc::new(MemoryEngine::new(store)))?;
        Ok(Self::new(
            config.manager.clone(),
            Arc::new(MemoryCacheBackend::new()),
            Arc::new(metadata),
            engines,
        ))
    }

    pub fn identity(&self) -> &str {
        &self.settings.identity
    }

    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle(self.me.clone())
    }

    /// Resolve the gateway for `entity_type`, building it on first use.
    pub async fn get_gateway(&self, entity_type: impl Into<EntityType>) -> Result<Arc<dyn Gateway>> {
        let entity_type = entity_type.into();
        {
            let mut table = self.gateways.lock();
            if let Some(gateway) = table.ready(&entity_type) {
                ManagerMetrics::record_cache_hit();
                return Ok(gateway);
            }
            if let Some(link) = table.link(&entity_type) {
                debug!("Resolved {} through its construction link", entity_type);
                ManagerMetrics::record_link_hit();
                return Ok(link);
            }
            if !table.begin(&entity_type) {
                // Either a build asked for its own type before publishing a
                // link, or another task is building it right now.
                ManagerMetrics::record_resolution_failure();
                return Err(OrmError::ResolutionCycle(entity_type.to_string()));
            }
        }

        let construction = Construction::new(&self.gateways, entity_type.clone());
        let started = Instant::now();

        match self.construct(&entity_type).await {
            Ok(gateway) => {
                let gateway = construction.commit(gateway);
                ManagerMetrics::record_resolution(started.elapsed().as_secs_f64());
                info!("Gateway for {} is ready", entity_type);
                Ok(gateway)
            }
            Err(e) => {
                ManagerMetrics::record_resolution_failure();
                Err(e)
            }
        }
    }

    /// Gateway already committed for `entity_type`, or the live link of one
    /// under construction. Never builds.
    pub fn existing_gateway(&self, entity_type: impl Into<EntityType>) -> Option<Arc<dyn Gateway>> {
        let entity_type = entity_type.into();
        let mut table = self.gateways.lock();
        match table.ready(&entity_type) {
            Some(gateway) => Some(gateway),
            None => table.link(&entity_type),
        }
    }

    /// Publish `gateway` as the placeholder for `entity_type` while it is being built.
    ///
    /// No-op once a real gateway exists. Before that, each call replaces the
    /// previous link, so the last link wins until the manager commits.
    pub fn set_gateway_link(&self, entity_type: impl Into<EntityType>, gateway: &Arc<dyn Gateway>) {
        let entity_type = entity_type.into();
        let mut table = self.gateways.lock();
        if table.reserve(entity_type.clone(), gateway) {
            debug!("Reserved {} with a construction link", entity_type);
        } else {
            debug!("Ignoring link for {}: gateway already committed", entity_type);
        }
    }

    pub fn gateway_state(&self, entity_type: impl Into<EntityType>) -> GatewayState {
        self.gateways.lock().state(&entity_type.into())
    }

    pub fn realized_types(&self) -> Vec<EntityType> {
        self.gateways.lock().realized_types()
    }

    pub async fn get_by_id(
        &self,
        entity_type: impl Into<EntityType>,
        id: impl Into<EntityId>,
    ) -> Result<Option<Arc<dyn Entity>>> {
        let gateway = self.get_gateway(entity_type).await?;
        let found = gateway.find_by_ids(&[id.into()]).await?;
        Ok(found.first())
    }

    /// Typed [`get_by_id`](Self::get_by_id).
    pub async fn find<T: EntityModel>(&self, id: impl Into<EntityId>) -> Result<Option<T>> {
        match self.get_by_id(T::ENTITY_TYPE, id).await? {
            Some(entity) => Ok(Some(entity.to_record()?.decode::<T>()?)),
            None => Ok(None),
        }
    }

    pub async fn create_select_request(&self, entity_type: impl Into<EntityType>) -> Result<SelectRequest> {
        Ok(SelectRequest::new(self.get_gateway(entity_type).await?))
    }

    pub async fn save_one(&self, entity: &dyn Entity, with_relations: bool) -> Result<()> {
        let gateway = self.get_gateway(entity.entity_type()).await?;
        gateway.save(entity, with_relations).await?;
        ManagerMetrics::record_saved();
        Ok(())
    }

    /// Save every entity in order. Not atomic: a failure leaves earlier items saved.
    pub async fn save<'a, I>(&self, entities: I, with_relations: bool) -> Result<()>
    where
        I: IntoIterator<Item = &'a dyn Entity>,
        I::IntoIter: Send,
    {
        for entity in entities {
            self.save_one(entity, with_relations).await?;
        }
        Ok(())
    }

    /// Save a heterogeneous batch, failing with `InvalidEntity` at the first
    /// item that is not a registered entity type.
    pub async fn save_any<'a, I>(&self, items: I, with_relations: bool) -> Result<()>
    where
        I: IntoIterator<Item = &'a (dyn Any + Send + Sync)>,
        I::IntoIter: Send,
    {
        for (position, item) in items.into_iter().enumerate() {
            let entity = self.as_entity(position, item, "saving")?;
            self.save_one(entity, with_relations).await?;
        }
        Ok(())
    }

    pub async fn remove_one(&self, entity: &dyn Entity) -> Result<()> {
        let gateway = self.get_gateway(entity.entity_type()).await?;
        gateway.remove(entity).await?;
        ManagerMetrics::record_removed();
        Ok(())
    }

    pub async fn remove<'a, I>(&self, entities: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a dyn Entity>,
        I::IntoIter: Send,
    {
        for entity in entities {
            self.remove_one(entity).await?;
        }
        Ok(())
    }

    pub async fn remove_any<'a, I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a (dyn Any + Send + Sync)>,
        I::IntoIter: Send,
    {
        for (position, item) in items.into_iter().enumerate() {
            let entity = self.as_entity(position, item, "removing")?;
            self.remove_one(entity).await?;
        }
        Ok(())
    }

    /// Refresh one gateway (building it if needed) or, with `None`, every
    /// gateway already built. Never builds gateways in the `None` case.
    pub async fn refresh(&self, entity_type: Option<&str>) -> Result<()> {
        let gateways = match entity_type {
            Some(entity_type) => vec![self.get_gateway(entity_type).await?],
            None => self.realized_gateways(),
        };
        for gateway in gateways {
            gateway.refresh().await?;
            ManagerMetrics::record_refreshed();
            debug!("Refreshed gateway for {}", gateway.entity_type());
        }
        Ok(())
    }

    pub async fn create_proxy(
        &self,
        entity_type: impl Into<EntityType>,
        id: impl Into<EntityId>,
    ) -> Result<Arc<dyn Entity>> {
        let gateway = self.get_gateway(entity_type).await?;
        gateway.get_proxy(id.into())
    }

    /// Register or replace the engine for gateway kind `code`.
    pub fn add_engine(&self, code: &str, engine: Arc<dyn GatewayEngine>) -> Result<()> {
        let name = engine.name().to_string();
        self.engines.write().insert(code, engine)?;
        info!("Registered engine `{}` for gateway kind `{}`", name, code);
        Ok(())
    }

    pub fn engine_codes(&self) -> Vec<String> {
        self.engines.read().codes()
    }

    fn realized_gateways(&self) -> Vec<Arc<dyn Gateway>> {
        self.gateways.lock().realized()
    }

    async fn construct(&self, entity_type: &EntityType) -> Result<Arc<dyn Gateway>> {
        let analyzer = self.analyze(entity_type).await?;
        let engine = self.engine_for(entity_type, analyzer.gateway())?;
        debug!(
            "Building gateway for {} with engine `{}`",
            entity_type,
            engine.name()
        );
        engine.build(self.handle(), analyzer).await
    }

    async fn analyze(&self, entity_type: &EntityType) -> Result<EntityAnalyzer> {
        let key = analyzer_cache_key(&self.settings.identity, entity_type.as_str());
        let cache = self
            .cache
            .get_cache(&key, self.settings.analyzer_cache_ttl())
            .await?;
        EntityAnalyzer::analyze(entity_type, self.metadata.as_ref(), cache).await
    }

    fn engine_for(&self, entity_type: &EntityType, code: &str) -> Result<Arc<dyn GatewayEngine>> {
        let engine = self.engines.read().get(code);
        engine.ok_or_else(|| {
            warn!(
                "No engine registered for gateway kind `{}` required by {}",
                code, entity_type
            );
            OrmError::gateway_not_found(
                entity_type.as_str(),
                format!("no engine registered for gateway kind `{}`", code),
            )
        })
    }

    fn as_entity<'a>(
        &self,
        position: usize,
        item: &'a (dyn Any + Send + Sync),
        action: &str,
    ) -> Result<&'a dyn Entity> {
        self.metadata.as_entity(item).ok_or_else(|| OrmError::InvalidEntity {
            position,
            reason: format!("{} object is not a registered entity type", action),
        })
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("identity", &self.settings.identity)
            .field("engines", &self.engine_codes())
            .field("gateways", &self.realized_types())
            .finish()
    }
}

/// Marks one entity type as under construction; rolls the mark and any
/// published link back unless committed.
struct Construction<'a> {
    table: &'a Mutex<GatewayTable>,
    entity_type: EntityType,
    armed: bool,
}

impl<'a> Construction<'a> {
    fn new(table: &'a Mutex<GatewayTable>, entity_type: EntityType) -> Self {
        Self {
            table,
            entity_type,
            armed: true,
        }
    }

    fn commit(mut self, gateway: Arc<dyn Gateway>) -> Arc<dyn Gateway> {
        self.armed = false;
        let mut table = self.table.lock();
        let committed = table.commit(self.entity_type.clone(), gateway);
        ManagerMetrics::record_realized(table.realized_types().len());
        committed
    }
}

impl Drop for Construction<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Construction of gateway for {} failed", self.entity_type);
            self.table.lock().abort(&self.entity_type);
        }
    }
}
