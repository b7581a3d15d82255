use crate::analyzer::EntityAnalyzer;
use crate::app::ports::{Gateway, GatewayEngine};
use crate::constants::MEMORY_ENGINE;
use crate::domain::{Entity, EntityCollection, EntityId, EntityType, Record};
use crate::error::{OrmError, Result};
use crate::manager::ManagerHandle;
use crate::proxy::EntityProxy;
use crate::request::SelectCriteria;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Shared in-process tables, keyed by source name then entity id.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, BTreeMap<EntityId, Record>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, source: &str, id: EntityId, record: Record) {
        self.tables
            .write()
            .entry(source.to_string())
            .or_default()
            .insert(id, record);
    }

    pub fn get(&self, source: &str, id: &EntityId) -> Option<Record> {
        self.tables.read().get(source)?.get(id).cloned()
    }

    pub fn delete(&self, source: &str, id: &EntityId) -> bool {
        self.tables
            .write()
            .get_mut(source)
            .map_or(false, |table| table.remove(id).is_some())
    }

    /// Every record of `source`, ordered by id.
    pub fn all(&self, source: &str) -> Vec<Record> {
        self.tables
            .read()
            .get(source)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, source: &str) -> usize {
        self.tables.read().get(source).map_or(0, BTreeMap::len)
    }
}

/// Engine building [`MemoryGateway`]s over one [`MemoryStore`].
pub struct MemoryEngine {
    store: MemoryStore,
}

impl MemoryEngine {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl GatewayEngine for MemoryEngine {
    fn name(&self) -> &str {
        MEMORY_ENGINE
    }

    async fn build(&self, manager: ManagerHandle, analyzer: EntityAnalyzer) -> Result<Arc<dyn Gateway>> {
        let relations = analyzer.relations().to_vec();
        let gateway = Arc::new(MemoryGateway::new(manager.clone(), analyzer, self.store.clone()));
        if relations.is_empty() {
            return Ok(gateway);
        }

        // Publish the half-built gateway before resolving relations so that a
        // relation pointing back at this type resolves to it.
        let owner = manager.upgrade()?;
        let linked: Arc<dyn Gateway> = gateway.clone();
        owner.set_gateway_link(gateway.entity_type(), &linked);

        for relation in relations {
            let related = owner.get_gateway(&relation.target).await?;
            debug!(
                "Wired relation `{}` of {} to {}",
                relation.name,
                gateway.entity_type(),
                related.entity_type()
            );
            gateway.link_relation(relation.name, relation.target, &related);
        }
        Ok(gateway)
    }
}

/// Gateway over a [`MemoryStore`] with an identity map cleared by `refresh`.
pub struct MemoryGateway {
    manager: ManagerHandle,
    analyzer: EntityAnalyzer,
    store: MemoryStore,
    /// Relation name → target type and its gateway.
    relations: RwLock<HashMap<String, (EntityType, Weak<dyn Gateway>)>>,
    identity_map: RwLock<HashMap<EntityId, Arc<dyn Entity>>>,
}

impl MemoryGateway {
    pub fn new(manager: ManagerHandle, analyzer: EntityAnalyzer, store: MemoryStore) -> Self {
        Self {
            manager,
            analyzer,
            store,
            relations: RwLock::new(HashMap::new()),
            identity_map: RwLock::new(HashMap::new()),
        }
    }

    pub fn analyzer(&self) -> &EntityAnalyzer {
        &self.analyzer
    }

    /// Number of entities currently held in the identity map.
    pub fn loaded_count(&self) -> usize {
        self.identity_map.read().len()
    }

    fn link_relation(&self, name: String, target: EntityType, gateway: &Arc<dyn Gateway>) {
        self.relations
            .write()
            .insert(name, (target, Arc::downgrade(gateway)));
    }

    fn check_type(&self, entity: &dyn Entity) -> Result<()> {
        let entity_type = entity.entity_type();
        if entity_type != *self.analyzer.entity_type() {
            return Err(OrmError::Mapping(format!(
                "gateway for {} cannot persist {}",
                self.analyzer.entity_type(),
                entity_type
            )));
        }
        Ok(())
    }

    fn remember(&self, record: Record) -> Arc<dyn Entity> {
        let entity: Arc<dyn Entity> = Arc::new(record);
        if let Some(id) = entity.id() {
            self.identity_map.write().insert(id, entity.clone());
        }
        entity
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    fn entity_type(&self) -> &EntityType {
        self.analyzer.entity_type()
    }

    async fn find_by_ids(&self, ids: &[EntityId]) -> Result<EntityCollection> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            let known = self.identity_map.read().get(id).cloned();
            match known {
                Some(entity) => found.push(entity),
                None => {
                    if let Some(record) = self.store.get(self.analyzer.source(), id) {
                        found.push(self.remember(record));
                    }
                }
            }
        }
        Ok(EntityCollection::new(found))
    }

    async fn select(&self, criteria: &SelectCriteria) -> Result<EntityCollection> {
        let records = criteria.apply(self.store.all(self.analyzer.source()));
        Ok(records.into_iter().map(|record| self.remember(record)).collect())
    }

    async fn save(&self, entity: &dyn Entity, with_relations: bool) -> Result<()> {
        self.check_type(entity)?;
        let id = entity
            .id()
            .ok_or_else(|| OrmError::MissingId(entity.entity_type().to_string()))?;
        let record = entity.to_record()?;
        self.store.put(self.analyzer.source(), id.clone(), record);
        self.identity_map.write().remove(&id);
        debug!("Saved {} #{}", self.entity_type(), id);

        if with_relations {
            let related = entity.related();
            if !related.is_empty() {
                // One level deep: related entities are saved without their own relations.
                let manager = self.manager.upgrade()?;
                manager.save(related, false).await?;
            }
        }
        Ok(())
    }

    async fn remove(&self, entity: &dyn Entity) -> Result<()> {
        self.check_type(entity)?;
        let id = entity
            .id()
            .ok_or_else(|| OrmError::MissingId(entity.entity_type().to_string()))?;
        let removed = self.store.delete(self.analyzer.source(), &id);
        self.identity_map.write().remove(&id);
        debug!("Removed {} #{} (existed: {})", self.entity_type(), id, removed);
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        let dropped = {
            let mut identity_map = self.identity_map.write();
            let dropped = identity_map.len();
            identity_map.clear();
            dropped
        };
        debug!("Refreshed {}: dropped {} loaded entities", self.entity_type(), dropped);
        Ok(())
    }

    fn get_proxy(self: Arc<Self>, id: EntityId) -> Result<Arc<dyn Entity>> {
        Ok(Arc::new(EntityProxy::new(self, id)))
    }

    fn relation(&self, name: &str) -> Option<Arc<dyn Gateway>> {
        let (target, linked) = {
            let relations = self.relations.read();
            let (target, linked) = relations.get(name)?;
            (target.clone(), linked.upgrade())
        };
        if linked.is_some() {
            return linked;
        }

        // The gateway wired at construction was discarded by a failed build;
        // pick up whatever the manager holds for the target now.
        let current = self.manager.upgrade().ok()?.existing_gateway(&target)?;
        debug!("Rewired relation `{}` of {} to {}", name, self.entity_type(), target);
        self.relations
            .write()
            .insert(name.to_string(), (target, Arc::downgrade(&current)));
        Some(current)
    }
}
