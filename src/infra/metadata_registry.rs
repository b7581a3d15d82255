use crate::app::ports::MetadataSource;
use crate::config::EntityConfig;
use crate::domain::{Entity, EntityMetadata, EntityModel, EntityType, Record};
use crate::error::{OrmError, Result};
use crate::proxy::EntityProxy;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

type EntityCaster = fn(&(dyn Any + Send + Sync)) -> Option<&dyn Entity>;

fn cast<T: Entity>(item: &(dyn Any + Send + Sync)) -> Option<&dyn Entity> {
    item.downcast_ref::<T>().map(|entity| entity as &dyn Entity)
}

/// Metadata source backed by explicit registrations.
///
/// Besides metadata, registration records how to recognize values of the
/// entity's concrete type, which is what lets `save_any`/`remove_any` tell
/// entities apart from anything else in a mixed batch.
pub struct MetadataRegistry {
    entries: RwLock<HashMap<EntityType, EntityMetadata>>,
    casters: RwLock<HashMap<TypeId, EntityCaster>>,
    inspections: AtomicUsize,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        let mut casters: HashMap<TypeId, EntityCaster> = HashMap::new();
        casters.insert(TypeId::of::<Record>(), cast::<Record>);
        casters.insert(TypeId::of::<EntityProxy>(), cast::<EntityProxy>);
        Self {
            entries: RwLock::new(HashMap::new()),
            casters: RwLock::new(casters),
            inspections: AtomicUsize::new(0),
        }
    }

    /// Register a model type with the metadata it declares.
    pub fn register<T: EntityModel>(&self) -> &Self {
        self.insert(T::metadata());
        self.casters.write().insert(TypeId::of::<T>(), cast::<T>);
        self
    }

    /// Add or replace metadata for a type without a Rust model (e.g. `Record`-only types).
    pub fn insert(&self, metadata: EntityMetadata) -> &Self {
        debug!(
            "Registered entity {} with gateway kind `{}`",
            metadata.entity_type, metadata.gateway
        );
        self.entries
            .write()
            .insert(metadata.entity_type.clone(), metadata);
        self
    }

    /// Seed metadata from the `[entities]` section of the configuration.
    pub fn load_config(&self, entities: &BTreeMap<String, EntityConfig>) {
        for (name, entity) in entities {
            self.insert(entity.to_metadata(name));
        }
    }

    pub fn contains(&self, entity_type: &EntityType) -> bool {
        self.entries.read().contains_key(entity_type)
    }

    /// Number of `inspect` calls so far.
    pub fn inspection_count(&self) -> usize {
        self.inspections.load(Ordering::SeqCst)
    }
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataSource for MetadataRegistry {
    fn inspect(&self, entity_type: &EntityType) -> Result<EntityMetadata> {
        self.inspections.fetch_add(1, Ordering::SeqCst);
        self.entries
            .read()
            .get(entity_type)
            .cloned()
            .ok_or_else(|| OrmError::UnknownEntity(entity_type.to_string()))
    }

    fn as_entity<'a>(&self, item: &'a (dyn Any + Send + Sync)) -> Option<&'a dyn Entity> {
        let any: &dyn Any = item;
        let caster = self.casters.read().get(&any.type_id()).copied()?;
        caster(item)
    }
}
