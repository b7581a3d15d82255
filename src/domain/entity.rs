use crate::constants::{MEMORY_ENGINE, NAMESPACE_SEPARATOR};
use crate::domain::metadata::{EntityMetadata, RelationMetadata};
use crate::domain::record::Record;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use uuid::Uuid;

/// Name of a domain type, canonicalized so that `\App\Venue` and `App\Venue`
/// address the same gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EntityType(String);

impl EntityType {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim_start_matches(NAMESPACE_SEPARATOR).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, e.g. `Venue` for `App\Entity\Venue`.
    pub fn short_name(&self) -> &str {
        self.0
            .rsplit(NAMESPACE_SEPARATOR)
            .next()
            .unwrap_or(self.0.as_str())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&String> for EntityType {
    fn from(name: &String) -> Self {
        Self::new(name)
    }
}

impl From<&EntityType> for EntityType {
    fn from(entity_type: &EntityType) -> Self {
        entity_type.clone()
    }
}

impl From<EntityType> for String {
    fn from(entity_type: EntityType) -> Self {
        entity_type.0
    }
}

/// Identifier of one entity instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for entities created in process.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&EntityId> for EntityId {
    fn from(id: &EntityId) -> Self {
        id.clone()
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<i32> for EntityId {
    fn from(id: i32) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

/// Capability of objects that can be persisted through a gateway.
pub trait Entity: Any + Send + Sync + fmt::Debug {
    /// Runtime type used to pick the gateway.
    fn entity_type(&self) -> EntityType;

    fn id(&self) -> Option<EntityId>;

    /// Flat field representation handed to gateways.
    fn to_record(&self) -> Result<Record>;

    /// Entities that `save(.., with_relations = true)` persists alongside this one.
    fn related(&self) -> Vec<&dyn Entity> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
}

/// Serde-backed domain struct with static mapping metadata.
///
/// Every `EntityModel` is an [`Entity`] through a blanket impl, and
/// [`MetadataRegistry::register`](crate::infra::metadata_registry::MetadataRegistry::register)
/// derives its [`EntityMetadata`] from the associated items below.
pub trait EntityModel: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    const ENTITY_TYPE: &'static str;

    /// Gateway-kind code the entity is persisted with.
    const GATEWAY: &'static str = MEMORY_ENGINE;

    fn key(&self) -> Option<EntityId>;

    /// Storage source name; defaults to the lowercased short type name.
    fn source() -> String {
        EntityType::new(Self::ENTITY_TYPE).short_name().to_lowercase()
    }

    fn relations() -> Vec<RelationMetadata> {
        Vec::new()
    }

    fn related_entities(&self) -> Vec<&dyn Entity> {
        Vec::new()
    }

    fn metadata() -> EntityMetadata {
        EntityMetadata {
            entity_type: EntityType::new(Self::ENTITY_TYPE),
            gateway: Self::GATEWAY.to_string(),
            source: Self::source(),
            relations: Self::relations(),
        }
    }
}

impl<T: EntityModel> Entity for T {
    fn entity_type(&self) -> EntityType {
        EntityType::new(T::ENTITY_TYPE)
    }

    fn id(&self) -> Option<EntityId> {
        self.key()
    }

    fn to_record(&self) -> Result<Record> {
        Record::from_model(self)
    }

    fn related(&self) -> Vec<&dyn Entity> {
        self.related_entities()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
