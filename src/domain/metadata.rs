use crate::domain::entity::EntityType;
use serde::{Deserialize, Serialize};

/// What the analyzer knows about one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub entity_type: EntityType,
    /// Gateway-kind code looked up in the engine registry.
    pub gateway: String,
    /// Table/collection the gateway reads and writes.
    pub source: String,
    #[serde(default)]
    pub relations: Vec<RelationMetadata>,
}

impl EntityMetadata {
    pub fn new(entity_type: impl Into<EntityType>, gateway: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        let source = entity_type.short_name().to_lowercase();
        Self {
            entity_type,
            gateway: gateway.into(),
            source,
            relations: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_relation(mut self, name: impl Into<String>, target: impl Into<EntityType>) -> Self {
        self.relations.push(RelationMetadata::new(name, target));
        self
    }
}

/// Reference from one entity type to another whose gateway it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMetadata {
    pub name: String,
    pub target: EntityType,
}

impl RelationMetadata {
    pub fn new(name: impl Into<String>, target: impl Into<EntityType>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }
}
