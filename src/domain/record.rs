use crate::domain::entity::{Entity, EntityId, EntityModel, EntityType};
use crate::error::{OrmError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;

/// Field-level snapshot of an entity as stored by a gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub entity_type: EntityType,
    pub id: Option<EntityId>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(entity_type: impl Into<EntityType>, id: Option<EntityId>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn from_model<T: EntityModel>(model: &T) -> Result<Self> {
        match serde_json::to_value(model)? {
            Value::Object(fields) => Ok(Self {
                entity_type: EntityType::new(T::ENTITY_TYPE),
                id: model.key(),
                fields,
            }),
            other => Err(OrmError::Mapping(format!(
                "`{}` must serialize to an object, got {}",
                T::ENTITY_TYPE,
                other
            ))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Rebuild a typed entity from the stored fields.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

impl Entity for Record {
    fn entity_type(&self) -> EntityType {
        self.entity_type.clone()
    }

    fn id(&self) -> Option<EntityId> {
        self.id.clone()
    }

    fn to_record(&self) -> Result<Record> {
        Ok(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
