use crate::app::ports::Gateway;
use crate::domain::{Entity, EntityId, EntityType, Record};
use crate::error::{OrmError, Result};
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Stand-in entity that fetches its data through the gateway on first [`load`](Self::load).
pub struct EntityProxy {
    entity_type: EntityType,
    id: EntityId,
    gateway: Arc<dyn Gateway>,
    loaded: OnceCell<Option<Arc<dyn Entity>>>,
}

impl EntityProxy {
    pub fn new(gateway: Arc<dyn Gateway>, id: EntityId) -> Self {
        Self {
            entity_type: gateway.entity_type().clone(),
            id,
            gateway,
            loaded: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Fetch the entity once and memoize it; `None` if it does not exist.
    pub async fn load(&self) -> Result<Option<Arc<dyn Entity>>> {
        let loaded = self
            .loaded
            .get_or_try_init(|| async {
                debug!("Loading proxy {} #{}", self.entity_type, self.id);
                let found = self
                    .gateway
                    .find_by_ids(std::slice::from_ref(&self.id))
                    .await?;
                Ok::<_, OrmError>(found.first())
            })
            .await?;
        Ok(loaded.clone())
    }

    pub async fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.load().await? {
            Some(entity) => Ok(Some(entity.to_record()?.decode::<T>()?)),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for EntityProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityProxy")
            .field("entity_type", &self.entity_type)
            .field("id", &self.id)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl Entity for EntityProxy {
    fn entity_type(&self) -> EntityType {
        self.entity_type.clone()
    }

    fn id(&self) -> Option<EntityId> {
        Some(self.id.clone())
    }

    fn to_record(&self) -> Result<Record> {
        match self.loaded.get() {
            Some(Some(entity)) => entity.to_record(),
            Some(None) => Err(OrmError::Mapping(format!(
                "proxy {} #{} points at a missing entity",
                self.entity_type, self.id
            ))),
            None => Err(OrmError::Mapping(format!(
                "proxy {} #{} is not loaded",
                self.entity_type, self.id
            ))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
