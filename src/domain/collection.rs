use crate::domain::entity::Entity;
use crate::error::Result;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Ordered result of a gateway lookup.
#[derive(Debug, Clone, Default)]
pub struct EntityCollection {
    items: Vec<Arc<dyn Entity>>,
}

impl EntityCollection {
    pub fn new(items: Vec<Arc<dyn Entity>>) -> Self {
        Self { items }
    }

    pub fn first(&self) -> Option<Arc<dyn Entity>> {
        self.items.first().cloned()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Entity>> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Arc<dyn Entity>> {
        self.items
    }

    /// Decode every item into `T` through its record form.
    pub fn decode_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.items
            .iter()
            .map(|item| item.to_record()?.decode::<T>())
            .collect()
    }
}

impl FromIterator<Arc<dyn Entity>> for EntityCollection {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Entity>>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for EntityCollection {
    type Item = Arc<dyn Entity>;
    type IntoIter = std::vec::IntoIter<Arc<dyn Entity>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
