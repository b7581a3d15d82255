//! Per-manager gateway bookkeeping.
//!
//! Each entity type moves through `Unresolved → Reserved → Ready`:
//! a gateway under construction may publish a non-owning link (Reserved) so
//! that gateways it depends on can resolve it back without recursing, and the
//! manager commits the finished gateway (Ready), clearing the link.

use crate::app::ports::Gateway;
use crate::domain::EntityType;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Unresolved,
    Reserved,
    Ready,
}

#[derive(Default)]
pub struct GatewayTable {
    ready: HashMap<EntityType, Arc<dyn Gateway>>,
    links: HashMap<EntityType, Weak<dyn Gateway>>,
    constructing: HashSet<EntityType>,
}

impl GatewayTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready(&self, entity_type: &EntityType) -> Option<Arc<dyn Gateway>> {
        self.ready.get(entity_type).cloned()
    }

    /// Live link for `entity_type`; a link whose gateway was dropped is pruned.
    pub fn link(&mut self, entity_type: &EntityType) -> Option<Arc<dyn Gateway>> {
        let upgraded = self.links.get(entity_type)?.upgrade();
        if upgraded.is_none() {
            self.links.remove(entity_type);
        }
        upgraded
    }

    /// Publish `gateway` as the placeholder for `entity_type`.
    ///
    /// Returns `false` without touching anything when a real gateway exists.
    /// Otherwise the last reservation wins until commit.
    pub fn reserve(&mut self, entity_type: EntityType, gateway: &Arc<dyn Gateway>) -> bool {
        if self.ready.contains_key(&entity_type) {
            return false;
        }
        self.links.insert(entity_type, Arc::downgrade(gateway));
        true
    }

    /// Mark `entity_type` as being constructed. `false` if it already is.
    pub fn begin(&mut self, entity_type: &EntityType) -> bool {
        self.constructing.insert(entity_type.clone())
    }

    pub fn is_constructing(&self, entity_type: &EntityType) -> bool {
        self.constructing.contains(entity_type)
    }

    /// Forget a failed construction together with any link it published.
    pub fn abort(&mut self, entity_type: &EntityType) {
        self.constructing.remove(entity_type);
        self.links.remove(entity_type);
    }

    /// Make `gateway` the real gateway of `entity_type` and clear its link.
    ///
    /// Never replaces a committed gateway; the existing one is returned instead.
    pub fn commit(&mut self, entity_type: EntityType, gateway: Arc<dyn Gateway>) -> Arc<dyn Gateway> {
        self.constructing.remove(&entity_type);
        self.links.remove(&entity_type);
        self.ready.entry(entity_type).or_insert(gateway).clone()
    }

    pub fn state(&self, entity_type: &EntityType) -> GatewayState {
        if self.ready.contains_key(entity_type) {
            GatewayState::Ready
        } else if self
            .links
            .get(entity_type)
            .map_or(false, |link| link.strong_count() > 0)
        {
            GatewayState::Reserved
        } else {
            GatewayState::Unresolved
        }
    }

    /// Snapshot of every committed gateway, in entity type order.
    pub fn realized(&self) -> Vec<Arc<dyn Gateway>> {
        let mut entries: Vec<(&EntityType, &Arc<dyn Gateway>)> = self.ready.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, gateway)| gateway.clone()).collect()
    }

    pub fn realized_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = self.ready.keys().cloned().collect();
        types.sort();
        types
    }
}
