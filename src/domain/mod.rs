//! Domain shapes shared by the manager, its gateways and callers.

pub mod collection;
pub mod entity;
pub mod metadata;
pub mod record;

pub use collection::EntityCollection;
pub use entity::{Entity, EntityId, EntityModel, EntityType};
pub use metadata::{EntityMetadata, RelationMetadata};
pub use record::Record;
