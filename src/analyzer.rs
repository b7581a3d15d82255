//! Entity analyzer: decides which gateway kind an entity type needs.
//!
//! Inspecting an entity type goes through a [`MetadataSource`], which is
//! assumed to be expensive. The result is cached in the manager's cache
//! backend under `meta_<identity>_<entity type>` and reused until it expires.

use crate::app::ports::{CacheHandle, MetadataSource};
use crate::constants::METADATA_CACHE_FIELD;
use crate::domain::{EntityMetadata, EntityType, RelationMetadata};
use crate::error::Result;
use crate::metrics::AnalyzerMetrics;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct EntityAnalyzer {
    metadata: Arc<EntityMetadata>,
    cached: bool,
}

impl EntityAnalyzer {
    /// Load metadata for `entity_type` from `cache`, inspecting `source` on a miss.
    pub async fn analyze(
        entity_type: &EntityType,
        source: &dyn MetadataSource,
        cache: Arc<dyn CacheHandle>,
    ) -> Result<Self> {
        if let Some(value) = cache.get(METADATA_CACHE_FIELD).await? {
            match serde_json::from_value::<EntityMetadata>(value) {
                Ok(metadata) if metadata.entity_type == *entity_type => {
                    debug!("Analyzer cache hit for {}", entity_type);
                    AnalyzerMetrics::record_cache_hit();
                    return Ok(Self {
                        metadata: Arc::new(metadata),
                        cached: true,
                    });
                }
                Ok(metadata) => {
                    warn!(
                        "Analyzer cache for {} holds metadata of {}, re-inspecting",
                        entity_type, metadata.entity_type
                    );
                }
                Err(e) => {
                    warn!("Discarding unreadable analyzer cache for {}: {}", entity_type, e);
                }
            }
        }

        AnalyzerMetrics::record_cache_miss();
        let metadata = source.inspect(entity_type)?;
        cache
            .set(METADATA_CACHE_FIELD, serde_json::to_value(&metadata)?)
            .await?;
        debug!(
            "Analyzed {}: gateway kind `{}`, source `{}`",
            entity_type, metadata.gateway, metadata.source
        );

        Ok(Self {
            metadata: Arc::new(metadata),
            cached: false,
        })
    }

    /// Analyzer over metadata that is already known.
    pub fn from_metadata(metadata: EntityMetadata) -> Self {
        Self {
            metadata: Arc::new(metadata),
            cached: false,
        }
    }

    /// Gateway-kind code of the entity type.
    pub fn gateway(&self) -> &str {
        &self.metadata.gateway
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.metadata.entity_type
    }

    pub fn source(&self) -> &str {
        &self.metadata.source
    }

    pub fn relations(&self) -> &[RelationMetadata] {
        &self.metadata.relations
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    /// Whether the metadata came from the cache rather than a fresh inspection.
    pub fn was_cached(&self) -> bool {
        self.cached
    }
}
