/// Constants shared by the manager, the analyzer and the reference collaborators.

/// Separator used by fully-qualified entity type names (`\App\Entity\Venue`).
pub const NAMESPACE_SEPARATOR: char = '\\';

/// Lifetime of an analyzer cache entry: 24 hours.
pub const ANALYZER_CACHE_TTL_SECS: u64 = 86_400;

/// Prefix of analyzer cache keys: `meta_<identity>_<entity type>`.
pub const ANALYZER_CACHE_PREFIX: &str = "meta_";

/// Identity used when the configuration does not name the manager.
pub const DEFAULT_MANAGER_IDENTITY: &str = "Manager";

/// Gateway-kind code of the bundled in-memory engine.
pub const MEMORY_ENGINE: &str = "memory";

/// Field of a cache handle holding the serialized entity metadata.
pub const METADATA_CACHE_FIELD: &str = "metadata";

/// Build the analyzer cache key for one manager identity and entity type.
pub fn analyzer_cache_key(identity: &str, entity_type: &str) -> String {
    format!("{}{}_{}", ANALYZER_CACHE_PREFIX, identity, entity_type)
}
