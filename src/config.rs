use crate::constants::{ANALYZER_CACHE_TTL_SECS, DEFAULT_MANAGER_IDENTITY, MEMORY_ENGINE};
use crate::domain::{EntityMetadata, RelationMetadata};
use crate::error::{OrmError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "orm.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Entity types keyed by their (possibly `\`-prefixed) type name.
    #[serde(default)]
    pub entities: BTreeMap<String, EntityConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Identity the analyzer cache keys are scoped by.
    #[serde(default = "default_identity")]
    pub identity: String,
    #[serde(default = "default_analyzer_cache_ttl_secs")]
    pub analyzer_cache_ttl_secs: u64,
}

impl ManagerConfig {
    pub fn analyzer_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.analyzer_cache_ttl_secs)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            identity: default_identity(),
            analyzer_cache_ttl_secs: default_analyzer_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Directory for daily-rotated JSON logs; console only when absent.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_file_name")]
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            directory: None,
            file_name: default_log_file_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    #[serde(default = "default_gateway")]
    pub gateway: String,
    pub source: Option<String>,
    /// Relation name → target entity type.
    #[serde(default)]
    pub relations: BTreeMap<String, String>,
}

impl EntityConfig {
    pub fn to_metadata(&self, entity_type: &str) -> EntityMetadata {
        let mut metadata = EntityMetadata::new(entity_type, self.gateway.clone());
        if let Some(source) = &self.source {
            metadata.source = source.clone();
        }
        metadata.relations = self
            .relations
            .iter()
            .map(|(name, target)| RelationMetadata::new(name.clone(), target.as_str()))
            .collect();
        metadata
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            OrmError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `ORM_CONFIG` (after reading `.env`), falling back to
    /// `orm.toml`, and to defaults when neither file exists.
    pub fn load_default() -> Result<Self> {
        dotenv::dotenv().ok();
        match std::env::var("ORM_CONFIG") {
            Ok(path) => Self::load(path),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            Err(_) => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.manager.identity.trim().is_empty() {
            return Err(OrmError::Config("manager.identity must not be empty".to_string()));
        }
        for (name, entity) in &self.entities {
            if entity.gateway.trim().is_empty() {
                return Err(OrmError::Config(format!(
                    "entities.\"{}\".gateway must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn default_identity() -> String {
    DEFAULT_MANAGER_IDENTITY.to_string()
}

fn default_analyzer_cache_ttl_secs() -> u64 {
    ANALYZER_CACHE_TTL_SECS
}

fn default_log_filter() -> String {
    "orm_manager=info".to_string()
}

fn default_log_file_name() -> String {
    "orm.log".to_string()
}

fn default_gateway() -> String {
    MEMORY_ENGINE.to_string()
}
