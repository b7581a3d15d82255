use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Not found data gateway for entity `{entity_type}`: {reason}")]
    GatewayNotFound { entity_type: String, reason: String },

    #[error("Item #{position} is not an entity: {reason}")]
    InvalidEntity { position: usize, reason: String },

    #[error("Invalid engine argument: {0}")]
    InvalidEngineArgument(String),

    #[error("Unknown entity type `{0}`")]
    UnknownEntity(String),

    #[error("Gateway for `{0}` is already under construction and has published no link (self-request during its build, or a concurrent first resolution)")]
    ResolutionCycle(String),

    #[error("Entity of type `{0}` has no id")]
    MissingId(String),

    #[error("Entity mapping failed: {0}")]
    Mapping(String),

    #[error("Manager was dropped while a gateway still referenced it")]
    ManagerDropped,

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl OrmError {
    pub fn gateway_not_found(entity_type: impl Into<String>, reason: impl Into<String>) -> Self {
        OrmError::GatewayNotFound {
            entity_type: entity_type.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrmError>;
