use crate::app::ports::GatewayEngine;
use crate::error::{OrmError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Gateway-kind code → engine building gateways of that kind.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn GatewayEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_engine(mut self, code: &str, engine: Arc<dyn GatewayEngine>) -> Result<Self> {
        self.insert(code, engine)?;
        Ok(self)
    }

    /// Insert or overwrite the engine for `code`.
    pub fn insert(&mut self, code: &str, engine: Arc<dyn GatewayEngine>) -> Result<()> {
        if code.trim().is_empty() {
            return Err(OrmError::InvalidEngineArgument(
                "engine code must not be empty".to_string(),
            ));
        }
        if engine.name().trim().is_empty() {
            return Err(OrmError::InvalidEngineArgument(format!(
                "engine registered under `{}` has an empty name",
                code
            )));
        }
        self.engines.insert(code.to_string(), engine);
        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<Arc<dyn GatewayEngine>> {
        self.engines.get(code).cloned()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.engines.contains_key(code)
    }

    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.engines.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engines: Vec<(&String, &str)> = self
            .engines
            .iter()
            .map(|(code, engine)| (code, engine.name()))
            .collect();
        f.debug_struct("EngineRegistry").field("engines", &engines).finish()
    }
}
