use crate::app::ports::{CacheBackend, CacheHandle};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// In-process cache backend; entries expire `ttl` after they were written.
#[derive(Clone, Default)]
pub struct MemoryCacheBackend {
    handles: Arc<Mutex<HashMap<String, Arc<MemoryCacheHandle>>>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handles.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get_cache(&self, key: &str, ttl: Duration) -> Result<Arc<dyn CacheHandle>> {
        let mut handles = self.handles.lock();
        let handle: Arc<dyn CacheHandle> = handles
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!("Opening cache `{}` with ttl {:?}", key, ttl);
                Arc::new(MemoryCacheHandle::new(ttl))
            })
            .clone();
        Ok(handle)
    }
}

pub struct MemoryCacheHandle {
    ttl: chrono::Duration,
    fields: Mutex<HashMap<String, (Value, DateTime<Utc>)>>,
}

impl MemoryCacheHandle {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100)),
            fields: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CacheHandle for MemoryCacheHandle {
    async fn get(&self, field: &str) -> Result<Option<Value>> {
        let mut fields = self.fields.lock();
        let expired = match fields.get(field) {
            Some((value, expires_at)) if *expires_at > Utc::now() => return Ok(Some(value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            fields.remove(field);
        }
        Ok(None)
    }

    async fn set(&self, field: &str, value: Value) -> Result<()> {
        // TTLs past chrono's range never expire.
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.fields.lock().insert(field.to_string(), (value, expires_at));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.fields.lock().clear();
        Ok(())
    }
}
