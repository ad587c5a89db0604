//! Cache store boundary
//!
//! The pipeline only needs string get/put with a TTL. Production backends
//! implement [`CacheStore`]; [`InMemoryCacheStore`] covers tests and
//! single-process use.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Key-value store holding serialized results
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Value under `key`, `None` on a miss or after expiry
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` for `ttl`; returns whether the store accepted it
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<bool>;

    /// Remove `key`; returns whether an entry existed
    async fn forget(&self, key: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local store with per-entry expiry
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<bool> {
        if ttl.is_zero() {
            return Ok(false);
        }
        let expires_at = Instant::now().checked_add(ttl).ok_or_else(|| Error::Cache {
            message: format!("TTL of {}s is out of range", ttl.as_secs()),
        })?;
        let entry = CacheEntry { value, expires_at };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry);
        Ok(true)
    }

    async fn forget(&self, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some())
    }
}

/// Named cache stores; the configured store name selects one
#[derive(Clone, Default)]
pub struct CacheStoreRegistry {
    stores: HashMap<String, Arc<dyn CacheStore>>,
}

impl CacheStoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a single in-memory store under `memory`
    pub fn with_memory() -> Self {
        let mut registry = Self::new();
        registry.register("memory", Arc::new(InMemoryCacheStore::new()));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, store: Arc<dyn CacheStore>) -> &mut Self {
        self.stores.insert(name.into(), store);
        self
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn CacheStore>> {
        self.stores.get(name).cloned().ok_or_else(|| {
            let mut known: Vec<&str> = self.stores.keys().map(String::as_str).collect();
            known.sort_unstable();
            Error::configuration(format!(
                "Cache store '{}' is not registered (known stores: {})",
                name,
                known.join(", ")
            ))
        })
    }
}
