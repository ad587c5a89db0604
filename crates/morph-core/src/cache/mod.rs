//! Result cache
//!
//! Successful results are stored as JSON under `{prefix}:{fingerprint}`.
//! The cache is an optimization only: every store failure is logged and
//! reported to the pipeline as a miss or a skipped write.

pub mod fingerprint;
pub mod store;

pub use fingerprint::CacheKeyBuilder;
pub use store::{CacheStore, CacheStoreRegistry, InMemoryCacheStore};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::result::TransformerResult;

/// Longest accepted `ttl_secs`: ten years
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Result cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether results are cached at all
    pub enabled: bool,
    /// Name of the store in the [`CacheStoreRegistry`]
    pub store: String,
    /// Key prefix
    pub prefix: String,
    /// Time-to-live of cached results, in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store: "memory".to_string(),
            prefix: "morph".to_string(),
            ttl_secs: 3600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.prefix.is_empty() {
            return Err(Error::configuration("cache.prefix cannot be empty"));
        }
        if self.enabled && self.store.is_empty() {
            return Err(Error::configuration("cache.store cannot be empty"));
        }
        if self.ttl_secs > MAX_TTL_SECS {
            return Err(Error::configuration(format!(
                "cache.ttl_secs must be at most {} (got {})",
                MAX_TTL_SECS, self.ttl_secs
            )));
        }
        Ok(())
    }
}

/// Typed view over a [`CacheStore`] for transformer results
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Resolve the configured store by name
    pub fn from_registry(registry: &CacheStoreRegistry, config: CacheConfig) -> Result<Self> {
        let store = registry.resolve(&config.store)?;
        Ok(Self::new(store, config))
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    /// Cached successful result, if any
    pub async fn lookup(&self, key: &str) -> Option<TransformerResult> {
        if !self.config.enabled {
            return None;
        }

        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key, "result cache miss");
                return None;
            }
            Err(error) => {
                tracing::warn!(key, %error, "result cache read failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<TransformerResult>(&raw) {
            Ok(result) if result.is_successful() => {
                tracing::debug!(key, "result cache hit");
                Some(result)
            }
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(key, %error, "cached result is unreadable; treating as miss");
                None
            }
        }
    }

    /// Store a successful result; failed results and store errors are skipped
    pub async fn store(&self, key: &str, result: &TransformerResult) {
        if !self.config.enabled || !result.is_successful() {
            return;
        }

        let raw = match serde_json::to_string(result) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(key, %error, "failed to serialize result for cache");
                return;
            }
        };

        match self.store.put(key, raw, self.config.ttl()).await {
            Ok(true) => tracing::debug!(key, ttl_secs = self.config.ttl_secs, "result cached"),
            Ok(false) => tracing::debug!(key, "cache store declined result"),
            Err(error) => tracing::warn!(key, %error, "result cache write failed"),
        }
    }
}
