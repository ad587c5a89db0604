//! Rate limiting using fixed-window attempt counters
//!
//! Every checked call increments the counter for its key. Once the count
//! exceeds `max_attempts` inside the current window the call is rejected
//! with the number of seconds until the window resets.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Longest accepted window: ten years
pub const MAX_DECAY_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// When false every check is a no-op
    pub enabled: bool,
    /// Attempts allowed per window
    pub max_attempts: u32,
    /// Window length in seconds
    pub decay_secs: u64,
    /// Prefix applied to every bucket key
    pub prefix: String,
    /// Bucket used by [`RateLimiter::check_global`]
    pub global_key: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 60,
            decay_secs: 60,
            prefix: "morph:rate-limit".to_string(),
            global_key: "global".to_string(),
        }
    }
}

impl RateLimitConfig {
    /// Enabled configuration with the given quota
    pub fn new(max_attempts: u32, decay: Duration) -> Self {
        Self {
            max_attempts,
            decay_secs: decay.as_secs(),
            ..Self::default()
        }
    }

    /// Disabled configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn decay(&self) -> Duration {
        Duration::from_secs(self.decay_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.max_attempts == 0 {
            return Err(Error::configuration("rate_limit.max_attempts cannot be zero"));
        }
        if self.decay_secs == 0 {
            return Err(Error::configuration("rate_limit.decay_secs cannot be zero"));
        }
        if self.decay_secs > MAX_DECAY_SECS {
            return Err(Error::configuration(format!(
                "rate_limit.decay_secs must be at most {} (got {})",
                MAX_DECAY_SECS, self.decay_secs
            )));
        }
        if self.global_key.is_empty() {
            return Err(Error::configuration("rate_limit.global_key cannot be empty"));
        }
        Ok(())
    }
}

/// Outcome of an atomic increment-and-check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHit {
    pub allowed: bool,
    /// Attempts counted in the current window, including this one
    pub attempts: u32,
    /// Time until the window resets
    pub retry_after: Duration,
}

/// Read-only snapshot of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BucketState {
    pub attempts: u32,
    pub retry_after: Duration,
}

/// Counter store shared by every caller
///
/// `increment_and_check` must be atomic per key so that concurrent callers
/// cannot both be admitted past the limit.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn increment_and_check(&self, key: &str, window: Duration, max_attempts: u32) -> Result<RateLimitHit>;

    /// Current state without counting an attempt
    async fn state(&self, key: &str) -> Result<BucketState>;

    async fn clear(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    attempts: u32,
    resets_at: Instant,
}

/// Process-local fixed-window counters
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn increment_and_check(&self, key: &str, window: Duration, max_attempts: u32) -> Result<RateLimitHit> {
        let now = Instant::now();
        let resets_at = window_end(now, window);
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let entry = windows.entry(key.to_string()).or_insert(Window { attempts: 0, resets_at });
        if entry.resets_at <= now {
            *entry = Window { attempts: 0, resets_at };
        }

        entry.attempts = entry.attempts.saturating_add(1);

        Ok(RateLimitHit {
            allowed: entry.attempts <= max_attempts,
            attempts: entry.attempts,
            retry_after: entry.resets_at.saturating_duration_since(now),
        })
    }

    async fn state(&self, key: &str) -> Result<BucketState> {
        let now = Instant::now();
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(match windows.get(key) {
            Some(window) if window.resets_at > now => BucketState {
                attempts: window.attempts,
                retry_after: window.resets_at - now,
            },
            _ => BucketState::default(),
        })
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// End of a window opened at `now`, clamped to [`MAX_DECAY_SECS`]
fn window_end(now: Instant, window: Duration) -> Instant {
    let window = window.min(Duration::from_secs(MAX_DECAY_SECS));
    now.checked_add(window).unwrap_or(now)
}

/// Quota introspection for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub key: String,
    pub attempts: u32,
    pub remaining: u32,
    pub retry_after_secs: u64,
    pub limited: bool,
}

/// Gate checked before any transformer work begins
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Limiter over a fresh in-memory store
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), config)
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn bucket(&self, key: &str) -> String {
        format!("{}:{}", self.config.prefix, key)
    }

    /// Count an attempt for `key`, failing once the quota is exhausted
    pub async fn check(&self, key: &str) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let bucket = self.bucket(key);
        let hit = self
            .store
            .increment_and_check(&bucket, self.config.decay(), self.config.max_attempts)
            .await?;

        if hit.allowed {
            tracing::trace!(key = %bucket, attempts = hit.attempts, "rate limit check passed");
            return Ok(());
        }

        let retry_after_secs = ceil_secs(hit.retry_after);
        tracing::warn!(
            key = %bucket,
            attempts = hit.attempts,
            max_attempts = self.config.max_attempts,
            retry_after_secs,
            "rate limit exceeded"
        );
        Err(Error::RateLimited {
            key: bucket,
            max_attempts: self.config.max_attempts,
            retry_after_secs,
        })
    }

    /// Check the configured global bucket
    pub async fn check_global(&self) -> Result<()> {
        let key = self.config.global_key.clone();
        self.check(&key).await
    }

    /// Attempts left in the current window
    pub async fn remaining(&self, key: &str) -> Result<u32> {
        Ok(self.status(key).await?.remaining)
    }

    pub async fn status(&self, key: &str) -> Result<RateLimitStatus> {
        let bucket = self.bucket(key);
        if !self.config.enabled {
            return Ok(RateLimitStatus {
                key: bucket,
                attempts: 0,
                remaining: self.config.max_attempts,
                retry_after_secs: 0,
                limited: false,
            });
        }

        let state = self.store.state(&bucket).await?;
        let limited = state.attempts >= self.config.max_attempts;
        Ok(RateLimitStatus {
            key: bucket,
            attempts: state.attempts,
            remaining: self.config.max_attempts.saturating_sub(state.attempts),
            retry_after_secs: if limited { ceil_secs(state.retry_after) } else { 0 },
            limited,
        })
    }

    pub async fn global_status(&self) -> Result<RateLimitStatus> {
        let key = self.config.global_key.clone();
        self.status(&key).await
    }

    /// Clear the window for `key`
    pub async fn reset(&self, key: &str) -> Result<()> {
        let bucket = self.bucket(key);
        tracing::debug!(key = %bucket, "rate limit reset");
        self.store.clear(&bucket).await
    }

    pub async fn reset_global(&self) -> Result<()> {
        let key = self.config.global_key.clone();
        self.reset(&key).await
    }
}

/// Whole seconds, rounded up, never below one
fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32, decay_secs: u64) -> RateLimiter {
        RateLimiter::in_memory(RateLimitConfig::new(max_attempts, Duration::from_secs(decay_secs)))
    }

    #[test]
    fn test_rate_limit_config_default() {
        let config = RateLimitConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_attempts, 60);
        assert_eq!(config.decay(), Duration::from_secs(60));
        assert_eq!(config.global_key, "global");
    }

    #[test]
    fn test_rate_limit_config_validation() {
        let mut config = RateLimitConfig::default();
        assert!(config.validate().is_ok());

        config.max_attempts = 0;
        assert!(config.validate().is_err());

        config.max_attempts = 10;
        config.decay_secs = 0;
        assert!(config.validate().is_err());

        config.decay_secs = MAX_DECAY_SECS;
        assert!(config.validate().is_ok());
        config.decay_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));

        // Disabled limiter accepts anything
        config.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_three_pass_then_fourth_is_limited() {
        let limiter = limiter(3, 60);

        for _ in 0..3 {
            limiter.check("tenant-1").await.unwrap();
        }

        match limiter.check("tenant-1").await {
            Err(Error::RateLimited { key, max_attempts, retry_after_secs }) => {
                assert_eq!(key, "morph:rate-limit:tenant-1");
                assert_eq!(max_attempts, 3);
                assert!(retry_after_secs > 0);
                assert!(retry_after_secs <= 60);
            }
            other => panic!("expected rate limit error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unbounded_window_is_clamped() {
        let limiter = limiter(3, u64::MAX);

        for _ in 0..3 {
            limiter.check("k").await.unwrap();
        }
        match limiter.check("k").await {
            Err(Error::RateLimited { retry_after_secs, .. }) => {
                assert!(retry_after_secs > 0 && retry_after_secs <= MAX_DECAY_SECS);
            }
            other => panic!("expected rate limit error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reset_allows_immediately() {
        let limiter = limiter(3, 60);
        for _ in 0..3 {
            limiter.check("k").await.unwrap();
        }
        assert!(limiter.check("k").await.is_err());

        limiter.reset("k").await.unwrap();
        assert!(limiter.check("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = limiter(1, 60);
        limiter.check("a").await.unwrap();
        limiter.check("b").await.unwrap();
        assert!(limiter.check("a").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expires() {
        let limiter = limiter(1, 10);
        limiter.check("k").await.unwrap();
        assert!(limiter.check("k").await.is_err());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(limiter.check("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_status_does_not_mutate() {
        let limiter = limiter(2, 60);
        limiter.check("k").await.unwrap();

        let first = limiter.status("k").await.unwrap();
        let second = limiter.status("k").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.remaining, 1);
        assert!(!first.limited);
        assert_eq!(limiter.remaining("k").await.unwrap(), 1);

        limiter.check("k").await.unwrap();
        let status = limiter.status("k").await.unwrap();
        assert!(status.limited);
        assert_eq!(status.remaining, 0);
        assert!(status.retry_after_secs > 0);
    }

    #[tokio::test]
    async fn test_global_bucket() {
        let limiter = limiter(1, 60);
        limiter.check_global().await.unwrap();
        assert!(limiter.check_global().await.is_err());
        assert!(limiter.global_status().await.unwrap().limited);

        limiter.reset_global().await.unwrap();
        assert!(limiter.check_global().await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_limiter_is_a_no_op() {
        let limiter = RateLimiter::in_memory(RateLimitConfig {
            max_attempts: 1,
            ..RateLimitConfig::disabled()
        });
        for _ in 0..10 {
            limiter.check_global().await.unwrap();
        }
        let status = limiter.global_status().await.unwrap();
        assert_eq!(status.attempts, 0);
        assert_eq!(status.remaining, 1);
        assert!(!status.limited);
    }

    #[tokio::test]
    async fn test_concurrent_checks_never_over_admit() {
        let limiter = limiter(5, 60);
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check("shared").await.is_ok() })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ceil_secs(Duration::from_secs(3)), 3);
        assert_eq!(ceil_secs(Duration::ZERO), 1);
    }
}
