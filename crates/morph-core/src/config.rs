//! Configuration management
//!
//! Configuration is assembled from:
//! - Default values
//! - A configuration file (TOML, YAML or JSON, chosen by extension)
//! - `MORPH_*` environment variables

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache::CacheConfig;
use crate::error::{Error, Result};
use crate::http::HttpConfig;
use crate::jobs::QueueConfig;
use crate::provider::ProvidersConfig;
use crate::rate_limit::RateLimitConfig;
use crate::types::Provider;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphConfig {
    /// Result cache settings
    pub cache: CacheConfig,

    /// Default provider, per-provider models and endpoints
    pub providers: ProvidersConfig,

    /// Rate-limit gate settings
    pub rate_limit: RateLimitConfig,

    /// Async queue and job retry settings
    pub queue: QueueConfig,

    /// Outbound HTTP settings
    pub http: HttpConfig,
}

impl MorphConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Configuration {
            message: format!("Failed to read config file {}: {}", path.display(), e),
            source: Some(e.into()),
        })?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
        let parsed: std::result::Result<Self, anyhow::Error> = match extension {
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(Into::into),
            "toml" => toml::from_str(&content).map_err(Into::into),
            "json" => serde_json::from_str(&content).map_err(Into::into),
            other => {
                return Err(Error::configuration(format!(
                    "Unsupported config format '{}' for {}; use .toml, .yaml or .json",
                    other,
                    path.display()
                )))
            }
        };

        parsed.map_err(|e| Error::Configuration {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
            source: Some(e),
        })
    }

    /// Load from an optional file, apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("MORPH_CACHE_ENABLED") {
            self.cache.enabled = parse_bool("MORPH_CACHE_ENABLED", &value)?;
        }
        if let Some(value) = lookup("MORPH_CACHE_STORE") {
            self.cache.store = value;
        }
        if let Some(value) = lookup("MORPH_CACHE_PREFIX") {
            self.cache.prefix = value;
        }
        if let Some(value) = lookup("MORPH_CACHE_TTL") {
            self.cache.ttl_secs = parse_number("MORPH_CACHE_TTL", &value)?;
        }
        if let Some(value) = lookup("MORPH_DEFAULT_PROVIDER") {
            self.providers.default = value.parse()?;
        }
        for provider in Provider::ALL {
            let name = format!("MORPH_MODEL_{}", provider.as_str().to_ascii_uppercase());
            if let Some(value) = lookup(&name) {
                self.providers.models.insert(provider, parse_model(&name, value)?);
            }
        }
        if let Some(value) = lookup("MORPH_DEFAULT_MODEL") {
            let model = parse_model("MORPH_DEFAULT_MODEL", value)?;
            self.providers.models.insert(self.providers.default, model);
        }
        if let Some(value) = lookup("MORPH_RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = parse_bool("MORPH_RATE_LIMIT_ENABLED", &value)?;
        }
        if let Some(value) = lookup("MORPH_RATE_LIMIT_MAX_ATTEMPTS") {
            self.rate_limit.max_attempts = parse_number("MORPH_RATE_LIMIT_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("MORPH_RATE_LIMIT_DECAY") {
            self.rate_limit.decay_secs = parse_number("MORPH_RATE_LIMIT_DECAY", &value)?;
        }
        if let Some(value) = lookup("MORPH_RATE_LIMIT_PREFIX") {
            self.rate_limit.prefix = value;
        }
        if let Some(value) = lookup("MORPH_RATE_LIMIT_GLOBAL_KEY") {
            self.rate_limit.global_key = value;
        }
        if let Some(value) = lookup("MORPH_QUEUE") {
            self.queue.name = value;
        }
        if let Some(value) = lookup("MORPH_QUEUE_CONNECTION") {
            self.queue.connection = value;
        }
        if let Some(value) = lookup("MORPH_JOB_TRIES") {
            self.queue.tries = parse_number("MORPH_JOB_TRIES", &value)?;
        }
        if let Some(value) = lookup("MORPH_JOB_TIMEOUT") {
            self.queue.timeout_secs = parse_number("MORPH_JOB_TIMEOUT", &value)?;
        }
        Ok(())
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.rate_limit.validate()?;
        self.queue.validate()?;
        if self.providers.default_model(self.providers.default).is_none() {
            return Err(Error::configuration(format!(
                "No model configured for default provider '{}'",
                self.providers.default
            )));
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration(format!(
            "{} must be a boolean, got '{}'",
            name, value
        ))),
    }
}

fn parse_model(name: &str, value: String) -> Result<String> {
    let model = value.trim();
    if model.is_empty() {
        return Err(Error::configuration(format!("{} cannot be empty", name)));
    }
    Ok(model.to_string())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::configuration(format!("{} must be a non-negative integer, got '{}'", name, value))
    })
}
