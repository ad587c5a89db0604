//! Queued execution of transformers
//!
//! A transformation requested with async dispatch is reduced to a
//! [`JobPayload`], pushed onto a [`JobQueue`], and later picked up by a
//! [`Worker`] that runs it as a [`TransformJob`] with lifecycle events and
//! bounded retries.

pub mod job;
pub mod payload;
pub mod queue;
pub mod registry;
pub mod worker;

pub use job::{JobState, TransformJob};
pub use payload::{JobContent, JobPayload, PAYLOAD_VERSION};
pub use queue::{InMemoryJobQueue, JobQueue};
pub use registry::TransformerRegistry;
pub use worker::Worker;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Queue placement and retry policy for queued jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue name
    pub name: String,
    /// Queue connection name
    pub connection: String,
    /// Total attempts per job, including the first
    pub tries: u32,
    /// Deadline of a single attempt, in seconds
    pub timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            connection: "memory".to_string(),
            tries: 3,
            timeout_secs: 120,
        }
    }
}

impl QueueConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tries == 0 {
            return Err(Error::configuration("queue.tries must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::configuration("queue.timeout_secs must be greater than 0"));
        }
        if self.name.is_empty() {
            return Err(Error::configuration("queue.name cannot be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = QueueConfig::default();
        assert_eq!(config.name, "default");
        assert_eq!(config.timeout(), Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = QueueConfig {
            timeout_secs: 0,
            ..QueueConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
