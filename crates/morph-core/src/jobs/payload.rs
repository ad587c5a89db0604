//! Serialized form of a queued transformation
//!
//! Named fields only, with an explicit version. Transformers travel by
//! registry name and media travels base64-encoded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::jobs::QueueConfig;
use crate::media::{Content, EncodedMedia};
use crate::types::Context;

/// Current payload layout version
pub const PAYLOAD_VERSION: u32 = 1;

/// Transport-safe content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum JobContent {
    Text(String),
    Media(EncodedMedia),
}

impl JobContent {
    pub fn from_content(content: &Content) -> Self {
        match content {
            Content::Text(text) => JobContent::Text(text.clone()),
            Content::Media(media) => JobContent::Media(media.encode()),
        }
    }

    /// Rebuild the rich content
    pub fn decode(&self) -> Result<Content> {
        match self {
            JobContent::Text(text) => Ok(Content::Text(text.clone())),
            JobContent::Media(encoded) => encoded.decode().map(Content::Media),
        }
    }

    pub fn summary(&self) -> String {
        match self {
            JobContent::Text(text) => Content::Text(text.clone()).summary(),
            JobContent::Media(encoded) => format!(
                "{} media '{}'",
                encoded.kind,
                encoded.title.as_deref().unwrap_or("untitled")
            ),
        }
    }
}

/// One queued transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub version: u32,
    pub id: Uuid,
    /// Registry name of the transformer
    pub transformer: String,
    /// Registry entry scoped to this job; set when the transformer was
    /// registered for this dispatch only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,
    pub content: JobContent,
    #[serde(default)]
    pub context: Context,
    pub tries: u32,
    pub timeout_secs: u64,
    pub queue: String,
    pub connection: String,
    pub enqueued_at: DateTime<Utc>,
}

impl JobPayload {
    pub fn new(transformer: impl Into<String>, content: &Content, context: Context, config: &QueueConfig) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            id: Uuid::new_v4(),
            transformer: transformer.into(),
            binding: None,
            content: JobContent::from_content(content),
            context,
            tries: config.tries.max(1),
            timeout_secs: config.timeout_secs,
            queue: config.name.clone(),
            connection: config.connection.clone(),
            enqueued_at: Utc::now(),
        }
    }

    /// Bind the payload to a registry entry of its own, keyed by job id
    pub fn scoped(mut self) -> Self {
        self.binding = Some(format!("{}#{}", self.transformer, self.id));
        self
    }

    /// Key the worker resolves the transformer by
    pub fn registry_key(&self) -> &str {
        self.binding.as_deref().unwrap_or(&self.transformer)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a payload, rejecting layouts this build does not know
    pub fn from_json(raw: &str) -> Result<Self> {
        let payload: Self = serde_json::from_str(raw)?;
        if payload.version != PAYLOAD_VERSION {
            return Err(Error::Queue {
                message: format!(
                    "Unsupported job payload version {} (expected {})",
                    payload.version, PAYLOAD_VERSION
                ),
            });
        }
        Ok(payload)
    }
}
