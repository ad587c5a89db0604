//! Outcome of a transformation
//!
//! A [`TransformerResult`] is built once per pipeline run and never mutated
//! afterwards. It is what gets written to the result cache and what the
//! completion event carries, so it round-trips through serde.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Context, Provider};

const UNKNOWN_ERROR: &str = "Transformation failed without an error message";

/// Terminal status of a transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformerStatus {
    Completed,
    Failed,
}

/// Who produced a result, with what, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerMetadata {
    model: String,
    provider: Provider,
    transformer: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Context::is_empty")]
    context: Context,
}

impl TransformerMetadata {
    /// Metadata stamped with the current time
    pub fn new(model: impl Into<String>, provider: Provider, transformer: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            provider,
            transformer: transformer.into(),
            timestamp: Utc::now(),
            context: Context::new(),
        }
    }

    /// Copy carrying the caller's context map
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn transformer(&self) -> &str {
        &self.transformer
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

/// Result of one transformation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerResult {
    status: TransformerStatus,
    content: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
    metadata: Option<TransformerMetadata>,
}

impl TransformerResult {
    /// Successful result
    pub fn completed(content: impl Into<String>, metadata: Option<TransformerMetadata>) -> Self {
        Self {
            status: TransformerStatus::Completed,
            content: Some(content.into()),
            errors: Vec::new(),
            metadata,
        }
    }

    /// Failed result; always carries at least one error message
    pub fn failed<I, S>(errors: I, metadata: Option<TransformerMetadata>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut errors: Vec<String> = errors.into_iter().map(Into::into).collect();
        if errors.is_empty() {
            errors.push(UNKNOWN_ERROR.to_string());
        }

        Self {
            status: TransformerStatus::Failed,
            content: None,
            errors,
            metadata,
        }
    }

    pub fn status(&self) -> TransformerStatus {
        self.status
    }

    pub fn is_successful(&self) -> bool {
        self.status == TransformerStatus::Completed
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn into_content(self) -> Option<String> {
        self.content
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn metadata(&self) -> Option<&TransformerMetadata> {
        self.metadata.as_ref()
    }

    /// Decode structured content
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.content {
            Some(content) => Ok(Some(serde_json::from_str(content)?)),
            None => Ok(None),
        }
    }

    /// Copy whose metadata carries the given context; results without
    /// metadata are returned unchanged
    pub fn with_context(mut self, context: Context) -> Self {
        self.metadata = self.metadata.map(|m| m.with_context(context));
        self
    }
}
