//! Error types for the Morph core library
//!
//! Transformation failures are reported as data inside a failed
//! `TransformerResult`. The variants here cover what is raised instead:
//! misconfiguration, rejected input, rate limiting, and the I/O failures
//! that adapters report before the pipeline converts them.

use thiserror::Error;

/// Main error type for Morph operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing handler, unknown provider, invalid settings
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Input rejected by a transformer hook
    #[error("Validation error: {field} - {message}")]
    Validation {
        field: String,
        message: String,
    },

    /// Too many attempts for a rate-limit key
    #[error("Rate limit exceeded for '{key}': {max_attempts} attempts allowed, retry in {retry_after_secs}s")]
    RateLimited {
        key: String,
        max_attempts: u32,
        retry_after_secs: u64,
    },

    /// Remote content could not be fetched
    #[error("Failed to fetch {url}: {message}")]
    Fetch {
        url: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Provider-related errors
    #[error("Provider error: {provider} - {message}")]
    Provider {
        provider: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// HTTP/Network related errors
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        status_code: Option<u16>,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Media loading or decoding errors
    #[error("Media error: {message}")]
    Media {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Cache store errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Job queue errors
    #[error("Queue error: {message}")]
    Queue { message: String },

    /// Operation exceeded its deadline
    #[error("Timed out after {seconds}s: {message}")]
    Timeout { message: String, seconds: u64 },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error without a source
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error for a named input field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a media error without a source
    pub fn media(message: impl Into<String>) -> Self {
        Error::Media {
            message: message.into(),
            source: None,
        }
    }

    /// Whether retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http { .. }
                | Error::Provider { .. }
                | Error::Fetch { .. }
                | Error::Timeout { .. }
                | Error::Cache { .. }
                | Error::Queue { .. }
        )
    }
}

// Conversion implementations
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::configuration("no handler");
        assert_eq!(err.to_string(), "Configuration error: no handler");
    }

    #[test]
    fn test_rate_limited_display() {
        let err = Error::RateLimited {
            key: "morph:rate-limit:global".to_string(),
            max_attempts: 3,
            retry_after_secs: 42,
        };
        let message = err.to_string();
        assert!(message.contains("morph:rate-limit:global"));
        assert!(message.contains("42s"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Cache { message: "down".into() }.is_retryable());
        assert!(Error::Timeout { message: "job".into(), seconds: 5 }.is_retryable());
        assert!(!Error::configuration("bad").is_retryable());
        assert!(!Error::validation("content", "empty").is_retryable());
    }

    #[test]
    fn test_json_conversion() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::Json { .. }));
    }
}
