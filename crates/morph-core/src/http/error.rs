//! Provider call failures
//!
//! Every failed chat-completions call is reduced to an [`HttpError`] whose
//! [`FailureKind`] drives the retry loop.

use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::types::Provider;

/// What went wrong with a provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 401/403
    Unauthorized,
    /// 429
    Throttled,
    /// Any other 4xx
    Rejected,
    /// 5xx
    Upstream,
    /// Connect failures and timeouts
    Transport,
    Other,
}

impl FailureKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => FailureKind::Unauthorized,
            429 => FailureKind::Throttled,
            400..=499 => FailureKind::Rejected,
            500..=599 => FailureKind::Upstream,
            _ => FailureKind::Other,
        }
    }

    /// Worth another attempt
    pub fn is_transient(self) -> bool {
        matches!(self, FailureKind::Throttled | FailureKind::Upstream | FailureKind::Transport)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::Throttled => "throttled",
            FailureKind::Rejected => "rejected",
            FailureKind::Upstream => "upstream",
            FailureKind::Transport => "transport",
            FailureKind::Other => "other",
        };
        f.write_str(label)
    }
}

/// Failed provider call
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} failure{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
pub struct HttpError {
    pub kind: FailureKind,
    pub status: Option<u16>,
    /// Vendor error code or type, when the body carries one
    pub code: Option<String>,
    pub message: String,
    /// From the `Retry-After` header
    pub retry_after: Option<Duration>,
}

impl HttpError {
    /// Build from a non-2xx response, consuming its body
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.unwrap_or_default();
        let (code, message) = error_details(&body);

        Self {
            kind: FailureKind::from_status(status),
            status: Some(status),
            code,
            message,
            retry_after,
        }
    }

    /// Build from a transport-level failure
    pub fn from_request_error(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() || error.is_connect() {
            FailureKind::Transport
        } else {
            FailureKind::Other
        };

        Self {
            kind,
            status: error.status().map(|s| s.as_u16()),
            code: None,
            message: error.to_string(),
            retry_after: None,
        }
    }

    pub fn should_retry(&self) -> bool {
        self.kind.is_transient()
    }

    /// Convert into the crate error, attributing it to `provider`
    pub fn into_provider_error(self, provider: Provider) -> crate::Error {
        let message = match &self.code {
            Some(code) => format!("{} ({})", self.message, code),
            None => self.message.clone(),
        };
        crate::Error::Provider {
            provider: provider.to_string(),
            message,
            source: Some(anyhow::Error::new(self)),
        }
    }
}

impl From<HttpError> for crate::Error {
    fn from(error: HttpError) -> Self {
        crate::Error::Http {
            message: error.message.clone(),
            status_code: error.status,
            source: Some(anyhow::Error::new(error)),
        }
    }
}

/// Vendor code and message from an error body
///
/// Understands `{"error": {"code"|"type", "message"}}`, `{"error": "..."}`
/// and `{"message", "type"}`; anything else is returned verbatim.
fn error_details(body: &str) -> (Option<String>, String) {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return (None, body.to_string());
    };
    let text = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);

    match json.get("error") {
        Some(Value::String(message)) => (None, message.clone()),
        Some(error) => (
            text(error.get("code")).or_else(|| text(error.get("type"))),
            text(error.get("message")).unwrap_or_else(|| body.to_string()),
        ),
        None => match text(json.get("message")) {
            Some(message) => (text(json.get("type")), message),
            None => (None, body.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(FailureKind::from_status(401), FailureKind::Unauthorized);
        assert_eq!(FailureKind::from_status(429), FailureKind::Throttled);
        assert_eq!(FailureKind::from_status(422), FailureKind::Rejected);
        assert_eq!(FailureKind::from_status(502), FailureKind::Upstream);
        assert_eq!(FailureKind::from_status(302), FailureKind::Other);
    }

    #[test]
    fn test_only_transient_failures_retry() {
        assert!(FailureKind::Throttled.is_transient());
        assert!(FailureKind::Upstream.is_transient());
        assert!(FailureKind::Transport.is_transient());
        assert!(!FailureKind::Rejected.is_transient());
        assert!(!FailureKind::Unauthorized.is_transient());
    }

    #[test]
    fn test_nested_error_body() {
        let body = r#"{"error":{"code":"rate_limit_exceeded","message":"Slow down"}}"#;
        assert_eq!(
            error_details(body),
            (Some("rate_limit_exceeded".to_string()), "Slow down".to_string())
        );

        let body = r#"{"error":{"type":"invalid_request_error","message":"bad model"}}"#;
        assert_eq!(error_details(body).0.as_deref(), Some("invalid_request_error"));
    }

    #[test]
    fn test_flat_and_plain_bodies() {
        assert_eq!(error_details(r#"{"error":"model not found"}"#), (None, "model not found".to_string()));
        assert_eq!(
            error_details(r#"{"type":"overloaded","message":"try later"}"#),
            (Some("overloaded".to_string()), "try later".to_string())
        );
        assert_eq!(error_details("Bad Gateway"), (None, "Bad Gateway".to_string()));
    }

    #[test]
    fn test_display_includes_status() {
        let error = HttpError {
            kind: FailureKind::Upstream,
            status: Some(503),
            code: None,
            message: "unavailable".to_string(),
            retry_after: None,
        };
        assert_eq!(error.to_string(), "upstream failure (HTTP 503): unavailable");
    }

    #[test]
    fn test_provider_error_carries_code() {
        let error = HttpError {
            kind: FailureKind::Rejected,
            status: Some(400),
            code: Some("invalid_request_error".to_string()),
            message: "temperature out of range".to_string(),
            retry_after: None,
        };
        let rendered = error.into_provider_error(Provider::Mistral).to_string();
        assert!(rendered.contains("mistral"));
        assert!(rendered.contains("invalid_request_error"));
    }
}
