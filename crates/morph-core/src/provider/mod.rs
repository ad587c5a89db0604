//! Provider boundary
//!
//! The pipeline talks to an LLM only through [`ProviderAdapter`]. The
//! adapter receives a fully assembled [`ProviderRequest`] and returns free
//! text or a structured payload; any error it reports is turned into a
//! failed result by the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::schema::ObjectSchema;
use crate::types::{Message, Provider, Tool};

/// Whether the provider is asked for free text or schema-constrained output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Text,
    Structured,
}

/// Request handed to a provider adapter
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub provider: Provider,
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub tools: Vec<Tool>,
    pub schema: Option<ObjectSchema>,
}

impl ProviderRequest {
    pub fn mode(&self) -> RequestMode {
        if self.schema.is_some() {
            RequestMode::Structured
        } else {
            RequestMode::Text
        }
    }
}

/// What the provider produced
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    Text(String),
    Structured(Value),
}

/// Sends requests to an LLM vendor
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse>;
}

/// Where and how to reach one provider's chat-completions API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    /// Base URL; `/chat/completions` is appended
    pub base_url: String,
    /// Environment variable holding the API key; `None` for keyless servers
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ProviderEndpoint {
    pub fn new(base_url: impl Into<String>, api_key_env: Option<&str>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key_env: api_key_env.map(str::to_string),
        }
    }
}

/// Default provider, per-provider default models and endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Provider used when a transformer does not name one
    pub default: Provider,
    /// Model used when a transformer does not name one; overrides built-ins
    pub models: BTreeMap<Provider, String>,
    /// Endpoint overrides; missing entries use built-ins
    pub endpoints: BTreeMap<Provider, ProviderEndpoint>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default: Provider::OpenAi,
            models: BTreeMap::new(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl ProvidersConfig {
    /// Configured model for `provider`, falling back to the built-in default
    pub fn default_model(&self, provider: Provider) -> Option<&str> {
        self.models
            .get(&provider)
            .map(String::as_str)
            .or_else(|| builtin_model(provider))
    }

    /// Configured endpoint for `provider`, falling back to the built-in one
    pub fn endpoint(&self, provider: Provider) -> ProviderEndpoint {
        self.endpoints
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| builtin_endpoint(provider))
    }
}

fn builtin_model(provider: Provider) -> Option<&'static str> {
    Some(match provider {
        Provider::OpenAi => "gpt-4o-mini",
        Provider::Anthropic => "claude-3-5-sonnet-latest",
        Provider::Gemini => "gemini-2.0-flash",
        Provider::Mistral => "mistral-large-latest",
        Provider::Groq => "llama-3.3-70b-versatile",
        Provider::Ollama => "llama3.2",
        Provider::DeepSeek => "deepseek-chat",
        Provider::XAi => "grok-2-latest",
    })
}

fn builtin_endpoint(provider: Provider) -> ProviderEndpoint {
    match provider {
        Provider::OpenAi => ProviderEndpoint::new("https://api.openai.com/v1", Some("OPENAI_API_KEY")),
        Provider::Anthropic => ProviderEndpoint::new("https://api.anthropic.com/v1", Some("ANTHROPIC_API_KEY")),
        Provider::Gemini => ProviderEndpoint::new(
            "https://generativelanguage.googleapis.com/v1beta/openai",
            Some("GEMINI_API_KEY"),
        ),
        Provider::Mistral => ProviderEndpoint::new("https://api.mistral.ai/v1", Some("MISTRAL_API_KEY")),
        Provider::Groq => ProviderEndpoint::new("https://api.groq.com/openai/v1", Some("GROQ_API_KEY")),
        Provider::Ollama => ProviderEndpoint::new("http://localhost:11434/v1", None),
        Provider::DeepSeek => ProviderEndpoint::new("https://api.deepseek.com/v1", Some("DEEPSEEK_API_KEY")),
        Provider::XAi => ProviderEndpoint::new("https://api.x.ai/v1", Some("XAI_API_KEY")),
    }
}
