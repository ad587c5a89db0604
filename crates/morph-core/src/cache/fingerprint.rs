//! Deterministic fingerprint of a transformation request
//!
//! The fingerprint covers the transformer's resolved configuration only.
//! Input content is deliberately not part of it: every input run through an
//! unchanged configuration shares one cache entry.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::{Provider, Tool};

/// Builds the cache fingerprint and key for one resolved configuration
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder<'a> {
    transformer: &'a str,
    prompt: &'a str,
    system_prompt: Option<&'a str>,
    provider: Provider,
    model: &'a str,
    temperature: Option<f32>,
    top_p: Option<f32>,
    tools: &'a [Tool],
}

impl<'a> CacheKeyBuilder<'a> {
    pub fn new(transformer: &'a str, provider: Provider, model: &'a str) -> Self {
        Self {
            transformer,
            prompt: "",
            system_prompt: None,
            provider,
            model,
            temperature: None,
            top_p: None,
            tools: &[],
        }
    }

    pub fn prompt(mut self, prompt: &'a str) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn system_prompt(mut self, system_prompt: Option<&'a str>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn top_p(mut self, top_p: Option<f32>) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn tools(mut self, tools: &'a [Tool]) -> Self {
        self.tools = tools;
        self
    }

    /// Ordered `(field, value)` pairs with unset fields dropped
    fn canonical_fields(&self) -> Vec<(&'static str, Value)> {
        let fields = [
            ("transformer", Value::from(self.transformer)),
            ("prompt", Value::from(self.prompt)),
            ("system_prompt", self.system_prompt.map(Value::from).unwrap_or(Value::Null)),
            ("provider", Value::from(self.provider.as_str())),
            ("top_p", self.top_p.map(Value::from).unwrap_or(Value::Null)),
            ("temperature", self.temperature.map(Value::from).unwrap_or(Value::Null)),
            ("tools", tools_value(self.tools)),
            ("model", Value::from(self.model)),
        ];

        fields.into_iter().filter(|(_, value)| !value.is_null()).collect()
    }

    /// Hex SHA-256 over the canonical serialization
    pub fn fingerprint(&self) -> String {
        let canonical = Value::Array(
            self.canonical_fields()
                .into_iter()
                .map(|(name, value)| Value::Array(vec![Value::from(name), value]))
                .collect(),
        );

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// `{prefix}:{fingerprint}`
    pub fn cache_key(&self, prefix: &str) -> String {
        format!("{}:{}", prefix, self.fingerprint())
    }
}

fn tools_value(tools: &[Tool]) -> Value {
    if tools.is_empty() {
        return Value::Null;
    }
    // serde_json maps are key-sorted, so tool schemas serialize canonically
    serde_json::to_value(tools).unwrap_or(Value::Null)
}
