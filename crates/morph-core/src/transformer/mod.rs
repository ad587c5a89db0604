//! Transformers: configured units of LLM work
//!
//! A [`Transformer`] describes *what* to ask (prompt, provider, model,
//! sampling, tools, output format) and may hook into the run before the
//! request and after the result. [`TransformerPipeline`] does the running.

pub mod pipeline;

pub use pipeline::TransformerPipeline;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::cache::CacheKeyBuilder;
use crate::error::{Error, Result};
use crate::media::Content;
use crate::provider::{ProviderRequest, ProvidersConfig};
use crate::result::TransformerResult;
use crate::schema::{ObjectSchema, OutputFormat};
use crate::types::{Message, Provider, Tool};

/// Configuration and hooks of one transformation
///
/// Only `name` and `prompt` are required. Everything else has a default:
/// no system prompt, the configured default provider and its default model,
/// provider-side sampling, no tools, plain-text output, no-op hooks.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Stable identity, used in fingerprints, metadata and the job registry
    fn name(&self) -> &str;

    fn prompt(&self) -> &str;

    fn system_prompt(&self) -> Option<&str> {
        None
    }

    fn provider(&self) -> Option<Provider> {
        None
    }

    fn model(&self) -> Option<&str> {
        None
    }

    fn temperature(&self) -> Option<f32> {
        None
    }

    fn top_p(&self) -> Option<f32> {
        None
    }

    fn tools(&self) -> &[Tool] {
        &[]
    }

    fn output_format(&self) -> OutputFormat {
        OutputFormat::Text
    }

    /// Runs before the provider call; an error aborts the run
    async fn before_transform(&self, _content: &Content) -> Result<()> {
        Ok(())
    }

    /// Runs after every provider round-trip, successful or not
    async fn after_transform(&self, _result: &TransformerResult) -> Result<()> {
        Ok(())
    }
}

fn finite(transformer: &dyn Transformer, setting: &str, value: Option<f32>) -> Result<Option<f32>> {
    match value {
        Some(value) if !value.is_finite() => Err(Error::configuration(format!(
            "Transformer '{}' has a non-finite {} ({})",
            transformer.name(),
            setting,
            value
        ))),
        _ => Ok(value),
    }
}

/// Snapshot of a transformer's configuration with defaults applied
///
/// Resolved once per run so the fingerprint and the request see the same
/// values.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub transformer: String,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub provider: Provider,
    pub model: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub tools: Vec<Tool>,
    pub schema: Option<ObjectSchema>,
}

impl ResolvedConfig {
    pub fn resolve(transformer: &dyn Transformer, providers: &ProvidersConfig) -> Result<Self> {
        let provider = transformer.provider().unwrap_or(providers.default);
        let model = match transformer.model() {
            Some(model) if !model.is_empty() => model.to_string(),
            _ => providers
                .default_model(provider)
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::configuration(format!(
                        "Transformer '{}' has no model and provider '{}' has no default model",
                        transformer.name(),
                        provider
                    ))
                })?,
        };

        let temperature = finite(transformer, "temperature", transformer.temperature())?;
        let top_p = finite(transformer, "top_p", transformer.top_p())?;

        Ok(Self {
            transformer: transformer.name().to_string(),
            prompt: transformer.prompt().to_string(),
            system_prompt: transformer.system_prompt().map(str::to_string),
            provider,
            model,
            temperature,
            top_p,
            tools: transformer.tools().to_vec(),
            schema: transformer.output_format().resolve(),
        })
    }

    pub fn key_builder(&self) -> CacheKeyBuilder<'_> {
        CacheKeyBuilder::new(&self.transformer, self.provider, &self.model)
            .prompt(&self.prompt)
            .system_prompt(self.system_prompt.as_deref())
            .temperature(self.temperature)
            .top_p(self.top_p)
            .tools(&self.tools)
    }

    /// Provider request: optional system message, prompt, then content
    pub fn request(&self, content: Content) -> ProviderRequest {
        let mut messages = Vec::with_capacity(3);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(self.prompt.clone()));
        messages.push(Message::user(content));

        ProviderRequest {
            provider: self.provider,
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            top_p: self.top_p,
            tools: self.tools.clone(),
            schema: self.schema.clone(),
        }
    }
}

type BeforeHook = Arc<dyn Fn(&Content) -> Result<()> + Send + Sync>;
type AfterHook = Arc<dyn Fn(&TransformerResult) -> Result<()> + Send + Sync>;

/// General-purpose transformer configured through builder methods
#[derive(Clone)]
pub struct PromptTransformer {
    name: String,
    prompt: String,
    system_prompt: Option<String>,
    provider: Option<Provider>,
    model: Option<String>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    tools: Vec<Tool>,
    output_format: OutputFormat,
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
}

impl fmt::Debug for PromptTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptTransformer")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish_non_exhaustive()
    }
}

impl PromptTransformer {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            system_prompt: None,
            provider: None,
            model: None,
            temperature: None,
            top_p: None,
            tools: Vec::new(),
            output_format: OutputFormat::Text,
            before: None,
            after: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Validate input before the provider is contacted
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Content) -> Result<()> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Observe every produced result
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TransformerResult) -> Result<()> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }
}

#[async_trait]
impl Transformer for PromptTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn prompt(&self) -> &str {
        &self.prompt
    }

    fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    fn provider(&self) -> Option<Provider> {
        self.provider
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    fn top_p(&self) -> Option<f32> {
        self.top_p
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    fn output_format(&self) -> OutputFormat {
        self.output_format.clone()
    }

    async fn before_transform(&self, content: &Content) -> Result<()> {
        match &self.before {
            Some(hook) => hook(content),
            None => Ok(()),
        }
    }

    async fn after_transform(&self, result: &TransformerResult) -> Result<()> {
        match &self.after {
            Some(hook) => hook(result),
            None => Ok(()),
        }
    }
}
