//! OpenAI-compatible provider adapter
//!
//! Every supported vendor exposes a chat-completions endpoint in the OpenAI
//! wire format, so one adapter covers all of them. Endpoints and API-key
//! variables come from [`ProvidersConfig`].

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::error::HttpError;
use crate::http::retry::{execute_with_retry, RetryPolicy};
use crate::media::{Content, Media, MediaKind};
use crate::provider::{ProviderAdapter, ProviderRequest, ProviderResponse, ProvidersConfig, RequestMode};
use crate::types::{MessageRole, Provider};

/// Outbound HTTP settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first attempt for retryable failures
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Shared reqwest client honoring the timeout
    pub fn build_client(&self) -> Result<ReqwestClient> {
        ReqwestClient::builder()
            .timeout(self.timeout())
            .build()
            .map_err(|e| Error::Http {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
                source: Some(e.into()),
            })
    }
}

/// Provider adapter speaking the chat-completions protocol
pub struct HttpProvider {
    client: ReqwestClient,
    providers: ProvidersConfig,
    retry_policy: RetryPolicy,
    api_keys: HashMap<Provider, String>,
}

impl HttpProvider {
    pub fn new(providers: ProvidersConfig, config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
            providers,
            retry_policy: RetryPolicy::new(config.max_retries),
            api_keys: HashMap::new(),
        })
    }

    /// Use an explicit key instead of the endpoint's environment variable
    pub fn with_api_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.api_keys.insert(provider, key.into());
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn api_key(&self, provider: Provider) -> Result<Option<String>> {
        if let Some(key) = self.api_keys.get(&provider) {
            return Ok(Some(key.clone()));
        }

        match self.providers.endpoint(provider).api_key_env {
            Some(variable) => std::env::var(&variable).map(Some).map_err(|_| {
                Error::configuration(format!(
                    "API key for provider '{}' not found; set {}",
                    provider, variable
                ))
            }),
            None => Ok(None),
        }
    }

    fn completions_url(&self, provider: Provider) -> String {
        let endpoint = self.providers.endpoint(provider);
        format!("{}/chat/completions", endpoint.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ProviderAdapter for HttpProvider {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse> {
        let provider = request.provider;
        let url = self.completions_url(provider);
        let api_key = self.api_key(provider)?;
        let body = build_request_body(&request)?;

        tracing::debug!(%provider, model = %request.model, %url, "sending chat completion request");

        let response = execute_with_retry(
            || {
                let mut builder = self.client.post(&url).json(&body);
                if let Some(key) = &api_key {
                    builder = builder.bearer_auth(key);
                }
                async move {
                    let response = builder.send().await.map_err(HttpError::from_request_error)?;
                    if !response.status().is_success() {
                        return Err(HttpError::from_response(response).await);
                    }
                    response.json::<Value>().await.map_err(HttpError::from_request_error)
                }
            },
            self.retry_policy.clone(),
        )
        .await
        .map_err(|e| e.into_provider_error(provider))?;

        parse_response(provider, request.mode(), &response)
    }
}

/// Chat-completions request body
pub fn build_request_body(request: &ProviderRequest) -> Result<Value> {
    let mut messages = Vec::with_capacity(request.messages.len());
    for message in &request.messages {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        messages.push(json!({
            "role": role,
            "content": content_value(&message.content)?,
        }));
    }

    let mut body = Map::new();
    body.insert("model".to_string(), Value::from(request.model.as_str()));
    body.insert("messages".to_string(), Value::Array(messages));

    if let Some(temperature) = request.temperature {
        body.insert("temperature".to_string(), Value::from(temperature));
    }
    if let Some(top_p) = request.top_p {
        body.insert("top_p".to_string(), Value::from(top_p));
    }

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                let mut function = json!({
                    "name": tool.name,
                    "parameters": tool.parameters,
                });
                if let Some(description) = &tool.description {
                    function["description"] = Value::from(description.as_str());
                }
                json!({"type": "function", "function": function})
            })
            .collect();
        body.insert("tools".to_string(), Value::Array(tools));
    }

    if let Some(schema) = &request.schema {
        body.insert(
            "response_format".to_string(),
            json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.to_json_schema(),
                    "strict": schema.is_fully_required(),
                }
            }),
        );
    }

    Ok(Value::Object(body))
}

fn content_value(content: &Content) -> Result<Value> {
    match content {
        Content::Text(text) => Ok(Value::from(text.as_str())),
        Content::Media(media) => Ok(json!([media_part(media)?])),
    }
}

fn media_part(media: &Media) -> Result<Value> {
    let mime = media.mime_type().unwrap_or("application/octet-stream");
    let data_url = format!("data:{};base64,{}", mime, media.base64());

    match media.kind() {
        MediaKind::Image => Ok(json!({
            "type": "image_url",
            "image_url": {"url": data_url},
        })),
        MediaKind::Document => Ok(json!({
            "type": "file",
            "file": {
                "filename": media.title().unwrap_or("document"),
                "file_data": data_url,
            },
        })),
        MediaKind::Audio => {
            let format = mime.rsplit('/').next().unwrap_or("wav");
            let format = if format == "mpeg" { "mp3" } else { format };
            Ok(json!({
                "type": "input_audio",
                "input_audio": {"data": media.base64(), "format": format},
            }))
        }
        MediaKind::Video => Err(Error::media(
            "Video input is not supported by chat-completions providers",
        )),
    }
}

/// Extract text or structured output from a chat-completions response
pub fn parse_response(provider: Provider, mode: RequestMode, response: &Value) -> Result<ProviderResponse> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| provider_error(provider, "Response contains no choices"))?;

    if let Some(refusal) = message.get("refusal").and_then(Value::as_str) {
        return Err(provider_error(provider, format!("Model refused: {}", refusal)));
    }

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| provider_error(provider, "Response message has no text content"))?;

    match mode {
        RequestMode::Text => Ok(ProviderResponse::Text(content.to_string())),
        RequestMode::Structured => serde_json::from_str(content)
            .map(ProviderResponse::Structured)
            .map_err(|e| Error::Provider {
                provider: provider.to_string(),
                message: format!("Structured output is not valid JSON: {}", e),
                source: Some(e.into()),
            }),
    }
}

fn provider_error(provider: Provider, message: impl Into<String>) -> Error {
    Error::Provider {
        provider: provider.to_string(),
        message: message.into(),
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ObjectSchema, SchemaType};
    use crate::types::{Message, Tool};

    fn request() -> ProviderRequest {
        ProviderRequest {
            provider: Provider::OpenAi,
            model: "gpt-4o-mini".to_string(),
            messages: vec![
                Message::system("Be terse"),
                Message::user("Summarize"),
                Message::user("Rust is a systems language."),
            ],
            temperature: Some(0.5),
            top_p: None,
            tools: Vec::new(),
            schema: None,
        }
    }

    #[test]
    fn test_text_request_body() {
        let body = build_request_body(&request()).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["content"], "Rust is a systems language.");
        assert_eq!(body["temperature"], 0.5);
        assert!(body.get("top_p").is_none());
        assert!(body.get("response_format").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_structured_request_body_with_tools() {
        let mut request = request();
        request.schema = Some(ObjectSchema::new("summary").property("text", SchemaType::String));
        request.tools = vec![Tool::new("lookup", json!({"type": "object"})).with_description("Find facts")];

        let body = build_request_body(&request).unwrap();
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "summary");
        assert_eq!(body["response_format"]["json_schema"]["schema"]["required"][0], "text");
        assert_eq!(body["tools"][0]["function"]["name"], "lookup");
        assert_eq!(body["tools"][0]["function"]["description"], "Find facts");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }

    #[test]
    fn test_optional_properties_disable_strict_mode() {
        let mut request = request();
        request.schema = Some(
            ObjectSchema::new("summary")
                .property("text", SchemaType::String)
                .optional_property("keywords", SchemaType::String),
        );

        let body = build_request_body(&request).unwrap();
        let format = &body["response_format"]["json_schema"];
        assert_eq!(format["strict"], false);
        assert_eq!(format["schema"]["required"], json!(["text"]));
        assert!(format["schema"]["properties"].get("keywords").is_some());
    }

    #[test]
    fn test_media_content_parts() {
        let mut request = request();
        request.messages[2] = Message::user(Media::new(MediaKind::Image, vec![1, 2, 3]).with_mime_type("image/png"));
        let body = build_request_body(&request).unwrap();
        let part = &body["messages"][2]["content"][0];
        assert_eq!(part["type"], "image_url");
        assert_eq!(part["image_url"]["url"], "data:image/png;base64,AQID");

        request.messages[2] = Message::user(Media::new(MediaKind::Audio, vec![0]).with_mime_type("audio/mpeg"));
        let body = build_request_body(&request).unwrap();
        assert_eq!(body["messages"][2]["content"][0]["input_audio"]["format"], "mp3");

        request.messages[2] = Message::user(Media::new(MediaKind::Video, vec![0]));
        assert!(build_request_body(&request).is_err());
    }

    #[test]
    fn test_parse_text_response() {
        let response = json!({"choices": [{"message": {"role": "assistant", "content": "short summary"}}]});
        let parsed = parse_response(Provider::OpenAi, RequestMode::Text, &response).unwrap();
        assert_eq!(parsed, ProviderResponse::Text("short summary".to_string()));
    }

    #[test]
    fn test_parse_structured_response() {
        let response = json!({"choices": [{"message": {"content": "{\"text\":\"hi\"}"}}]});
        let parsed = parse_response(Provider::OpenAi, RequestMode::Structured, &response).unwrap();
        assert_eq!(parsed, ProviderResponse::Structured(json!({"text": "hi"})));
    }

    #[test]
    fn test_parse_invalid_structured_response() {
        let response = json!({"choices": [{"message": {"content": "not json"}}]});
        let error = parse_response(Provider::Groq, RequestMode::Structured, &response).unwrap_err();
        assert!(error.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_parse_refusal_and_empty_responses() {
        let refusal = json!({"choices": [{"message": {"content": null, "refusal": "cannot help"}}]});
        assert!(parse_response(Provider::OpenAi, RequestMode::Text, &refusal).is_err());

        let empty = json!({"choices": []});
        assert!(parse_response(Provider::OpenAi, RequestMode::Text, &empty).is_err());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_reported() {
        let mut providers = ProvidersConfig::default();
        providers.endpoints.insert(
            Provider::OpenAi,
            crate::provider::ProviderEndpoint::new("http://127.0.0.1:9", Some("MORPH_TEST_UNSET_KEY_VARIABLE")),
        );
        let adapter = HttpProvider::new(providers, &HttpConfig::default()).unwrap();
        let error = adapter.send(request()).await.unwrap_err();
        assert!(matches!(error, Error::Configuration { .. }));
    }
}
