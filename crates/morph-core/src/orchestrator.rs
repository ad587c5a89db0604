//! Fluent entry point for running transformations
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use morph_core::{Orchestrator, PromptTransformer, Dispatch, Result};
//! # async fn demo(orchestrator: Orchestrator) -> Result<()> {
//! let dispatch = orchestrator
//!     .request()
//!     .with_text("Rust is a systems programming language...")
//!     .with_transformer(Arc::new(PromptTransformer::new("summarizer", "Summarize")))
//!     .run()
//!     .await?;
//!
//! if let Dispatch::Completed(result) = dispatch {
//!     println!("{}", result.content().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::fetch::ContentFetcher;
use crate::jobs::{JobPayload, JobQueue, QueueConfig, TransformerRegistry};
use crate::media::{Content, Media, MediaOptions};
use crate::rate_limit::RateLimiter;
use crate::result::TransformerResult;
use crate::transformer::{Transformer, TransformerPipeline};
use crate::types::Context;

/// Plain content-to-result function
pub type TransformFn = Arc<dyn Fn(Content) -> BoxFuture<'static, Result<TransformerResult>> + Send + Sync>;

/// What runs the content
#[derive(Clone)]
pub enum Handler {
    Function(TransformFn),
    Transformer(Arc<dyn Transformer>),
    /// Transformer looked up in the registry at `run()` time
    Named(String),
}

impl Handler {
    pub fn function<F, Fut>(f: F) -> Self
    where
        F: Fn(Content) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TransformerResult>> + Send + 'static,
    {
        Handler::Function(Arc::new(move |content| f(content).boxed()))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Function(_) => f.write_str("Function"),
            Handler::Transformer(t) => f.debug_tuple("Transformer").field(&t.name()).finish(),
            Handler::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

/// Handle to a queued transformation; the outcome arrives through events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingJob {
    pub id: Uuid,
    pub transformer: String,
    pub queue: String,
    pub connection: String,
}

/// Outcome of [`TransformRequest::run`]
#[derive(Debug, Clone)]
pub enum Dispatch {
    Completed(TransformerResult),
    Pending(PendingJob),
}

impl Dispatch {
    pub fn result(&self) -> Option<&TransformerResult> {
        match self {
            Dispatch::Completed(result) => Some(result),
            Dispatch::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Dispatch::Pending(_))
    }
}

/// Shared services behind every request
#[derive(Clone)]
pub struct Orchestrator {
    pipeline: TransformerPipeline,
    rate_limiter: RateLimiter,
    queue: Arc<dyn JobQueue>,
    registry: TransformerRegistry,
    fetcher: Option<Arc<dyn ContentFetcher>>,
    queue_config: QueueConfig,
}

impl Orchestrator {
    pub fn new(
        pipeline: TransformerPipeline,
        rate_limiter: RateLimiter,
        queue: Arc<dyn JobQueue>,
        registry: TransformerRegistry,
        queue_config: QueueConfig,
    ) -> Self {
        Self {
            pipeline,
            rate_limiter,
            queue,
            registry,
            fetcher: None,
            queue_config,
        }
    }

    /// Fetcher used by `with_url` when the request does not bring one
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ContentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn registry(&self) -> &TransformerRegistry {
        &self.registry
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn request(&self) -> TransformRequest<'_> {
        TransformRequest {
            orchestrator: self,
            content: None,
            handler: None,
            asynchronous: false,
            context: Context::new(),
        }
    }
}

/// Builder for a single transformation
#[must_use = "a request does nothing until `run` is awaited"]
pub struct TransformRequest<'a> {
    orchestrator: &'a Orchestrator,
    content: Option<Content>,
    handler: Option<Handler>,
    asynchronous: bool,
    context: Context,
}

impl<'a> TransformRequest<'a> {
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content = Some(Content::Text(text.into()));
        self
    }

    /// Fetch the URL now; fetch failures are returned here, not from `run`
    pub async fn with_url(mut self, url: &str, fetcher: Option<Arc<dyn ContentFetcher>>) -> Result<Self> {
        url::Url::parse(url).map_err(|e| Error::Fetch {
            url: url.to_string(),
            message: format!("Invalid URL: {}", e),
            source: Some(e.into()),
        })?;

        let fetcher = fetcher
            .or_else(|| self.orchestrator.fetcher.clone())
            .ok_or_else(|| Error::configuration("No content fetcher configured for URL input"))?;

        let text = fetcher.fetch(url).await?;
        self.content = Some(Content::Text(text));
        Ok(self)
    }

    /// Read the file now; I/O failures are returned here, not from `run`
    pub async fn with_media(mut self, path: impl AsRef<Path>, options: MediaOptions) -> Result<Self> {
        let media = Media::from_path(path, options).await?;
        self.content = Some(Content::Media(media));
        Ok(self)
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    /// Queue the transformation instead of running it inline
    ///
    /// Only transformer handlers are queued. Function handlers cannot travel
    /// through a queue and still run inline, returning
    /// [`Dispatch::Completed`].
    pub fn with_async(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_transformer(self, transformer: Arc<dyn Transformer>) -> Self {
        self.with_handler(Handler::Transformer(transformer))
    }

    pub fn with_function<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Content) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TransformerResult>> + Send + 'static,
    {
        self.with_handler(Handler::function(f))
    }

    /// Use a transformer from the orchestrator's registry
    pub fn with_named(self, name: impl Into<String>) -> Self {
        self.with_handler(Handler::Named(name.into()))
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context.extend(context);
        self
    }

    /// Resolve, pass the rate-limit gate, then run inline or enqueue
    pub async fn run(self) -> Result<Dispatch> {
        let orchestrator = self.orchestrator;
        let content = self
            .content
            .ok_or_else(|| Error::configuration("No content provided; call with_text, with_url or with_media"))?;
        let handler = match self.handler {
            Some(Handler::Named(name)) => {
                let transformer = orchestrator.registry.get(&name).ok_or_else(|| {
                    Error::configuration(format!("No transformer registered under '{}'", name))
                })?;
                Handler::Transformer(transformer)
            }
            Some(handler) => handler,
            None => return Err(Error::configuration("No handler configured for transformation")),
        };

        orchestrator.rate_limiter.check_global().await?;

        let context = self.context;
        match handler {
            Handler::Transformer(transformer) if self.asynchronous => {
                let payload =
                    JobPayload::new(transformer.name(), &content, context, &orchestrator.queue_config).scoped();
                let key = payload.registry_key().to_string();
                orchestrator.registry.register_as(key.clone(), transformer);
                let pending = PendingJob {
                    id: payload.id,
                    transformer: payload.transformer.clone(),
                    queue: payload.queue.clone(),
                    connection: payload.connection.clone(),
                };
                if let Err(error) = orchestrator.queue.push(payload).await {
                    orchestrator.registry.remove(&key);
                    return Err(error);
                }
                Ok(Dispatch::Pending(pending))
            }
            Handler::Transformer(transformer) => {
                let result = orchestrator.pipeline.execute(transformer.as_ref(), content).await?;
                Ok(Dispatch::Completed(attach_context(result, context)))
            }
            Handler::Function(function) => {
                if self.asynchronous {
                    tracing::debug!("function handler requested async; running inline");
                }
                let result = function(content).await?;
                Ok(Dispatch::Completed(attach_context(result, context)))
            }
            Handler::Named(name) => Err(Error::configuration(format!(
                "Transformer '{}' was not resolved",
                name
            ))),
        }
    }
}

fn attach_context(result: TransformerResult, context: Context) -> TransformerResult {
    if context.is_empty() {
        result
    } else {
        result.with_context(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, InMemoryCacheStore, ResultCache};
    use crate::jobs::{InMemoryJobQueue, JobContent};
    use crate::provider::{ProviderAdapter, ProviderRequest, ProviderResponse, ProvidersConfig};
    use crate::rate_limit::RateLimitConfig;
    use crate::result::TransformerMetadata;
    use crate::transformer::PromptTransformer;
    use crate::types::Provider;
    use async_trait::async_trait;
    use serde_json::json;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderAdapter for CountingProvider {
        async fn send(&self, _request: ProviderRequest) -> Result<ProviderResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderResponse::Text("summary".into()))
        }
    }

    struct StaticFetcher;

    #[async_trait]
    impl ContentFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            if url.contains("missing") {
                return Err(Error::Fetch {
                    url: url.to_string(),
                    message: "Server responded with 404 Not Found".into(),
                    source: None,
                });
            }
            Ok(format!("page at {}", url))
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        provider: Arc<CountingProvider>,
        receiver: mpsc::Receiver<JobPayload>,
    }

    fn fixture(rate_limit: RateLimitConfig) -> Fixture {
        let provider = Arc::new(CountingProvider::default());
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache = ResultCache::new(Arc::new(InMemoryCacheStore::new()), config);
        let pipeline = TransformerPipeline::new(provider.clone(), cache, ProvidersConfig::default());
        let (queue, receiver) = InMemoryJobQueue::new(8);

        let orchestrator = Orchestrator::new(
            pipeline,
            RateLimiter::in_memory(rate_limit),
            Arc::new(queue),
            TransformerRegistry::new(),
            QueueConfig::default(),
        );

        Fixture {
            orchestrator,
            provider,
            receiver,
        }
    }

    fn summarizer() -> Arc<dyn Transformer> {
        Arc::new(PromptTransformer::new("summarizer", "Summarize"))
    }

    #[tokio::test]
    async fn test_sync_run_returns_result_with_context() {
        let fx = fixture(RateLimitConfig::default());
        let mut context = Context::new();
        context.insert("tenant".into(), json!("acme"));

        let dispatch = fx
            .orchestrator
            .request()
            .with_text("long article")
            .with_transformer(summarizer())
            .with_context(context)
            .run()
            .await
            .unwrap();

        let result = dispatch.result().unwrap();
        assert_eq!(result.content(), Some("summary"));
        assert_eq!(result.metadata().unwrap().context()["tenant"], json!("acme"));
        assert_eq!(fx.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_transformer_is_enqueued() {
        let mut fx = fixture(RateLimitConfig::default());

        let dispatch = fx
            .orchestrator
            .request()
            .with_text("queued input")
            .with_transformer(summarizer())
            .with_async()
            .run()
            .await
            .unwrap();

        let pending = match dispatch {
            Dispatch::Pending(pending) => pending,
            other => panic!("expected pending dispatch, got {:?}", other),
        };
        assert_eq!(pending.queue, "default");
        assert_eq!(fx.provider.calls.load(Ordering::SeqCst), 0);

        let payload = fx.receiver.recv().await.unwrap();
        assert_eq!(payload.id, pending.id);
        assert_eq!(payload.transformer, "summarizer");
        assert_eq!(payload.content, JobContent::Text("queued input".into()));
        assert!(fx.orchestrator.registry().contains(payload.registry_key()));
    }

    #[tokio::test]
    async fn test_same_named_async_transformers_keep_their_own_prompts() {
        let mut fx = fixture(RateLimitConfig::default());

        for prompt in ["PROMPT-A", "PROMPT-B"] {
            fx.orchestrator
                .request()
                .with_text("input")
                .with_transformer(Arc::new(PromptTransformer::new("summarizer", prompt)))
                .with_async()
                .run()
                .await
                .unwrap();
        }

        let first = fx.receiver.recv().await.unwrap();
        let second = fx.receiver.recv().await.unwrap();
        assert_eq!(first.transformer, second.transformer);
        assert_ne!(first.registry_key(), second.registry_key());

        let registry = fx.orchestrator.registry();
        assert_eq!(registry.get(first.registry_key()).unwrap().prompt(), "PROMPT-A");
        assert_eq!(registry.get(second.registry_key()).unwrap().prompt(), "PROMPT-B");
    }

    #[tokio::test]
    async fn test_failed_enqueue_releases_scoped_entry() {
        let fx = fixture(RateLimitConfig::default());
        drop(fx.receiver);

        let error = fx
            .orchestrator
            .request()
            .with_text("x")
            .with_transformer(summarizer())
            .with_async()
            .run()
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Queue { .. }));
        assert!(fx.orchestrator.registry().names().is_empty());
    }

    #[tokio::test]
    async fn test_async_function_runs_inline() {
        let fx = fixture(RateLimitConfig::default());

        let dispatch = fx
            .orchestrator
            .request()
            .with_text("abc")
            .with_function(|content: Content| async move {
                let text = content.as_text().unwrap_or_default().to_uppercase();
                Ok::<_, Error>(TransformerResult::completed(
                    text,
                    Some(TransformerMetadata::new("none", Provider::OpenAi, "uppercase")),
                ))
            })
            .with_async()
            .run()
            .await
            .unwrap();

        assert!(!dispatch.is_pending());
        assert_eq!(dispatch.result().unwrap().content(), Some("ABC"));
    }

    #[tokio::test]
    async fn test_missing_handler_is_configuration_error() {
        let fx = fixture(RateLimitConfig::default());
        let error = fx.orchestrator.request().with_text("x").run().await.unwrap_err();
        assert!(matches!(error, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_missing_content_is_configuration_error() {
        let fx = fixture(RateLimitConfig::default());
        let error = fx
            .orchestrator
            .request()
            .with_transformer(summarizer())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_named_handler_resolution() {
        let fx = fixture(RateLimitConfig::default());
        let error = fx
            .orchestrator
            .request()
            .with_text("x")
            .with_named("summarizer")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Configuration { .. }));

        fx.orchestrator.registry().register(summarizer());
        let dispatch = fx
            .orchestrator
            .request()
            .with_text("x")
            .with_named("summarizer")
            .run()
            .await
            .unwrap();
        assert_eq!(dispatch.result().unwrap().content(), Some("summary"));
    }

    #[tokio::test]
    async fn test_rate_limited_request_never_reaches_provider() {
        let fx = fixture(RateLimitConfig::new(1, Duration::from_secs(60)));

        fx.orchestrator
            .request()
            .with_text("first")
            .with_transformer(summarizer())
            .run()
            .await
            .unwrap();

        let error = fx
            .orchestrator
            .request()
            .with_text("second")
            .with_transformer(summarizer())
            .run()
            .await
            .unwrap_err();

        match error {
            Error::RateLimited {
                max_attempts,
                retry_after_secs,
                ..
            } => {
                assert_eq!(max_attempts, 1);
                assert!(retry_after_secs > 0);
            }
            other => panic!("expected rate limit error, got {:?}", other),
        }
        assert_eq!(fx.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_url_content_is_fetched_eagerly() {
        let fx = fixture(RateLimitConfig::default());
        let orchestrator = fx.orchestrator.clone().with_fetcher(Arc::new(StaticFetcher));

        let request = orchestrator
            .request()
            .with_url("https://example.com/post", None)
            .await
            .unwrap();
        let dispatch = request
            .with_function(|content: Content| async move {
                Ok::<_, Error>(TransformerResult::completed(content.as_text().unwrap_or_default(), None))
            })
            .run()
            .await
            .unwrap();
        assert_eq!(dispatch.result().unwrap().content(), Some("page at https://example.com/post"));

        let error = orchestrator
            .request()
            .with_url("https://example.com/missing", None)
            .await
            .err()
            .unwrap();
        assert!(matches!(error, Error::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_url_without_fetcher_or_valid_url() {
        let fx = fixture(RateLimitConfig::default());
        let error = fx
            .orchestrator
            .request()
            .with_url("https://example.com", None)
            .await
            .err()
            .unwrap();
        assert!(matches!(error, Error::Configuration { .. }));

        let error = fx
            .orchestrator
            .request()
            .with_url("::not-a-url::", Some(Arc::new(StaticFetcher)))
            .await
            .err()
            .unwrap();
        assert!(matches!(error, Error::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_media_is_loaded_before_dispatch() {
        let fx = fixture(RateLimitConfig::default());
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"%PDF-1.7").unwrap();

        let request = fx
            .orchestrator
            .request()
            .with_media(file.path(), MediaOptions::default())
            .await
            .unwrap();
        let dispatch = request.with_transformer(summarizer()).run().await.unwrap();
        assert!(dispatch.result().unwrap().is_successful());

        let missing = fx
            .orchestrator
            .request()
            .with_media("/no/such/file.pdf", MediaOptions::default())
            .await;
        assert!(matches!(missing.err(), Some(Error::Media { .. })));
    }
}
