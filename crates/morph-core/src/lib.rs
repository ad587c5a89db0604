//! Morph Core - LLM transformation pipeline
//!
//! This crate runs "transformers" (a prompt plus provider, model, sampling,
//! tools and output format) over text, fetched URLs or media, with result
//! caching, a rate-limit gate, pre/post hooks, and an optional queued
//! execution path that reports through lifecycle events.
//!
//! # Main Components
//!
//! - **Transformers**: the [`Transformer`] trait and the staged [`TransformerPipeline`]
//! - **Orchestration**: [`Orchestrator`] builds requests and dispatches sync or async
//! - **Caching**: [`ResultCache`] keyed by a configuration fingerprint
//! - **Rate limiting**: fixed-window [`RateLimiter`]
//! - **Jobs**: queued payloads, [`Worker`] runtime, [`TransformationEvent`]s
//! - **Providers**: the [`ProviderAdapter`] boundary and an OpenAI-compatible [`HttpProvider`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use morph_core::{Dispatch, HttpProvider, MorphConfig, PromptTransformer, Result, Runtime};
//!
//! async fn example() -> Result<()> {
//!     let config = MorphConfig::load(None)?;
//!     let provider = HttpProvider::new(config.providers.clone(), &config.http)?;
//!     let runtime = Runtime::from_config(&config, Arc::new(provider))?;
//!
//!     let dispatch = runtime
//!         .orchestrator
//!         .request()
//!         .with_text("Rust is a multi-paradigm systems programming language.")
//!         .with_transformer(Arc::new(PromptTransformer::new("summarizer", "Summarize in one line")))
//!         .run()
//!         .await?;
//!
//!     if let Dispatch::Completed(result) = dispatch {
//!         println!("{:?}", result.content());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod http;
pub mod jobs;
pub mod media;
pub mod orchestrator;
pub mod provider;
pub mod rate_limit;
pub mod result;
pub mod runtime;
pub mod schema;
pub mod transformer;
pub mod types;

pub use cache::{CacheConfig, CacheKeyBuilder, CacheStore, CacheStoreRegistry, InMemoryCacheStore, ResultCache, MAX_TTL_SECS};
pub use config::MorphConfig;
pub use error::{Error, Result};
pub use events::{BroadcastEventSink, EventSink, NullEventSink, TracingEventSink, TransformationEvent};
pub use fetch::{ContentFetcher, HttpFetcher};
pub use http::{HttpConfig, HttpProvider};
pub use jobs::{
    InMemoryJobQueue, JobContent, JobPayload, JobQueue, JobState, QueueConfig, TransformJob, TransformerRegistry,
    Worker,
};
pub use media::{Content, EncodedMedia, Media, MediaKind, MediaOptions};
pub use orchestrator::{Dispatch, Handler, Orchestrator, PendingJob, TransformFn, TransformRequest};
pub use provider::{ProviderAdapter, ProviderEndpoint, ProviderRequest, ProviderResponse, ProvidersConfig, RequestMode};
pub use rate_limit::{InMemoryRateLimitStore, RateLimitConfig, RateLimitStatus, RateLimitStore, RateLimiter, MAX_DECAY_SECS};
pub use result::{TransformerMetadata, TransformerResult, TransformerStatus};
pub use runtime::Runtime;
pub use schema::{FieldDefinition, FieldOverride, FieldType, ObjectSchema, OutputFormat, RecordDefinition, SchemaType};
pub use transformer::{PromptTransformer, ResolvedConfig, Transformer, TransformerPipeline};
pub use types::{Context, Message, MessageRole, Provider, Tool};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
