//! Wiring of in-process services from a [`MorphConfig`]

use std::sync::Arc;

use crate::cache::{CacheStoreRegistry, ResultCache};
use crate::config::MorphConfig;
use crate::error::Result;
use crate::events::{BroadcastEventSink, EventSink};
use crate::fetch::HttpFetcher;
use crate::jobs::{InMemoryJobQueue, TransformerRegistry, Worker};
use crate::orchestrator::Orchestrator;
use crate::provider::ProviderAdapter;
use crate::rate_limit::RateLimiter;
use crate::transformer::TransformerPipeline;

const QUEUE_CAPACITY: usize = 64;

/// Orchestrator plus the worker and event stream behind its queue
pub struct Runtime {
    pub orchestrator: Orchestrator,
    pub events: BroadcastEventSink,
    pub worker: Worker,
}

impl Runtime {
    /// Build with in-memory stores and the given provider adapter
    pub fn from_config(config: &MorphConfig, provider: Arc<dyn ProviderAdapter>) -> Result<Self> {
        Self::with_stores(config, provider, &CacheStoreRegistry::with_memory())
    }

    /// Build resolving the cache store from `stores`
    pub fn with_stores(
        config: &MorphConfig,
        provider: Arc<dyn ProviderAdapter>,
        stores: &CacheStoreRegistry,
    ) -> Result<Self> {
        config.validate()?;

        let cache = ResultCache::from_registry(stores, config.cache.clone())?;
        let pipeline = TransformerPipeline::new(provider, cache, config.providers.clone());
        let registry = TransformerRegistry::new();
        let events = BroadcastEventSink::default();
        let (queue, receiver) = InMemoryJobQueue::new(QUEUE_CAPACITY);

        let sink: Arc<dyn EventSink> = Arc::new(events.clone());
        let worker = Worker::new(receiver, pipeline.clone(), registry.clone(), sink);

        let orchestrator = Orchestrator::new(
            pipeline,
            RateLimiter::in_memory(config.rate_limit.clone()),
            Arc::new(queue),
            registry,
            config.queue.clone(),
        )
        .with_fetcher(Arc::new(HttpFetcher::new(&config.http)?));

        Ok(Self {
            orchestrator,
            events,
            worker,
        })
    }
}
