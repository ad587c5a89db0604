//! Staged execution of a transformer
//!
//! resolve → cache check → before hook → request → provider → extract →
//! cache write → after hook. Provider failures become failed results; hook
//! errors are returned to the caller.

use std::sync::Arc;
use tracing::instrument;

use crate::cache::ResultCache;
use crate::error::Result;
use crate::media::Content;
use crate::provider::{ProviderAdapter, ProviderResponse, ProvidersConfig};
use crate::result::{TransformerMetadata, TransformerResult};
use crate::transformer::{ResolvedConfig, Transformer};

/// Runs transformers against an injected provider adapter and result cache
#[derive(Clone)]
pub struct TransformerPipeline {
    provider: Arc<dyn ProviderAdapter>,
    cache: ResultCache,
    providers: ProvidersConfig,
}

impl TransformerPipeline {
    pub fn new(provider: Arc<dyn ProviderAdapter>, cache: ResultCache, providers: ProvidersConfig) -> Self {
        Self {
            provider,
            cache,
            providers,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn providers(&self) -> &ProvidersConfig {
        &self.providers
    }

    /// Run one transformation end to end
    #[instrument(skip_all, fields(transformer = transformer.name()))]
    pub async fn execute(&self, transformer: &dyn Transformer, content: Content) -> Result<TransformerResult> {
        let config = ResolvedConfig::resolve(transformer, &self.providers)?;
        let cache_key = config.key_builder().cache_key(self.cache.prefix());

        if let Some(cached) = self.cache.lookup(&cache_key).await {
            return Ok(cached);
        }

        transformer.before_transform(&content).await?;

        let metadata = TransformerMetadata::new(config.model.clone(), config.provider, config.transformer.clone());
        let request = config.request(content);

        tracing::debug!(
            provider = %config.provider,
            model = %config.model,
            structured = config.schema.is_some(),
            "sending provider request"
        );

        let result = match self.provider.send(request).await.and_then(extract) {
            Ok(content) => TransformerResult::completed(content, Some(metadata)),
            Err(error) => {
                tracing::warn!(%error, provider = %config.provider, "transformation failed");
                TransformerResult::failed([error.to_string()], Some(metadata))
            }
        };

        if result.is_successful() {
            self.cache.store(&cache_key, &result).await;
        }

        transformer.after_transform(&result).await?;

        Ok(result)
    }
}

fn extract(response: ProviderResponse) -> Result<String> {
    match response {
        ProviderResponse::Text(text) => Ok(text),
        ProviderResponse::Structured(value) => Ok(serde_json::to_string(&value)?),
    }
}
