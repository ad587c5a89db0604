//! Remote content fetching for URL sources

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;

use crate::error::{Error, Result};
use crate::http::HttpConfig;

/// Turns a URL into text the transformer can consume
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetches the response body over HTTP(S)
pub struct HttpFetcher {
    client: ReqwestClient,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).map_err(|e| Error::Fetch {
            url: url.to_string(),
            message: format!("Invalid URL: {}", e),
            source: Some(e.into()),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Fetch {
                url: url.to_string(),
                message: format!("Unsupported scheme '{}'", parsed.scheme()),
                source: None,
            });
        }

        tracing::debug!(%url, "fetching remote content");

        let response = self.client.get(parsed).send().await.map_err(|e| Error::Fetch {
            url: url.to_string(),
            message: e.to_string(),
            source: Some(e.into()),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                message: format!("Server responded with {}", status),
                source: None,
            });
        }

        response.text().await.map_err(|e| Error::Fetch {
            url: url.to_string(),
            message: format!("Failed to read body: {}", e),
            source: Some(e.into()),
        })
    }
}
