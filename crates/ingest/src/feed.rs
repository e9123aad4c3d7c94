use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use postgate_core::config::IngestConfig;
use postgate_core::Page;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed answered {status} for page {page}")]
    Status { page: u32, status: u16 },

    #[error("page {page} could not be decoded: {source}")]
    Decode {
        page: u32,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of feed pages, numbered from 1.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<Page, FeedError>;
}

/// [`PageSource`] that GETs `{url}?page=N`.
pub struct HttpFeed {
    client: Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self, FeedError> {
        Self::new(config.feed_url.clone(), config.http_timeout())
    }
}

#[async_trait]
impl PageSource for HttpFeed {
    async fn fetch_page(&self, page: u32) -> Result<Page, FeedError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("page", page)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                page,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let decoded: Page =
            serde_json::from_slice(&body).map_err(|source| FeedError::Decode { page, source })?;
        debug!(page, records = decoded.data.len(), "fetched page");
        Ok(decoded)
    }
}
