//! FOTA feed fetching
//!
//! A failed fetch is never an error for the caller: connection failures,
//! timeouts and non-success statuses are logged and reported as "no data",
//! and the monitor skips that feed for this run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of raw feed documents
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the document at `url`, or `None` if it could not be retrieved
    async fn fetch(&self, url: &str) -> Option<String>;
}

/// Feed source backed by plain HTTP GET requests
pub struct HttpFeedClient {
    /// HTTP client
    client: reqwest::Client,
}

impl HttpFeedClient {
    /// Create a new client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedClient {
    async fn fetch(&self, url: &str) -> Option<String> {
        debug!(url = %url, "Fetching firmware feed");

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to fetch firmware feed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                url = %url,
                status = %response.status(),
                "Firmware feed fetch failed"
            );
            return None;
        }

        match response.text().await {
            Ok(text) => {
                debug!(url = %url, bytes = text.len(), "Fetched firmware feed");
                Some(text)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to read firmware feed body");
                None
            }
        }
    }
}
