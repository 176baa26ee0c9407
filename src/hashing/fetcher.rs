// src/hashing/fetcher.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use url::Url;

/// Source of raw image bytes. The HTTP implementation is used in production;
/// tests substitute an in-memory one.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// Fetches images over HTTP(S) with a per-request timeout and no retries.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for image fetching")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid image URL: {}", url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Unsupported image URL scheme '{}': {}", parsed.scheme(), url);
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .with_context(|| format!("Request failed for {}", url))?
            .error_for_status()
            .with_context(|| format!("Bad status for {}", url))?;

        response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))
    }
}
