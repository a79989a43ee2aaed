// src/services/fetcher.rs

//! HTTP fetching for the crawl.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CrawlerConfig, FetchResult};

/// Something that turns a URL into a response snapshot.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResult>;
}

/// reqwest-backed fetcher.
///
/// Redirects are not followed: a redirect is archived as the redirect
/// response itself, so replaying it sends the browser on to the mirrored
/// location.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    /// Create a configured asynchronous HTTP client.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for PageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        log::debug!("Fetched {} ({}, {} bytes)", url, status, body.len());
        Ok(FetchResult {
            url: url.to_string(),
            status,
            headers,
            body,
        })
    }
}
