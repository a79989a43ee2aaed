// src/pipeline/crawl.rs

//! Crawl pipeline: discover, fetch and store the URLs of one or more sites.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::codec::normalize;
use crate::error::Result;
use crate::models::CrawlerConfig;
use crate::services::{Fetcher, MirrorWriter, UrlSource};

/// Counters for one crawl run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Distinct targets queued for fetching
    pub discovered: usize,
    /// Responses received (any status)
    pub fetched: usize,
    /// Responses written to the store
    pub stored: usize,
    /// URLs that could not be normalized, fetched or stored
    pub failed: usize,
    /// URLs skipped by suffix
    pub skipped: usize,
}

impl CrawlStats {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            end_time: now,
            discovered: 0,
            fetched: 0,
            stored: 0,
            failed: 0,
            skipped: 0,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}

/// Crawl every start URL into the store.
///
/// Per-URL failures are logged and counted; the run itself only fails when
/// nothing can be attempted at all.
pub async fn run_crawler(
    config: &CrawlerConfig,
    source: &dyn UrlSource,
    fetcher: &dyn Fetcher,
    writer: &MirrorWriter,
    start_urls: &[String],
) -> Result<CrawlStats> {
    let mut stats = CrawlStats::new();
    let mut seen = BTreeSet::new();
    let mut queue = Vec::new();

    for start in start_urls {
        log::info!("Discovering links from {start}");
        let mut urls = vec![start.clone()];
        match source.discover(start).await {
            Ok(found) => urls.extend(found),
            Err(e) => log::error!("Discovery failed for {start}: {e}"),
        }

        for url in urls {
            if config.skip_suffixes.iter().any(|s| url.ends_with(s.as_str())) {
                log::debug!("Skipping {url}");
                stats.skipped += 1;
                continue;
            }
            match normalize(&url) {
                Ok(target) => {
                    if seen.insert(target) {
                        queue.push(url);
                    }
                }
                Err(e) => {
                    log::warn!("Ignoring {url}: {e}");
                    stats.failed += 1;
                }
            }
        }
    }

    stats.discovered = queue.len();
    log::info!(
        "Fetching {} URLs ({} concurrent)",
        queue.len(),
        config.max_concurrent
    );

    let delay = Duration::from_millis(config.request_delay_ms);
    let mut results = stream::iter(queue)
        .map(|url| async move {
            let result = fetcher.fetch(&url).await;
            (url, result)
        })
        .buffer_unordered(config.max_concurrent.max(1));

    // Writes stay sequential so fold index saves never interleave.
    while let Some((url, result)) = results.next().await {
        let fetch = match result {
            Ok(fetch) => fetch,
            Err(e) => {
                log::warn!("Fetch failed for {url}: {e}");
                stats.failed += 1;
                continue;
            }
        };
        stats.fetched += 1;
        let status = fetch.status;

        match writer.ingest(fetch).await {
            Ok(key) => {
                log::info!("[{status}] {url} -> {key}");
                stats.stored += 1;
            }
            Err(e) => {
                log::warn!("Store failed for {url}: {e}");
                stats.failed += 1;
            }
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    stats.end_time = Utc::now();
    log::info!(
        "Crawl complete in {}s: {} discovered, {} fetched, {} stored, {} failed, {} skipped",
        stats.duration().num_seconds(),
        stats.discovered,
        stats.fetched,
        stats.stored,
        stats.failed,
        stats.skipped
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PathCodec;
    use crate::error::AppError;
    use crate::models::{FetchResult, StoreConfig};
    use crate::services::StartOnly;
    use crate::storage::{MemoryStore, MirrorStore};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Fixed link graph standing in for wget.
    struct StaticSource(Vec<&'static str>);

    #[async_trait]
    impl UrlSource for StaticSource {
        async fn discover(&self, _start_url: &str) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    /// Serves canned bodies and records every request.
    struct FakeFetcher {
        pages: HashMap<&'static str, &'static str>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchResult> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(body) => Ok(FetchResult {
                    url: url.to_string(),
                    status: 200,
                    headers: vec![("Content-Type".into(), "text/html".into())],
                    body: body.as_bytes().to_vec(),
                }),
                None => Err(AppError::crawl(url, "connection refused")),
            }
        }
    }

    fn fetcher(pages: &[(&'static str, &'static str)]) -> FakeFetcher {
        FakeFetcher {
            pages: pages.iter().copied().collect(),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn writer(store: Arc<MemoryStore>) -> MirrorWriter {
        MirrorWriter::new(
            PathCodec::new(&StoreConfig::default()),
            store,
            &CrawlerConfig::default(),
        )
    }

    #[tokio::test]
    async fn crawls_discovered_urls() {
        let store = Arc::new(MemoryStore::new());
        let source = StaticSource(vec![
            "http://example.com/",
            "http://example.com/about.html",
            "http://example.com/robots.txt",
            "http://EXAMPLE.com:80/about.html",
            "http://example.com/missing",
            "not a url",
        ]);
        let fetcher = fetcher(&[
            ("http://example.com/", "home"),
            ("http://example.com/about.html", "about"),
        ]);

        let stats = run_crawler(
            &CrawlerConfig::default(),
            &source,
            &fetcher,
            &writer(store.clone()),
            &["http://example.com/".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(stats.discovered, 3);
        assert_eq!(stats.fetched, 2);
        assert_eq!(stats.stored, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(
            store.keys().await,
            vec![
                "http/com/example/@default/!",
                "http/com/example/@default/about.html!",
            ]
        );
        assert!(
            !fetcher
                .requested
                .lock()
                .unwrap()
                .iter()
                .any(|u| u.ends_with("robots.txt"))
        );
    }

    #[tokio::test]
    async fn start_url_is_always_fetched() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = fetcher(&[("https://other.site.com:444/a/?x=1", "page")]);

        let stats = run_crawler(
            &CrawlerConfig::default(),
            &StaticSource(Vec::new()),
            &fetcher,
            &writer(store.clone()),
            &["https://other.site.com:444/a/?x=1".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(stats.stored, 1);
        let entry = store.get("https/com/site/other/@444/a/!x=1").await.unwrap();
        assert_eq!(entry.body, b"page");
    }

    #[tokio::test]
    async fn start_only_source_dedups_start_url() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = fetcher(&[("http://example.com/", "home")]);

        let stats = run_crawler(
            &CrawlerConfig::default(),
            &StartOnly,
            &fetcher,
            &writer(store.clone()),
            &["http://example.com/".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(stats.discovered, 1);
        assert_eq!(fetcher.requested.lock().unwrap().len(), 1);
    }
}
