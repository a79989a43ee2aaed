//! Link discovery: expanding a start URL into the URLs of a site.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, DiscoveryMode};

/// Source of URLs to crawl for a start URL.
#[async_trait]
pub trait UrlSource: Send + Sync {
    /// URLs reachable from `start_url`. The start URL itself may or may not
    /// be included.
    async fn discover(&self, start_url: &str) -> Result<Vec<String>>;
}

/// Build the configured URL source.
pub fn url_source(config: &CrawlerConfig) -> Box<dyn UrlSource> {
    match config.discovery {
        DiscoveryMode::Wget => Box::new(WgetSpider::new(config)),
        DiscoveryMode::None => Box::new(StartOnly),
    }
}

/// Discovery that only ever yields the start URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOnly;

#[async_trait]
impl UrlSource for StartOnly {
    async fn discover(&self, start_url: &str) -> Result<Vec<String>> {
        Ok(vec![start_url.to_string()])
    }
}

/// Recursive `wget --spider` run; every URL wget visits is collected.
#[derive(Debug, Clone)]
pub struct WgetSpider {
    program: String,
    timeout: Duration,
}

const WGET_ARGS: [&str; 6] = ["-r", "-l", "inf", "-nd", "--spider", "--delete-after"];

impl WgetSpider {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            program: config.wget_path.clone(),
            timeout: Duration::from_secs(config.discovery_timeout_secs),
        }
    }
}

#[async_trait]
impl UrlSource for WgetSpider {
    async fn discover(&self, start_url: &str) -> Result<Vec<String>> {
        log::info!("Running {} spider on {}", self.program, start_url);

        let mut command = Command::new(&self.program);
        command
            .args(WGET_ARGS)
            .arg(start_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                AppError::crawl(
                    start_url,
                    format!("discovery timed out after {:?}", self.timeout),
                )
            })?
            .map_err(|e| AppError::crawl(start_url, format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            // wget exits non-zero when any page on the site failed.
            log::warn!("{} exited with {} for {}", self.program, output.status, start_url);
        }

        // wget logs to stderr; read both streams in case it was redirected.
        let mut urls = parse_spider_output(&String::from_utf8_lossy(&output.stderr));
        urls.extend(parse_spider_output(&String::from_utf8_lossy(&output.stdout)));
        log::info!("Discovered {} URLs from {}", urls.len(), start_url);
        Ok(urls)
    }
}

/// Pull visited URLs out of wget's log.
///
/// Request lines look like `--2024-01-01 10:00:00--  http://example.com/`;
/// the URL is the last whitespace-separated token.
pub fn parse_spider_output(log: &str) -> Vec<String> {
    log.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("--"))
        .filter_map(|line| line.split_whitespace().last())
        .filter(|token| token.contains("://"))
        .map(str::to_string)
        .collect()
}
