//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Archive domain and listener settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// HTTP fetching and discovery behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Storage backend limits
    #[serde(default)]
    pub store: StoreConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration if the file exists.
    ///
    /// A missing file is `Ok(None)`; a file that exists but does not parse
    /// is an error, so the caller decides whether to fall back.
    pub fn load_if_exists(path: impl AsRef<Path>) -> Result<Option<Self>> {
        if !path.as_ref().exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.discovery_timeout_secs == 0 {
            return Err(AppError::validation(
                "crawler.discovery_timeout_secs must be > 0",
            ));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        // A fold token is a prefix, '~' and 32 hex digits.
        if self.store.max_component_len < 64 {
            return Err(AppError::validation("store.max_component_len must be >= 64"));
        }
        if self.store.max_path_len < self.store.max_component_len {
            return Err(AppError::validation(
                "store.max_path_len must be >= store.max_component_len",
            ));
        }
        Ok(())
    }

    /// Validate the settings `serve` needs on top of [`Config::validate`].
    pub fn validate_serve(&self) -> Result<()> {
        self.validate()?;
        let suffix = self.archive.normalized_suffix();
        if suffix.is_empty() {
            return Err(AppError::validation("archive.suffix is empty"));
        }
        if suffix.split('.').any(str::is_empty) {
            return Err(AppError::validation(format!(
                "archive.suffix '{}' has an empty label",
                self.archive.suffix
            )));
        }
        Ok(())
    }
}

/// Archive domain and HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Domain under which mirrored hosts are served (e.g. `my.archive.com`)
    #[serde(default)]
    pub suffix: String,

    /// Port the server listens on
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Interface address the server binds to
    #[serde(default = "defaults::bind")]
    pub bind: String,

    /// Port shown in generated links, if it differs from `port`
    #[serde(default)]
    pub public_port: Option<u16>,
}

impl ArchiveConfig {
    /// Suffix in the form the label codec compares against.
    pub fn normalized_suffix(&self) -> String {
        crate::codec::normalize_suffix(&self.suffix)
    }

    /// `:port` to append to links, empty for port 80.
    pub fn link_port(&self) -> String {
        match self.public_port.unwrap_or(self.port) {
            80 => String::new(),
            port => format!(":{port}"),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            suffix: String::new(),
            port: defaults::port(),
            bind: defaults::bind(),
            public_port: None,
        }
    }
}

/// How the crawler expands a start URL into the set of URLs to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Run `wget --spider` and collect every URL it visits
    Wget,
    /// Fetch only the start URLs
    None,
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Upper bound for one link discovery run
    #[serde(default = "defaults::discovery_timeout")]
    pub discovery_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay after each stored response in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Link discovery strategy
    #[serde(default = "defaults::discovery")]
    pub discovery: DiscoveryMode,

    /// Path to the wget executable
    #[serde(default = "defaults::wget_path")]
    pub wget_path: String,

    /// URLs ending with any of these are never fetched
    #[serde(default = "defaults::skip_suffixes")]
    pub skip_suffixes: Vec<String>,

    /// Extra attempts for a failed store write
    #[serde(default = "defaults::write_retries")]
    pub write_retries: u32,

    /// Back-off between store write attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            discovery_timeout_secs: defaults::discovery_timeout(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: 0,
            discovery: defaults::discovery(),
            wget_path: defaults::wget_path(),
            skip_suffixes: defaults::skip_suffixes(),
            write_retries: defaults::write_retries(),
            retry_delay_ms: defaults::retry_delay(),
        }
    }
}

/// Storage backend limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Longest single file or directory name, in bytes
    #[serde(default = "defaults::max_component_len")]
    pub max_component_len: usize,

    /// Longest key relative to the database root, in bytes
    #[serde(default = "defaults::max_path_len")]
    pub max_path_len: usize,

    /// Escape uppercase letters so names survive a case-folding filesystem
    #[serde(default)]
    pub case_insensitive: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_component_len: defaults::max_component_len(),
            max_path_len: defaults::max_path_len(),
            case_insensitive: false,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use super::DiscoveryMode;

    // Archive defaults
    pub fn port() -> u16 {
        80
    }
    pub fn bind() -> String {
        "0.0.0.0".into()
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; MagicMirror/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn discovery_timeout() -> u64 {
        3600
    }
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn discovery() -> DiscoveryMode {
        DiscoveryMode::Wget
    }
    pub fn wget_path() -> String {
        "wget".into()
    }
    pub fn skip_suffixes() -> Vec<String> {
        vec!["robots.txt".into()]
    }
    pub fn write_retries() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        200
    }

    // Store defaults
    pub fn max_component_len() -> usize {
        255
    }
    pub fn max_path_len() -> usize {
        1024
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}
