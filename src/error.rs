// src/error.rs

//! Unified error handling for the mirror.
//!
//! Codec, routing and store failures share one enum so per-URL crawl
//! failures and per-request serve failures can be logged and mapped the
//! same way.

use std::fmt;

use thiserror::Error;

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The input lacks a parseable http(s) scheme and host.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// The host cannot be carried in a DNS label.
    #[error("Unsupported host '{0}'")]
    UnsupportedHost(String),

    /// Two distinct targets would share one storage key.
    #[error("Path collision at '{key}': {message}")]
    PathCollision { key: String, message: String },

    /// The key is over the store's length limit even after folding.
    #[error("Storage path too long ({length} > {limit}) for {url}")]
    PathTooLong {
        url: String,
        length: usize,
        limit: usize,
    },

    /// A storage key does not decode to exactly one target.
    #[error("Ambiguous storage path '{key}': {message}")]
    AmbiguousPath { key: String, message: String },

    /// The host is not under the configured archive suffix.
    #[error("Host '{host}' is not under archive '{suffix}'")]
    UnknownArchive { host: String, suffix: String },

    /// The labels before the suffix are not `<scheme>.<host>[.<port>]`.
    #[error("Malformed mirror label '{host}': {message}")]
    MalformedLabel { host: String, message: String },

    /// The token before the suffix could be either a host or a port.
    #[error("Ambiguous mirror label '{0}'")]
    AmbiguousLabel(String),

    /// Nothing is stored under the key.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The store could not persist an entry.
    #[error("Write failed for '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Crawling error
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },
}

impl AppError {
    /// Create an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a path collision error.
    pub fn collision(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::PathCollision {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create an ambiguous path error.
    pub fn ambiguous_path(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::AmbiguousPath {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create a malformed label error.
    pub fn malformed_label(host: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::MalformedLabel {
            host: host.into(),
            message: message.to_string(),
        }
    }

    /// Create a write error for a store key.
    pub fn write(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Write {
            key: key.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// True for failures that mean "this host is not a mirror".
    pub fn is_label_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownArchive { .. } | Self::MalformedLabel { .. } | Self::AmbiguousLabel(_)
        )
    }

    /// True when a retry of the same store write may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}
