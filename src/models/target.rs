//! Canonical description of a mirrorable resource.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::normalize;
use crate::error::{AppError, Result};

/// URL scheme supported by the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Lowercase token used in URLs, labels and storage keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Port implied when a URL names none.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("http") {
            Ok(Scheme::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Ok(Scheme::Https)
        } else {
            Err(AppError::validation(format!("unsupported scheme '{s}'")))
        }
    }
}

/// A URL reduced to (scheme, host, port, path, query) in canonical form.
///
/// Values are only built by [`normalize`](crate::codec::normalize()) and the
/// constructors below, so the host is always a valid lowercase DNS name or
/// IPv4 literal and the path/query are already canonically escaped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedTarget {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
}

impl NormalizedTarget {
    /// Assemble a target from parts that are already canonical.
    pub(crate) fn from_canonical(
        scheme: Scheme,
        host: String,
        port: u16,
        path: String,
        query: Option<String>,
    ) -> Self {
        Self {
            scheme,
            host,
            port,
            path,
            query,
        }
    }

    /// The root (`/`, no query) of an authority.
    pub fn root(scheme: Scheme, host: &str, port: u16) -> Result<Self> {
        let host = normalize::canonical_host(host)?;
        if port == 0 {
            return Err(AppError::invalid_url(
                format!("{scheme}://{host}:0"),
                "port must be in 1..=65535",
            ));
        }
        Ok(Self::from_canonical(scheme, host, port, "/".into(), None))
    }

    /// Build a target from pieces that arrive separately, such as an
    /// authority decoded from a label plus a live request path.
    ///
    /// The pieces go through the same canonicalization as [`normalize`], so
    /// a served request finds what the crawl stored.
    ///
    /// [`normalize`]: crate::codec::normalize()
    pub fn from_parts(
        scheme: Scheme,
        host: &str,
        port: u16,
        path: &str,
        query: Option<&str>,
    ) -> Result<Self> {
        let root = Self::root(scheme, host, port)?;
        root.with_request(path, query)
    }

    /// Same authority, different path and query.
    pub fn with_request(&self, path: &str, query: Option<&str>) -> Result<Self> {
        let path = if path.is_empty() { "/" } else { path };
        if !path.starts_with('/') {
            return Err(AppError::invalid_url(path, "request path must start with '/'"));
        }
        let mut url = format!("{}{}", self.origin(), path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        normalize::normalize(&url)
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// True when the port is the scheme default.
    pub fn is_default_port(&self) -> bool {
        self.port == self.scheme.default_port()
    }

    /// True when both targets share scheme, host and port.
    pub fn same_authority(&self, other: &Self) -> bool {
        self.scheme == other.scheme && self.host == other.host && self.port == other.port
    }

    /// `scheme://host[:port]` with the default port omitted.
    pub fn origin(&self) -> String {
        if self.is_default_port() {
            format!("{}://{}", self.scheme, self.host)
        } else {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        }
    }

    /// Re-serialize as an absolute URL.
    pub fn to_url(&self) -> String {
        let mut url = self.origin();
        url.push_str(&self.path);
        if let Some(query) = &self.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

impl fmt::Display for NormalizedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}
