//! Service layer for the crawl side of the mirror.
//!
//! This module contains:
//! - HTTP fetching (`PageFetcher`)
//! - Link discovery (`WgetSpider`, `StartOnly`)
//! - Persisting fetched responses (`MirrorWriter`)

mod discovery;
mod fetcher;
mod mirror;

pub use discovery::{StartOnly, UrlSource, WgetSpider, parse_spider_output, url_source};
pub use fetcher::{Fetcher, PageFetcher};
pub use mirror::MirrorWriter;
