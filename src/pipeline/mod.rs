//! Pipeline entry points.
//!
//! - `run_crawler`: discover, fetch and store the URLs of one or more sites

pub mod crawl;

pub use crawl::{CrawlStats, run_crawler};
