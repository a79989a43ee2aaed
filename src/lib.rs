// src/lib.rs

//! MagicMirror Library
//!
//! Crawls websites into a filesystem-backed archive and serves them back,
//! each mirrored authority under its own host label inside an archive
//! domain.

pub mod codec;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod router;
pub mod selftest;
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
