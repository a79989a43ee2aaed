// src/codec/mod.rs

//! Codecs between URLs, storage keys and mirror host labels.
//!
//! - [`normalize`] reduces a URL to a [`NormalizedTarget`](crate::models::NormalizedTarget)
//! - [`PathCodec`] maps targets to storage keys and back
//! - [`to_label`] / [`from_label`] map an authority to a serving host name

pub mod escape;
pub mod fold;
pub mod label;
pub mod normalize;
pub mod path;

pub use fold::{Fold, FoldIndex};
pub use label::{from_label, normalize_suffix, to_label};
pub use normalize::normalize;
pub use path::{EncodedPath, PathCodec, decode_authority};
