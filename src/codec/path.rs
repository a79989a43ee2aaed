// src/codec/path.rs

//! Bijective mapping between targets and storage keys.
//!
//! A key is a `/`-separated relative path:
//!
//! ```text
//! <scheme>/<host labels, reversed>/@<port|default>/<dirs...>/<leaf>
//! leaf = <last path segment>!<query>
//! ```
//!
//! `http://example.com/index.html` is stored at
//! `http/com/example/@default/index.html!` and
//! `https://other.site.com:444/a/?x=1` at
//! `https/com/site/other/@444/a/!x=1`.
//!
//! The `!` in every leaf keeps `/a` and `/a/b` apart (`a!` is a file,
//! `a` a directory) and separates the query without loss. Components are
//! store-escaped so that `!`, `~`, separators and device names never appear
//! literally. Components or key tails over the length limits are folded
//! into `<prefix>~<hash>` tokens recorded in a [`FoldIndex`].

use std::sync::Arc;

use percent_encoding::percent_decode_str;

use crate::codec::escape::{
    canonical_query, canonical_segment, guard_component, store_query, store_segment, unstore_query,
};
use crate::codec::fold::{Fold, FoldIndex};
use crate::codec::normalize::canonical_host;
use crate::error::{AppError, Result};
use crate::models::{NormalizedTarget, Scheme, StoreConfig};
use crate::utils::short_hash;

/// First byte of the port directory; never starts a host label.
pub const PORT_MARKER: char = '@';

/// Port directory for the scheme default port.
pub const DEFAULT_PORT_DIR: &str = "@default";

/// Separates the last path segment from the query inside a leaf.
pub const QUERY_SENTINEL: char = '!';

/// Stored name of an empty directory segment (`//` in a path).
pub const EMPTY_SEGMENT: &str = "%";

/// Separates a fold prefix from its hash.
pub const FOLD_MARKER: char = '~';

const FOLD_PREFIX_LEN: usize = 16;
const FOLD_HASH_BYTES: usize = 16;

/// A storage key plus the folds it relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPath {
    pub key: String,
    pub folds: Vec<Fold>,
}

/// Path codec bound to a store's limits and fold index.
#[derive(Debug, Clone)]
pub struct PathCodec {
    max_component_len: usize,
    max_path_len: usize,
    fold_case: bool,
    index: Arc<FoldIndex>,
}

impl PathCodec {
    /// Codec with an empty fold index.
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_index(config, Arc::new(FoldIndex::new()))
    }

    pub fn with_index(config: &StoreConfig, index: Arc<FoldIndex>) -> Self {
        Self {
            max_component_len: config.max_component_len,
            max_path_len: config.max_path_len,
            fold_case: config.case_insensitive,
            index,
        }
    }

    pub fn index(&self) -> &Arc<FoldIndex> {
        &self.index
    }

    /// Compute the key for a target without touching the fold index.
    ///
    /// # Errors
    /// [`AppError::PathTooLong`] when even a fully folded key is over the
    /// path limit, [`AppError::PathCollision`] when a fold token is already
    /// bound to different text.
    pub fn encode(&self, target: &NormalizedTarget) -> Result<EncodedPath> {
        let authority = authority_components(target);
        let body = self.body_components(target);

        // Every authority component is followed by a separator.
        let authority_len: usize = authority.iter().map(|c| c.len() + 1).sum();

        let mut components: Vec<(String, Option<Fold>)> = body
            .iter()
            .map(|component| {
                if component.len() > self.max_component_len {
                    let fold = make_fold(component, component.clone());
                    (fold.token.clone(), Some(fold))
                } else {
                    (component.clone(), None)
                }
            })
            .collect();

        let body_len = components.iter().map(|(c, _)| c.len()).sum::<usize>()
            + components.len().saturating_sub(1);

        if authority_len + body_len > self.max_path_len {
            let (keep, tail) = self
                .fold_tail(&body, &components, authority_len)
                .ok_or_else(|| AppError::PathTooLong {
                    url: target.to_url(),
                    length: authority_len + body_len,
                    limit: self.max_path_len,
                })?;
            components.truncate(keep);
            components.push((tail.token.clone(), Some(tail)));
        }

        let mut key = authority.join("/");
        let mut folds = Vec::new();
        for (component, fold) in components {
            key.push('/');
            key.push_str(&component);
            folds.extend(fold);
        }

        for fold in &folds {
            self.index.check(fold)?;
        }

        Ok(EncodedPath { key, folds })
    }

    /// Compute the key for a target and record any folds it needs.
    pub fn to_path(&self, target: &NormalizedTarget) -> Result<String> {
        let encoded = self.encode(target)?;
        self.register(&encoded.folds)?;
        Ok(encoded.key)
    }

    /// Record folds in the index. Returns `true` when the index grew.
    pub fn register(&self, folds: &[Fold]) -> Result<bool> {
        let mut grew = false;
        for fold in folds {
            grew |= self.index.insert(fold)?;
        }
        Ok(grew)
    }

    /// Decode a key back to its target.
    ///
    /// Only keys produced by [`PathCodec::to_path`] decode; anything else,
    /// including non-canonical spellings of a valid key, is
    /// [`AppError::AmbiguousPath`].
    pub fn from_path(&self, key: &str) -> Result<NormalizedTarget> {
        let parts: Vec<&str> = key.split('/').collect();
        let port_at = parts
            .iter()
            .position(|p| p.starts_with(PORT_MARKER))
            .ok_or_else(|| AppError::ambiguous_path(key, "missing port directory"))?;
        let authority = decode_authority(&parts[..=port_at])
            .map_err(|e| AppError::ambiguous_path(key, e))?;

        let mut body: Vec<String> = Vec::new();
        for part in &parts[port_at + 1..] {
            if part.contains(FOLD_MARKER) {
                let original = self.index.resolve(part).ok_or_else(|| {
                    AppError::ambiguous_path(key, format!("unknown fold token '{part}'"))
                })?;
                body.extend(original.split('/').map(str::to_string));
            } else {
                body.push((*part).to_string());
            }
        }

        let (leaf, dirs) = body
            .split_last()
            .ok_or_else(|| AppError::ambiguous_path(key, "missing leaf"))?;

        let (last, stored_query) = match leaf.split_once(QUERY_SENTINEL) {
            Some((segment, query)) if !query.contains(QUERY_SENTINEL) => (segment, query),
            _ => {
                return Err(AppError::ambiguous_path(
                    key,
                    "leaf must contain exactly one query sentinel",
                ));
            }
        };

        let mut segments = Vec::with_capacity(body.len());
        for dir in dirs {
            if dir.is_empty() {
                return Err(AppError::ambiguous_path(key, "empty component"));
            }
            if dir == EMPTY_SEGMENT {
                segments.push(String::new());
            } else {
                segments.push(canonical_segment(dir));
            }
        }
        segments.push(canonical_segment(last));

        let query = if stored_query.is_empty() {
            None
        } else {
            let query = unstore_query(stored_query)
                .ok_or_else(|| AppError::ambiguous_path(key, "query is not valid UTF-8"))?;
            if canonical_query(&query).as_deref() != Some(query.as_str()) {
                return Err(AppError::ambiguous_path(key, "query is not canonical"));
            }
            Some(query)
        };

        let target = NormalizedTarget::from_canonical(
            authority.scheme(),
            authority.host().to_string(),
            authority.port(),
            format!("/{}", segments.join("/")),
            query,
        );

        let canonical = self.encode(&target).map(|encoded| encoded.key);
        if canonical.ok().as_deref() != Some(key) {
            return Err(AppError::ambiguous_path(
                key,
                "not the canonical key for its target",
            ));
        }
        Ok(target)
    }

    fn body_components(&self, target: &NormalizedTarget) -> Vec<String> {
        let rest = target.path().strip_prefix('/').unwrap_or(target.path());
        let mut dirs: Vec<&str> = rest.split('/').collect();
        let last = dirs.pop().unwrap_or("");

        let mut components: Vec<String> = dirs
            .iter()
            .map(|dir| {
                if dir.is_empty() {
                    EMPTY_SEGMENT.to_string()
                } else {
                    guard_component(store_segment(dir, self.fold_case))
                }
            })
            .collect();

        let mut leaf = store_segment(last, self.fold_case);
        leaf.push(QUERY_SENTINEL);
        if let Some(query) = target.query() {
            leaf.push_str(&store_query(query, self.fold_case));
        }
        components.push(guard_component(leaf));
        components
    }

    /// Find the shortest tail of `body` whose fold brings the key under the
    /// path limit. Returns how many leading components stay and the fold.
    fn fold_tail(
        &self,
        body: &[String],
        components: &[(String, Option<Fold>)],
        authority_len: usize,
    ) -> Option<(usize, Fold)> {
        (0..body.len()).rev().find_map(|keep| {
            let fold = make_fold(&body[keep], body[keep..].join("/"));
            let kept_len: usize = components[..keep].iter().map(|(c, _)| c.len() + 1).sum();
            let length = authority_len + kept_len + fold.token.len();
            (length <= self.max_path_len && fold.token.len() <= self.max_component_len)
                .then_some((keep, fold))
        })
    }
}

/// Decode the `<scheme>/<labels...>/@<port>` prefix of a key.
///
/// Only the root of the authority is returned; the store uses this to list
/// mirrored sites from its directory tree.
pub fn decode_authority(parts: &[&str]) -> Result<NormalizedTarget> {
    let (scheme_dir, rest) = parts
        .split_first()
        .ok_or_else(|| AppError::validation("empty key"))?;
    let (port_dir, label_dirs) = rest
        .split_last()
        .ok_or_else(|| AppError::validation("missing port directory"))?;

    // Scheme directories are always lowercase.
    let scheme: Scheme = match *scheme_dir {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => {
            return Err(AppError::validation(format!(
                "unknown scheme directory '{other}'"
            )));
        }
    };

    let mut labels = Vec::with_capacity(label_dirs.len());
    for dir in label_dirs.iter().rev() {
        let label = percent_decode_str(dir)
            .decode_utf8()
            .map_err(|_| AppError::validation(format!("bad host label '{dir}'")))?;
        labels.push(label.into_owned());
    }
    let host = canonical_host(&labels.join("."))?;

    let port = match port_dir.strip_prefix(PORT_MARKER) {
        Some("default") => scheme.default_port(),
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => digits
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0 && *p != scheme.default_port())
            .ok_or_else(|| AppError::validation(format!("bad port directory '{port_dir}'")))?,
        _ => {
            return Err(AppError::validation(format!(
                "bad port directory '{port_dir}'"
            )));
        }
    };

    let root = NormalizedTarget::root(scheme, &host, port)?;
    if authority_components(&root) != parts {
        return Err(AppError::validation("authority is not canonical"));
    }
    Ok(root)
}

fn authority_components(target: &NormalizedTarget) -> Vec<String> {
    let mut components = vec![target.scheme().as_str().to_string()];
    components.extend(
        target
            .host()
            .rsplit('.')
            .map(|label| guard_component(label.to_string())),
    );
    if target.is_default_port() {
        components.push(DEFAULT_PORT_DIR.to_string());
    } else {
        components.push(format!("{PORT_MARKER}{}", target.port()));
    }
    components
}

fn make_fold(first: &str, original: String) -> Fold {
    let hash = short_hash(original.as_bytes(), FOLD_HASH_BYTES);
    Fold {
        token: format!("{}{FOLD_MARKER}{hash}", fold_prefix(first)),
        original,
    }
}

/// Leading bytes of a component, never ending inside a `%XX` escape.
fn fold_prefix(component: &str) -> &str {
    let mut end = component.len().min(FOLD_PREFIX_LEN);
    // Store-escaped components are ASCII.
    while !component.is_char_boundary(end) {
        end -= 1;
    }
    let prefix = &component[..end];
    match prefix.rfind('%') {
        Some(at) if end - at < 3 && end < component.len() => &prefix[..at],
        _ => prefix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::normalize;

    fn codec() -> PathCodec {
        PathCodec::new(&StoreConfig::default())
    }

    fn key(url: &str) -> String {
        codec().to_path(&normalize(url).unwrap()).unwrap()
    }

    #[test]
    fn test_scenario_default_port_root() {
        assert_eq!(key("http://example.com/"), "http/com/example/@default/!");
        assert_eq!(key("http://example.com"), "http/com/example/@default/!");
        assert_eq!(
            key("http://example.com/index.html"),
            "http/com/example/@default/index.html!"
        );
    }

    #[test]
    fn test_scenario_non_default_port_with_query() {
        assert_eq!(
            key("https://other.site.com:444/a/?x=1"),
            "https/com/site/other/@444/a/!x=1"
        );
    }

    #[test]
    fn test_trailing_slash_and_case_stay_distinct() {
        let keys = [
            key("http://example.com/page"),
            key("http://example.com/page/"),
            key("http://example.com/Page"),
        ];
        assert_eq!(keys[0], "http/com/example/@default/page!");
        assert_eq!(keys[1], "http/com/example/@default/page/!");
        assert_eq!(keys[2], "http/com/example/@default/Page!");
    }

    #[test]
    fn test_file_and_directory_never_collide() {
        let file = key("http://example.com/a");
        let child = key("http://example.com/a/b");
        assert!(!child.starts_with(&format!("{file}/")));
    }

    #[test]
    fn test_query_escaping_is_reversible() {
        let codec = codec();
        let target = normalize("http://example.com/s?q=a%2Fb!c~d&e=%25").unwrap();
        let key = codec.to_path(&target).unwrap();
        assert_eq!(key.matches(QUERY_SENTINEL).count(), 1);
        assert!(!key.contains(FOLD_MARKER));
        assert_eq!(codec.from_path(&key).unwrap(), target);
    }

    #[test]
    fn test_round_trip_assorted_targets() {
        let codec = codec();
        let urls = [
            "http://example.com/",
            "http://example.com/index.html",
            "https://other.site.com:444/a/?x=1",
            "http://example.com//double//slash",
            "http://example.com/%2E%2E/x",
            "http://example.com/con/aux.html?q=nul",
            "http://example.com/trailing./dot.?",
            "http://example.com/caf%C3%A9/%E2%82%AC?%E2%82%AC=1",
            "http://example.com/a:b*c|d",
            "http://192.168.0.1:8080/x",
            "http://192.168.0.1/x",
        ];
        for url in urls {
            let target = normalize(url).unwrap();
            let key = codec.to_path(&target).unwrap();
            assert_eq!(codec.from_path(&key).unwrap(), target, "{url} -> {key}");
        }
    }

    #[test]
    fn test_reserved_names_are_escaped() {
        let key = key("http://example.com/con/aux.html");
        assert_eq!(key, "http/com/example/@default/%63on/%61ux.html!");
    }

    #[test]
    fn test_case_insensitive_store_escapes_uppercase() {
        let config = StoreConfig {
            case_insensitive: true,
            ..StoreConfig::default()
        };
        let codec = PathCodec::new(&config);
        let upper = normalize("http://example.com/Page").unwrap();
        let lower = normalize("http://example.com/page").unwrap();

        let upper_key = codec.to_path(&upper).unwrap();
        let lower_key = codec.to_path(&lower).unwrap();
        assert_ne!(upper_key.to_lowercase(), lower_key.to_lowercase());
        assert_eq!(codec.from_path(&upper_key).unwrap(), upper);

        for url in [
            "http://example.com/a%2Fb",
            "http://example.com/caf%C3%A9",
            "http://example.com/Dir%3F/x%3Fy?Q=%C3%A9",
        ] {
            let target = normalize(url).unwrap();
            let key = codec.to_path(&target).unwrap();
            assert_eq!(codec.from_path(&key).unwrap(), target, "{url} -> {key}");
        }
        let key = codec.to_path(&normalize("http://example.com/a%2Fb").unwrap()).unwrap();
        assert_eq!(key, "http/com/example/@default/a%2Fb!");
    }

    #[test]
    fn test_long_component_is_folded() {
        let codec = codec();
        let long = "a".repeat(500);
        let target = normalize(&format!("http://example.com/{long}/x")).unwrap();

        let encoded = codec.encode(&target).unwrap();
        assert_eq!(encoded.folds.len(), 1);
        assert!(encoded.key.split('/').all(|c| c.len() <= 255));

        let key = codec.to_path(&target).unwrap();
        assert_eq!(key, encoded.key);
        assert_eq!(codec.from_path(&key).unwrap(), target);
    }

    #[test]
    fn test_long_path_folds_tail() {
        let codec = codec();
        let dirs: Vec<String> = (0..100).map(|i| format!("directory{i:02}")).collect();
        let target = normalize(&format!("http://example.com/{}", dirs.join("/"))).unwrap();

        let key = codec.to_path(&target).unwrap();
        assert!(key.len() <= 1024);
        assert!(key.contains(FOLD_MARKER));
        assert!(key.starts_with("http/com/example/@default/directory00/"));
        assert_eq!(codec.from_path(&key).unwrap(), target);
    }

    #[test]
    fn test_long_query_round_trips() {
        let codec = codec();
        let target = normalize(&format!("http://example.com/s?q={}", "x".repeat(2000))).unwrap();
        let key = codec.to_path(&target).unwrap();
        assert!(key.len() <= 1024);
        assert_eq!(codec.from_path(&key).unwrap(), target);
    }

    #[test]
    fn test_unresolvable_fold_is_ambiguous() {
        let target = normalize(&format!("http://example.com/{}", "b".repeat(300))).unwrap();
        let key = codec().to_path(&target).unwrap();

        // A fresh codec has never seen the fold.
        assert!(matches!(
            codec().from_path(&key),
            Err(AppError::AmbiguousPath { .. })
        ));
    }

    #[test]
    fn test_encode_does_not_record_folds() {
        let codec = codec();
        let target = normalize(&format!("http://example.com/{}", "c".repeat(300))).unwrap();
        codec.encode(&target).unwrap();
        assert!(codec.index().is_empty());
        codec.to_path(&target).unwrap();
        assert_eq!(codec.index().len(), 1);
    }

    #[test]
    fn test_fold_collision_is_refused() {
        let codec = codec();
        let target = normalize(&format!("http://example.com/{}", "d".repeat(300))).unwrap();
        let encoded = codec.encode(&target).unwrap();
        let token = encoded.folds[0].token.clone();
        codec
            .register(&[Fold {
                token,
                original: "something-else!".into(),
            }])
            .unwrap();

        assert!(matches!(
            codec.to_path(&target),
            Err(AppError::PathCollision { .. })
        ));
    }

    #[test]
    fn test_path_too_long_when_limits_are_tiny() {
        let config = StoreConfig {
            max_component_len: 64,
            max_path_len: 64,
            case_insensitive: false,
        };
        let codec = PathCodec::new(&config);
        let target = normalize("http://a.very.long.host.name.example.com/x").unwrap();
        let long = normalize(&format!(
            "http://{}.example.com/x",
            ["label"; 10].join(".")
        ))
        .unwrap();

        assert!(codec.to_path(&target).is_ok());
        assert!(matches!(
            codec.to_path(&long),
            Err(AppError::PathTooLong { .. })
        ));
    }

    #[test]
    fn test_from_path_rejects_foreign_keys() {
        let codec = codec();
        let bad = [
            "",
            "ftp/com/example/@default/!",
            "http/com/example/!",
            "http/com/example/@80/!",
            "http/com/example/@default/page",
            "http/com/example/@default/a!b!c",
            "http/com/example/@default/../!",
            "http/com/example/@default/a%7eb!",
            "http/com/example/@default//x!",
            "http/com/Example/@default/!",
            "http/com/example/@default/!a%20b",
        ];
        for key in bad {
            assert!(
                matches!(codec.from_path(key), Err(AppError::AmbiguousPath { .. })),
                "{key}"
            );
        }
    }

    #[test]
    fn test_decode_authority() {
        let root = decode_authority(&["https", "com", "site", "other", "@444"]).unwrap();
        assert_eq!(root.to_url(), "https://other.site.com:444/");
        assert!(decode_authority(&["http", "com", "example", "@80"]).is_err());
        assert!(decode_authority(&["http", "@default"]).is_err());
    }

    #[test]
    fn test_fold_prefix_keeps_escapes_whole() {
        assert_eq!(fold_prefix("abcdefghijklmn%20xyz"), "abcdefghijklmn");
        assert_eq!(fold_prefix("abcdefghijklm%20xyz"), "abcdefghijklm%20");
        assert_eq!(fold_prefix("short"), "short");
    }
}
