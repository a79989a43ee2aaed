// src/selftest.rs

//! Built-in self-check of the codecs, run by the `test` command.
//!
//! Exercises normalization, key and label round-trips against fixed cases
//! so a deployment can verify its build without network access.

use crate::codec::{PathCodec, from_label, normalize, to_label};
use crate::error::{AppError, Result};
use crate::models::StoreConfig;

const SUFFIX: &str = "my.archive.com";

/// (url, expected key, expected label)
const CASES: [(&str, &str, &str); 4] = [
    (
        "http://example.com/",
        "http/com/example/@default/!",
        "http.example.com.my.archive.com",
    ),
    (
        "http://example.com/index.html",
        "http/com/example/@default/index.html!",
        "http.example.com.my.archive.com",
    ),
    (
        "https://other.site.com:444/a/?x=1",
        "https/com/site/other/@444/a/!x=1",
        "https.other.site.com.444.my.archive.com",
    ),
    (
        "http://example.com/page/",
        "http/com/example/@default/page/!",
        "http.example.com.my.archive.com",
    ),
];

/// Run every check. Returns the number of checks passed.
pub fn run() -> Result<usize> {
    let codec = PathCodec::new(&StoreConfig::default());
    let mut passed = 0;
    let mut failures = Vec::new();

    let mut check = |name: String, outcome: Result<bool>| match outcome {
        Ok(true) => {
            log::info!("ok   {name}");
            passed += 1;
        }
        Ok(false) => {
            log::error!("FAIL {name}");
            failures.push(name);
        }
        Err(e) => {
            log::error!("FAIL {name}: {e}");
            failures.push(name);
        }
    };

    for (url, key, label) in CASES {
        check(format!("key of {url}"), (|| -> Result<bool> {
            let target = normalize(url)?;
            Ok(codec.to_path(&target)? == key && codec.from_path(key)? == target)
        })());
        check(format!("label of {url}"), (|| -> Result<bool> {
            let target = normalize(url)?;
            let root = from_label(label, SUFFIX)?;
            Ok(to_label(&target, SUFFIX) == label && root.same_authority(&target))
        })());
        check(format!("idempotence of {url}"), (|| -> Result<bool> {
            let once = normalize(url)?;
            Ok(normalize(&once.to_url())? == once)
        })());
    }

    check("trailing slash and case are distinct".into(), (|| -> Result<bool> {
        let a = codec.to_path(&normalize("http://example.com/page")?)?;
        let b = codec.to_path(&normalize("http://example.com/page/")?)?;
        let c = codec.to_path(&normalize("http://example.com/Page")?)?;
        Ok(a != b && a != c && b != c)
    })());

    check("long paths fold and round-trip".into(), (|| -> Result<bool> {
        let long = format!("http://example.com/{}?q={}", "d/".repeat(600), "v".repeat(600));
        let target = normalize(&long)?;
        let key = codec.to_path(&target)?;
        Ok(key.len() <= StoreConfig::default().max_path_len && codec.from_path(&key)? == target)
    })());

    check("numeric-only label is ambiguous".into(), (|| -> Result<bool> {
        Ok(matches!(
            from_label("http.8080.my.archive.com", SUFFIX),
            Err(AppError::AmbiguousLabel(_))
        ))
    })());

    check("foreign host is not an archive label".into(), (|| -> Result<bool> {
        Ok(matches!(
            from_label("example.com", SUFFIX),
            Err(AppError::UnknownArchive { .. })
        ))
    })());

    if failures.is_empty() {
        Ok(passed)
    } else {
        Err(AppError::validation(format!(
            "{} self-test check(s) failed: {}",
            failures.len(),
            failures.join(", ")
        )))
    }
}
