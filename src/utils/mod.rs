//! Utility functions and helpers.

pub mod url;

use sha2::{Digest, Sha256};

pub use url::{is_numeric_label, split_host_header};

/// Hex SHA-256 of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex of the first `bytes` bytes of the SHA-256 of `data`.
pub fn short_hash(data: &[u8], bytes: usize) -> String {
    let digest = Sha256::digest(data);
    hex::encode(&digest[..bytes.min(digest.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abcd"),
            "88d4266fd4e6338d13b845fcf289579d209c897823b9217da3e161936f031589"
        );
    }

    #[test]
    fn test_short_hash_is_prefix() {
        let full = sha256_hex(b"abcd");
        assert_eq!(short_hash(b"abcd", 16), full[..32]);
        assert_eq!(short_hash(b"abcd", 64), full);
    }
}
