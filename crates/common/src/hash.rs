//! Hashing for manifest integrity checks and package store keys.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex-encoded SHA-256 of a UTF-8 string.
pub fn sha256_str(s: &str) -> String {
    sha256_bytes(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_str("hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a7380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_manifest_digest() {
        let digest = sha256_str("<Package/>");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, sha256_bytes(b"<Package/>"));
        assert_ne!(digest, sha256_str("<Package></Package>"));
    }
}
