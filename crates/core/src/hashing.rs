//! Content checksums for bitstreams.
//!
//! Checksums are what the correction merge uses to recognise the same file
//! on both sides, so the algorithm label is stored next to the digest.

use sha2::{Digest, Sha256};

/// Algorithm label stored alongside every digest produced here.
pub const CHECKSUM_ALGORITHM: &str = "SHA-256";

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn different_content_produces_different_digests() {
        assert_ne!(sha256_hex(b"chapter one"), sha256_hex(b"chapter two"));
        assert_eq!(sha256_hex(b"chapter one").len(), 64);
    }
}
