//! # SHA-256 Hashing
//!
//! Content addressing for the protocol. Every hash that crosses a subsystem
//! boundary (block hashes, state-delta bindings, committee hashes) is SHA-256.

use sha2::{Digest, Sha256};
use shared_types::Hash;

/// Stateful SHA-256 hasher for multi-part inputs.
pub struct Sha256Hasher {
    inner: Sha256,
}

impl Sha256Hasher {
    /// Create new hasher.
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Update with data.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Hash {
        self.inner.finalize().into()
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("abc")
        let hash = sha256(b"abc");
        assert_eq!(
            hash[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "leading bytes of the FIPS 180-2 test vector"
        );
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = Sha256Hasher::new();
        hasher.update(b"hello ").update(b"world");
        assert_eq!(hasher.finalize(), sha256(b"hello world"));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(sha256(b"delta"), sha256(b"delta"));
        assert_ne!(sha256(b"delta"), sha256(b"delta2"));
    }
}
