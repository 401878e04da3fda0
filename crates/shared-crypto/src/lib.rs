//! # Shared Crypto - Consensus Cryptography Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `bls` | BLS12-381 (`min_pk`) | Committee multisignatures |
//! | `hashing` | SHA-256 | Content hashes, delta binding |
//!
//! ## Security Properties
//!
//! - **BLS12-381**: aggregation of public keys and signatures over the same
//!   message; Ethereum 2.0 domain separation tag.
//! - **SHA-256**: all content addressing in the protocol is SHA-256; block
//!   and delta hashes are interoperable across subsystems.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bls;
pub mod errors;
pub mod hashing;

// Re-exports
pub use bls::{
    aggregate_public_keys, aggregate_signatures, multi_sig_verify, BlsKeyPair, BlsPublicKey,
    BlsSignature, BLS_PUBLIC_KEY_BYTES, BLS_SIGNATURE_BYTES,
};
pub use errors::CryptoError;
pub use hashing::{sha256, Sha256Hasher};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
