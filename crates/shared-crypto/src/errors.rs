//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Public key bytes do not decode to a curve point
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Signature bytes do not decode to a curve point
    #[error("Invalid signature")]
    InvalidSignature,

    /// Secret key bytes are out of range
    #[error("Invalid secret key")]
    InvalidSecretKey,

    /// Aggregation over an empty input set
    #[error("Nothing to aggregate")]
    EmptyAggregation,

    /// Curve-level aggregation failed
    #[error("BLS aggregation failed")]
    AggregationFailed,

    /// Key generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),
}
