//! # BLS12-381 Multisignatures
//!
//! Committee co-signing primitives: key generation, signing, aggregation of
//! public keys and signatures, and verification of an aggregated signature
//! against an aggregated key.
//!
//! Uses blst's `min_pk` variant: 48-byte compressed public keys on G1,
//! 96-byte compressed signatures on G2. Aggregation is only sound when every
//! signer signed the same message, which is exactly the committee co-signing
//! case.

use blst::min_pk::{AggregatePublicKey, AggregateSignature, PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use std::fmt;

use crate::CryptoError;

/// Domain separation tag for BLS signatures (Ethereum 2.0 compatible)
const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Compressed public key length in bytes.
pub const BLS_PUBLIC_KEY_BYTES: usize = 48;

/// Compressed signature length in bytes.
pub const BLS_SIGNATURE_BYTES: usize = 96;

/// Abbreviated hex rendering for logs; full keys are 96-192 hex chars.
fn fmt_short_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in &bytes[..6] {
        write!(f, "{byte:02x}")?;
    }
    write!(f, "..")
}

/// BLS public key (48 bytes compressed, G1).
///
/// Stored as raw bytes so it can serve as a map key and travel through the
/// wire codec; curve validation happens on use.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlsPublicKey {
    #[serde_as(as = "Bytes")]
    bytes: [u8; BLS_PUBLIC_KEY_BYTES],
}

impl BlsPublicKey {
    /// Wrap raw compressed bytes.
    pub fn from_bytes(bytes: [u8; BLS_PUBLIC_KEY_BYTES]) -> Self {
        Self { bytes }
    }

    /// Raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; BLS_PUBLIC_KEY_BYTES] {
        &self.bytes
    }

    fn parse(&self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_bytes(&self.bytes).map_err(|_| CryptoError::InvalidPublicKey)
    }
}

impl fmt::Debug for BlsPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_short_hex(f, &self.bytes)
    }
}

impl fmt::Display for BlsPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_short_hex(f, &self.bytes)
    }
}

/// BLS signature (96 bytes compressed, G2); plain or aggregated.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlsSignature {
    #[serde_as(as = "Bytes")]
    bytes: [u8; BLS_SIGNATURE_BYTES],
}

impl BlsSignature {
    /// Wrap raw compressed bytes.
    pub fn from_bytes(bytes: [u8; BLS_SIGNATURE_BYTES]) -> Self {
        Self { bytes }
    }

    /// Raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; BLS_SIGNATURE_BYTES] {
        &self.bytes
    }

    fn parse(&self) -> Result<Signature, CryptoError> {
        Signature::from_bytes(&self.bytes).map_err(|_| CryptoError::InvalidSignature)
    }
}

impl fmt::Debug for BlsSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_short_hex(f, &self.bytes)
    }
}

/// BLS key pair for signing.
pub struct BlsKeyPair {
    secret: SecretKey,
    public: BlsPublicKey,
}

impl BlsKeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut ikm = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut ikm);
        Self::from_seed(&ikm)
    }

    /// Derive a key pair deterministically from 32 bytes of input key
    /// material.
    pub fn from_seed(ikm: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::key_gen(ikm, &[])
            .map_err(|e| CryptoError::KeyGenerationFailed(format!("{e:?}")))?;
        let public = BlsPublicKey::from_bytes(secret.sk_to_pk().to_bytes());
        Ok(Self { secret, public })
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> BlsSignature {
        BlsSignature::from_bytes(self.secret.sign(message, DST, &[]).to_bytes())
    }

    /// The public half.
    pub fn public_key(&self) -> BlsPublicKey {
        self.public
    }
}

/// Aggregate public keys into a single key.
///
/// # Errors
/// * `EmptyAggregation` for an empty input slice
/// * `InvalidPublicKey` if any key fails to decode
/// * `AggregationFailed` on curve-level failure
pub fn aggregate_public_keys(keys: &[BlsPublicKey]) -> Result<BlsPublicKey, CryptoError> {
    if keys.is_empty() {
        return Err(CryptoError::EmptyAggregation);
    }

    let parsed: Result<Vec<PublicKey>, CryptoError> = keys.iter().map(|k| k.parse()).collect();
    let parsed = parsed?;
    let refs: Vec<&PublicKey> = parsed.iter().collect();

    let aggregate = AggregatePublicKey::aggregate(&refs, true)
        .map_err(|_| CryptoError::AggregationFailed)?;

    Ok(BlsPublicKey::from_bytes(
        aggregate.to_public_key().to_bytes(),
    ))
}

/// Aggregate signatures over the same message into a single signature.
///
/// # Errors
/// * `EmptyAggregation` for an empty input slice
/// * `InvalidSignature` if any signature fails to decode
/// * `AggregationFailed` on curve-level failure
pub fn aggregate_signatures(signatures: &[BlsSignature]) -> Result<BlsSignature, CryptoError> {
    if signatures.is_empty() {
        return Err(CryptoError::EmptyAggregation);
    }

    let parsed: Result<Vec<Signature>, CryptoError> =
        signatures.iter().map(|s| s.parse()).collect();
    let parsed = parsed?;
    let refs: Vec<&Signature> = parsed.iter().collect();

    let aggregate = AggregateSignature::aggregate(&refs, true)
        .map_err(|_| CryptoError::AggregationFailed)?;

    Ok(BlsSignature::from_bytes(aggregate.to_signature().to_bytes()))
}

/// Verify an aggregated signature over `message` under an aggregated key.
///
/// Undecodable inputs verify as `false`.
pub fn multi_sig_verify(
    message: &[u8],
    signature: &BlsSignature,
    aggregated_key: &BlsPublicKey,
) -> bool {
    let Ok(sig) = signature.parse() else {
        return false;
    };
    let Ok(key) = aggregated_key.parse() else {
        return false;
    };

    sig.verify(true, message, DST, &[], &key, true) == BLST_ERROR::BLST_SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(tag: u8) -> BlsKeyPair {
        BlsKeyPair::from_seed(&[tag; 32]).unwrap()
    }

    #[test]
    fn test_sign_and_verify_single() {
        let pair = keypair(1);
        let signature = pair.sign(b"round two commit");
        assert!(multi_sig_verify(
            b"round two commit",
            &signature,
            &pair.public_key()
        ));
    }

    #[test]
    fn test_verify_rejects_wrong_message() {
        let pair = keypair(2);
        let signature = pair.sign(b"message one");
        assert!(!multi_sig_verify(b"message two", &signature, &pair.public_key()));
    }

    #[test]
    fn test_multi_sig_round_trip() {
        let message = b"co-signed header";
        let pairs: Vec<BlsKeyPair> = (1u8..=5).map(keypair).collect();

        let signatures: Vec<BlsSignature> = pairs.iter().map(|p| p.sign(message)).collect();
        let keys: Vec<BlsPublicKey> = pairs.iter().map(|p| p.public_key()).collect();

        let aggregate_sig = aggregate_signatures(&signatures).unwrap();
        let aggregate_key = aggregate_public_keys(&keys).unwrap();

        assert!(multi_sig_verify(message, &aggregate_sig, &aggregate_key));
    }

    #[test]
    fn test_multi_sig_rejects_missing_signer() {
        let message = b"co-signed header";
        let pairs: Vec<BlsKeyPair> = (1u8..=5).map(keypair).collect();

        // Signature aggregated over four signers, key over five.
        let signatures: Vec<BlsSignature> =
            pairs.iter().take(4).map(|p| p.sign(message)).collect();
        let keys: Vec<BlsPublicKey> = pairs.iter().map(|p| p.public_key()).collect();

        let aggregate_sig = aggregate_signatures(&signatures).unwrap();
        let aggregate_key = aggregate_public_keys(&keys).unwrap();

        assert!(!multi_sig_verify(message, &aggregate_sig, &aggregate_key));
    }

    #[test]
    fn test_empty_aggregation_fails() {
        assert_eq!(
            aggregate_public_keys(&[]),
            Err(CryptoError::EmptyAggregation)
        );
        assert_eq!(aggregate_signatures(&[]), Err(CryptoError::EmptyAggregation));
    }

    #[test]
    fn test_garbage_key_fails_aggregation() {
        let garbage = BlsPublicKey::from_bytes([0xFFu8; BLS_PUBLIC_KEY_BYTES]);
        assert_eq!(
            aggregate_public_keys(&[garbage]),
            Err(CryptoError::InvalidPublicKey)
        );
    }

    #[test]
    fn test_deterministic_seed() {
        let a = keypair(7);
        let b = keypair(7);
        assert_eq!(a.public_key(), b.public_key());
    }
}
