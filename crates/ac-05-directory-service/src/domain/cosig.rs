//! # Co-Signature Verification
//!
//! Checks that a microblock carries a valid two-round committee
//! multisignature: the round-2 bitmap selects signers from the producing
//! committee, the signer count hits the consensus quorum exactly, and the
//! aggregated round-2 signature verifies over
//! `header ‖ CS1 ‖ bitvector(B1)` under the aggregated signer key.

use bitvec::prelude::*;
use shared_crypto::{aggregate_public_keys, multi_sig_verify, BlsPublicKey};
use tracing::warn;

use super::entities::{bitvector_bytes, CommitteeMember, CoSignatures, Microblock, MicroblockHeader};
use super::errors::{IntakeError, IntakeResult};

/// Signers required for Byzantine agreement over a committee of
/// `committee_size` seats: `ceil(2n/3) + 1`.
///
/// This must stay in lockstep with the consensus engine's quorum rule; an
/// accepted co-signature carries exactly this many signers, never more.
pub fn num_for_consensus(committee_size: usize) -> usize {
    (2 * committee_size).div_ceil(3) + 1
}

/// Collect the public keys selected by `bitmap` from an ordered committee.
///
/// Fails if the bitmap length does not match the committee size; positions
/// would otherwise be meaningless.
pub fn collect_signers(
    committee: &[CommitteeMember],
    bitmap: &BitSlice<u8, Msb0>,
) -> IntakeResult<Vec<BlsPublicKey>> {
    if committee.len() != bitmap.len() {
        return Err(IntakeError::CoSigBitmapMismatch {
            bitmap: bitmap.len(),
            committee: committee.len(),
        });
    }

    Ok(committee
        .iter()
        .zip(bitmap.iter().by_vals())
        .filter_map(|(member, signed)| signed.then_some(member.pub_key))
        .collect())
}

/// The message sealed by CS2: canonical header bytes, then CS1, then the
/// wire encoding of B1.
pub fn co_signed_message(header: &MicroblockHeader, co_sigs: &CoSignatures) -> Vec<u8> {
    let mut message = header.signing_bytes();
    message.extend_from_slice(co_sigs.cs1.as_bytes());
    message.extend_from_slice(&bitvector_bytes(&co_sigs.b1));
    message
}

/// Verify a microblock's co-signature against its producing committee.
pub fn verify_co_signature(
    micro_block: &Microblock,
    committee: &[CommitteeMember],
) -> IntakeResult<()> {
    let signers = collect_signers(committee, &micro_block.co_sigs.b2)?;

    let required = num_for_consensus(micro_block.co_sigs.b2.len());
    if signers.len() != required {
        return Err(IntakeError::NotEnoughSigners {
            got: signers.len(),
            required,
        });
    }

    let aggregated_key = aggregate_public_keys(&signers)?;

    let message = co_signed_message(&micro_block.header, &micro_block.co_sigs);
    if !multi_sig_verify(&message, &micro_block.co_sigs.cs2, &aggregated_key) {
        warn!(
            block_hash = %micro_block.block_hash,
            ?signers,
            "co-signature verification failed"
        );
        return Err(IntakeError::CoSignatureInvalid);
    }

    Ok(())
}
