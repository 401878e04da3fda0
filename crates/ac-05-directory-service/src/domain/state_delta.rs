//! # State-Delta Policy
//!
//! Stateless hash-binding check for the delta blob attached to a microblock.
//! Application (account-store overlay, cumulative snapshot) lives in the
//! service layer; this module only decides accept / no-op / reject.

use shared_types::StateHash;

use super::errors::{IntakeError, IntakeResult};

/// What to do with an accepted delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaDisposition {
    /// Header declares no state change; nothing to apply.
    SkipEmpty,
    /// Delta is hash-bound to the header; apply it to the temporary overlay.
    Apply,
}

/// Decide the disposition of a state delta against the hash declared in the
/// microblock header.
///
/// | declared hash | delta bytes | result |
/// |---|---|---|
/// | zero | any | `SkipEmpty` |
/// | non-zero | empty | `StateDeltaMissing` |
/// | non-zero | non-empty | SHA-256 match → `Apply`, else `StateDeltaHashMismatch` |
///
/// A zero declared hash is an unconditional no-op even if bytes were
/// attached; stray bytes are ignored, not an error.
pub fn classify_state_delta(declared: &StateHash, delta: &[u8]) -> IntakeResult<DeltaDisposition> {
    if declared.is_zero() {
        return Ok(DeltaDisposition::SkipEmpty);
    }

    if delta.is_empty() {
        return Err(IntakeError::StateDeltaMissing(*declared));
    }

    let computed = StateHash::from(shared_crypto::sha256(delta));
    if computed != *declared {
        return Err(IntakeError::StateDeltaHashMismatch {
            computed,
            declared: *declared,
        });
    }

    Ok(DeltaDisposition::Apply)
}
