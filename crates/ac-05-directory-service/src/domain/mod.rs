//! Pure domain logic: entities, errors, co-signature verification, and the
//! state-delta policy. Nothing in this module touches a port or a lock.

pub mod cosig;
pub mod entities;
pub mod errors;
pub mod state_delta;

pub use cosig::{co_signed_message, collect_signers, num_for_consensus, verify_co_signature};
pub use entities::{
    bitvector_bytes, committee_hash, Committee, CommitteeMember, CoSignatures, Microblock,
    MicroblockHeader, MicroblockSubmission, ShardRef, SignerBitmap, SubmitKind,
};
pub use errors::{IntakeError, IntakeResult};
pub use state_delta::{classify_state_delta, DeltaDisposition};
