//! # AC-05 Directory Service - Microblock Intake & Aggregation
//!
//! **Subsystem ID:** 5
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! The Directory Service committee collects one co-signed microblock per
//! shard per transaction epoch, validates each against cryptographic,
//! structural, and temporal rules, persists the resulting state transitions,
//! and signals final-block consensus once every shard has reported. A
//! separate repair path accepts microblocks fetched from DS peers to fill
//! gaps, skipping bad entries instead of aborting the batch.
//!
//! ## Module Structure
//!
//! ```text
//! ac-05-directory-service/
//! ├── domain/          # Microblock entities, co-sig verification, delta policy
//! ├── ports/           # Intake API trait + collaborator traits
//! ├── service/         # MicroblockIntakeService (the check pipelines)
//! ├── state            # IntakeState: per-epoch tables + gates
//! └── adapters/        # Bincode codec + in-memory collaborators
//! ```
//!
//! ## Paths and failure policy
//!
//! | Path | Trigger | Failure policy |
//! |------|---------|----------------|
//! | Shard | one microblock per shard, current epoch | any failed check rejects |
//! | Repair | batched gap fills from DS peers | skip item; abort batch only on freshness/storage |

#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;
pub mod state;

// Re-exports
pub use config::IntakeConfig;
pub use domain::{
    committee_hash, num_for_consensus, verify_co_signature, Committee, CommitteeMember,
    CoSignatures, IntakeError, IntakeResult, Microblock, MicroblockHeader, MicroblockSubmission,
    ShardRef, SignerBitmap, SubmitKind,
};
pub use ports::{
    ChainView, ConsensusEvent, ConsensusNotifier, DsPhase, MicroblockIntake, SubmissionOutcome,
};
pub use service::MicroblockIntakeService;
pub use state::IntakeState;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
