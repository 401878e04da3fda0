//! Driving port: the API the message-dispatch layer and the epoch manager
//! call into.

use std::collections::HashMap;

use shared_crypto::BlsPublicKey;
use shared_types::{BlockHash, EpochNumber, ShardId};

use crate::domain::{IntakeResult, Microblock};

/// How a submission that was not rejected was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Validated and committed for the current epoch.
    Accepted,
    /// Stored until its epoch arrives or the submission window opens.
    Buffered,
    /// Repair batch processed and every known gap is now filled.
    GapClosed,
    /// This node runs in lookup mode; intake is disabled and the message was
    /// dropped without inspection.
    Disabled,
}

/// Protocol phase of the Directory Service state machine. Shard submissions
/// for the current epoch are only processed directly during
/// `MicroblockSubmission`; in any other phase they are buffered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DsPhase {
    /// Waiting for PoW solutions from candidate nodes.
    PowSubmission,
    /// Running DS-block consensus.
    DsBlockConsensus,
    /// Collecting shard microblocks for the current epoch.
    #[default]
    MicroblockSubmission,
    /// Running final-block consensus.
    FinalBlockConsensus,
    /// Running a view change.
    ViewChange,
}

/// Microblock intake and aggregation API.
pub trait MicroblockIntake: Send + Sync {
    /// Top-level entry point for a framed microblock-submission message.
    ///
    /// Decodes the message, checks the sender against the expected node set
    /// for its submission type, and routes to the shard or repair path.
    fn process_submission(&self, message: &[u8]) -> IntakeResult<SubmissionOutcome>;

    /// Drain hook, called by the epoch manager after the local epoch
    /// advances. Discards buffered submissions for past epochs and replays
    /// the current epoch's bucket through full validation. One epoch per
    /// call.
    fn commit_buffered_submissions(&self);

    /// Record block hashes reported missing for an epoch; the repair path
    /// only accepts microblocks listed here.
    fn record_missing(&self, epoch: EpochNumber, hashes: Vec<BlockHash>);

    /// Accepted microblocks for an epoch, in block-hash order.
    fn micro_blocks_at(&self, epoch: EpochNumber) -> Vec<Microblock>;

    /// The state delta accepted alongside a microblock, if any.
    fn state_delta_of(&self, epoch: EpochNumber, hash: &BlockHash) -> Option<Vec<u8>>;

    /// The cumulative delta snapshot handed to final-block consensus.
    fn aggregated_state_delta(&self) -> Vec<u8>;

    /// Move the DS state machine to a new phase.
    fn set_phase(&self, phase: DsPhase);

    /// Reopen the submission window after an epoch transition.
    fn resume_submissions(&self);

    /// Drop every per-epoch table for `epoch`; called after final-block
    /// consensus concludes.
    fn purge_epoch(&self, epoch: EpochNumber);

    /// Install the miner-key to shard-id authority map for the current DS
    /// block.
    fn set_shard_assignments(&self, assignments: HashMap<BlsPublicKey, ShardId>);
}
