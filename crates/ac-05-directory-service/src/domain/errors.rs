//! Error types for the microblock intake core.
//!
//! Every rejection the original protocol reported as a boolean failure is a
//! distinct variant here, so callers and tests can tell a stale submission
//! from a forged one.

use shared_crypto::{BlsPublicKey, CryptoError};
use shared_types::{BlockHash, CommitteeHash, EpochNumber, ShardId, StateHash};

/// Microblock intake error kinds.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    // --- malformed input -----------------------------------------------------
    #[error("Malformed submission message: {0}")]
    MalformedMessage(String),

    #[error("Submission carried no microblocks or no state deltas")]
    EmptySubmission,

    #[error("Repair batch size mismatch: {microblocks} microblocks, {state_deltas} state deltas")]
    LengthMismatch {
        microblocks: usize,
        state_deltas: usize,
    },

    #[error("Block hash mismatch: computed {computed}, received {received}")]
    BlockHashMismatch {
        computed: BlockHash,
        received: BlockHash,
    },

    #[error("Microblock version {got}, expected {expected}")]
    WrongVersion { got: u32, expected: u32 },

    #[error("Invalid shard id {shard_id} for {num_shards} shards")]
    InvalidShardId { shard_id: ShardId, num_shards: usize },

    // --- crypto --------------------------------------------------------------
    #[error("Co-sig bitmap covers {bitmap} seats, committee has {committee}")]
    CoSigBitmapMismatch { bitmap: usize, committee: usize },

    #[error("Co-sig carries {got} signers, consensus quorum is {required}")]
    NotEnoughSigners { got: usize, required: usize },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Aggregated co-signature did not verify")]
    CoSignatureInvalid,

    // --- authority -----------------------------------------------------------
    #[error("Sender {0} is not an expected node for this submission type")]
    UnauthorizedSender(BlsPublicKey),

    #[error("Miner key {0} has no shard assignment")]
    UnknownMiner(BlsPublicKey),

    #[error("Miner assigned to shard {assigned}, microblock claims shard {claimed}")]
    ShardMismatch { assigned: ShardId, claimed: ShardId },

    #[error("Committee hash mismatch: expected {expected}, received {received}")]
    CommitteeHashMismatch {
        expected: CommitteeHash,
        received: CommitteeHash,
    },

    // --- temporal ------------------------------------------------------------
    #[error("Stale submission for epoch {submitted}, current epoch is {current}")]
    StaleEpoch {
        submitted: EpochNumber,
        current: EpochNumber,
    },

    #[error("Microblock does not extend the latest block")]
    NotLatestBlock,

    #[error("Timestamp {timestamp_ms} outside the {window_ms} ms window around {now_ms}")]
    TimestampOutOfWindow {
        timestamp_ms: u64,
        now_ms: u64,
        window_ms: u64,
    },

    // --- duplicates & gating -------------------------------------------------
    #[error("Duplicate microblock received for shard {0}")]
    DuplicateShard(ShardId),

    #[error("Microblock consensus already started, submission window is closed")]
    SubmissionWindowClosed,

    // --- resources -----------------------------------------------------------
    #[error("Coinbase crediting failed for shard {0}")]
    CoinbaseFailed(ShardId),

    #[error("Failed to persist microblock {0}")]
    PersistFailed(BlockHash),

    #[error("Account store rejected the state delta: {0}")]
    AccountStoreFailed(String),

    // --- state delta ---------------------------------------------------------
    #[error("State delta empty but header declares hash {0}")]
    StateDeltaMissing(StateHash),

    #[error("State delta hash mismatch: computed {computed}, declared {declared}")]
    StateDeltaHashMismatch {
        computed: StateHash,
        declared: StateHash,
    },

    // --- repair --------------------------------------------------------------
    #[error("Missing microblocks remain for epoch {0} after repair")]
    MissingMicroblocksRemain(EpochNumber),
}

/// Result type for intake operations.
pub type IntakeResult<T> = Result<T, IntakeError>;
