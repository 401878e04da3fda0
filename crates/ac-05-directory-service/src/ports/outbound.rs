//! Driven ports: the collaborators this subsystem requires the host to
//! provide. All calls are synchronous and bounded; the intake hot path holds
//! its locks across them by design, so implementations must not block
//! indefinitely.

use shared_crypto::BlsPublicKey;
use shared_types::{BlockHash, DsBlockNumber, EpochNumber, ShardId};

use crate::domain::{Committee, Microblock, MicroblockSubmission, SignerBitmap};

/// Failure of a wire encode/decode.
#[derive(Debug, thiserror::Error)]
#[error("Codec error: {message}")]
pub struct CodecError {
    /// Human-readable cause.
    pub message: String,
}

/// Failure inside a persistence or ledger collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Wire codec for submission messages and microblock bodies.
///
/// Round-trip stability is load-bearing: a persisted body must decode back
/// to the exact microblock that was accepted.
pub trait SubmissionCodec: Send + Sync {
    /// Decode a framed submission message.
    fn decode_submission(&self, bytes: &[u8]) -> Result<MicroblockSubmission, CodecError>;

    /// Encode a submission message (used by senders and tests).
    fn encode_submission(&self, submission: &MicroblockSubmission) -> Result<Vec<u8>, CodecError>;

    /// Encode a microblock body for persistence.
    fn encode_microblock(&self, micro_block: &Microblock) -> Result<Vec<u8>, CodecError>;

    /// Decode a persisted microblock body.
    fn decode_microblock(&self, bytes: &[u8]) -> Result<Microblock, CodecError>;
}

/// Persistent block store.
pub trait BlockStore: Send + Sync {
    /// Store a serialized microblock under its block hash, with a secondary
    /// `(epoch, shard)` index.
    fn put_microblock(
        &self,
        block_hash: &BlockHash,
        epoch: EpochNumber,
        shard_id: ShardId,
        body: &[u8],
    ) -> Result<(), StoreError>;
}

/// Account-state store with a temporary overlay for in-flight epochs.
pub trait AccountStore: Send + Sync {
    /// Apply a delta blob to the temporary overlay.
    fn deserialize_delta_temp(&self, delta: &[u8]) -> Result<(), StoreError>;

    /// Re-serialize the combined overlay after an apply.
    fn serialize_delta(&self) -> Result<(), StoreError>;

    /// The serialized combined overlay produced by the last
    /// `serialize_delta`.
    fn serialized_delta(&self) -> Vec<u8>;
}

/// Ledger of signer participation, consumed by block-reward distribution.
pub trait CoinbaseLedger: Send + Sync {
    /// Record both commit-round bitmaps for a shard at an epoch.
    fn save_coinbase(
        &self,
        b1: &SignerBitmap,
        b2: &SignerBitmap,
        shard_id: ShardId,
        epoch: EpochNumber,
    ) -> Result<(), StoreError>;
}

/// Read-only view of chain position and membership, owned by the mediator.
pub trait ChainView: Send + Sync {
    /// The epoch this node is currently collecting microblocks for.
    fn current_epoch(&self) -> EpochNumber;

    /// Whether `(ds_block_num, epoch)` is the locally-expected next block.
    fn is_latest_block(&self, ds_block_num: DsBlockNumber, epoch: EpochNumber) -> bool;

    /// Whether an epoch processes no transactions (state deltas skipped).
    fn is_vacuous_epoch(&self, epoch: EpochNumber) -> bool;

    /// Number of transaction shards this DS block.
    fn num_shards(&self) -> usize;

    /// The DS committee, in seat order.
    fn ds_committee(&self) -> Committee;

    /// A shard committee, in seat order.
    fn shard_committee(&self, shard: ShardId) -> Option<Committee>;

    /// This node's own shard id in the wire convention, if it produces
    /// microblocks (the DS sentinel for DS nodes).
    fn my_shard_id(&self) -> Option<ShardId>;

    /// Whether a key belongs to any current shard committee.
    fn is_shard_node(&self, key: &BlsPublicKey) -> bool;

    /// Whether a key belongs to the DS committee.
    fn is_ds_node(&self, key: &BlsPublicKey) -> bool;
}

/// Wall-clock source, injectable for tests.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// System-clock time source.
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Edge-triggered notifications out of the intake core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsensusEvent {
    /// Every shard reported for the epoch; final-block consensus can start.
    ConsensusReady(EpochNumber),
    /// A repair batch closed the last known gap for the epoch.
    MissingGapClosed(EpochNumber),
}

/// Sink for intake events; the production adapter is the consensus driver's
/// inbox. Delivery must not block.
pub trait ConsensusNotifier: Send + Sync {
    /// Deliver one event.
    fn notify(&self, event: ConsensusEvent);
}
