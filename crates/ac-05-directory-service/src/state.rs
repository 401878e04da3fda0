//! # Intake State Registry
//!
//! One owner for every mutable table of the intake core, replacing the
//! scattered process-wide maps of older designs with an explicit registry and
//! a fixed lock discipline.
//!
//! ## Lock discipline
//!
//! - `ledger` guards accepted microblocks, their indexed deltas, the
//!   cumulative delta snapshot, and the submission gate. It is held across
//!   persistence and delta application for a single submission, and never
//!   across a notification.
//! - `buffer` guards future-epoch submissions. Disjoint from `ledger`; when
//!   both are needed the buffer bucket is spliced out first and each entry is
//!   then validated as if freshly arrived.
//! - `missing` and `shard_assignments` are leaf locks: read on the hot path,
//!   written by the repair-request path and the epoch manager, never held
//!   while acquiring another lock.
//!
//! If `buffer` and `ledger` ever had to nest, `buffer` comes first.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::{Mutex, RwLock};
use shared_crypto::BlsPublicKey;
use shared_types::{BlockHash, EpochNumber, ShardId};

use crate::domain::Microblock;
use crate::ports::DsPhase;

/// Tables guarded by the ledger lock.
pub(crate) struct MicroblockLedger {
    /// Accepted microblocks per epoch, keyed by block hash.
    pub micro_blocks: HashMap<EpochNumber, BTreeMap<BlockHash, Microblock>>,
    /// Accepted state deltas per epoch, indexed for retrieval.
    pub state_deltas: HashMap<EpochNumber, BTreeMap<BlockHash, Vec<u8>>>,
    /// Serialized combined overlay, refreshed after every successful delta
    /// apply; final-block consensus reads the latest snapshot.
    pub state_delta_from_shards: Vec<u8>,
    /// Latched when the current epoch completes; further shard submissions
    /// are rejected until the epoch manager reopens the window.
    pub stop_new_submissions: bool,
}

impl MicroblockLedger {
    fn new() -> Self {
        Self {
            micro_blocks: HashMap::new(),
            state_deltas: HashMap::new(),
            state_delta_from_shards: Vec::new(),
            stop_new_submissions: false,
        }
    }

    /// Whether an accepted microblock for `(epoch, shard_id)` exists.
    pub fn has_shard(&self, epoch: EpochNumber, shard_id: ShardId) -> bool {
        self.micro_blocks
            .get(&epoch)
            .is_some_and(|bucket| bucket.values().any(|mb| mb.header.shard_id == shard_id))
    }

    /// Whether a block hash was already accepted for `epoch`.
    pub fn contains(&self, epoch: EpochNumber, hash: &BlockHash) -> bool {
        self.micro_blocks
            .get(&epoch)
            .is_some_and(|bucket| bucket.contains_key(hash))
    }
}

/// The registry. Per-epoch buckets are created lazily on first write and
/// destroyed by `purge_epoch` once final-block consensus concludes.
pub struct IntakeState {
    pub(crate) ledger: Mutex<MicroblockLedger>,
    pub(crate) buffer: Mutex<BTreeMap<EpochNumber, Vec<(Microblock, Vec<u8>)>>>,
    missing: RwLock<HashMap<EpochNumber, BTreeSet<BlockHash>>>,
    shard_assignments: RwLock<HashMap<BlsPublicKey, ShardId>>,
    phase: RwLock<DsPhase>,
}

impl IntakeState {
    /// Fresh registry in the `MicroblockSubmission` phase.
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(MicroblockLedger::new()),
            buffer: Mutex::new(BTreeMap::new()),
            missing: RwLock::new(HashMap::new()),
            shard_assignments: RwLock::new(HashMap::new()),
            phase: RwLock::new(DsPhase::default()),
        }
    }

    /// Current DS protocol phase.
    pub fn phase(&self) -> DsPhase {
        *self.phase.read()
    }

    /// Move the DS state machine to a new phase.
    pub fn set_phase(&self, phase: DsPhase) {
        *self.phase.write() = phase;
    }

    /// Reopen the submission window after an epoch transition.
    pub fn resume_submissions(&self) {
        self.ledger.lock().stop_new_submissions = false;
    }

    /// Replace the miner-key authority map.
    pub fn set_shard_assignments(&self, assignments: HashMap<BlsPublicKey, ShardId>) {
        *self.shard_assignments.write() = assignments;
    }

    /// Shard a miner key is assigned to, if any.
    pub fn shard_of(&self, key: &BlsPublicKey) -> Option<ShardId> {
        self.shard_assignments.read().get(key).copied()
    }

    /// Record block hashes reported missing for an epoch.
    pub fn record_missing(&self, epoch: EpochNumber, hashes: Vec<BlockHash>) {
        self.missing.write().entry(epoch).or_default().extend(hashes);
    }

    /// Whether a hash is on the missing list for an epoch.
    pub fn is_missing(&self, epoch: EpochNumber, hash: &BlockHash) -> bool {
        self.missing
            .read()
            .get(&epoch)
            .is_some_and(|set| set.contains(hash))
    }

    /// Missing hashes for an epoch that have not been accepted yet.
    pub fn unfilled_gaps(&self, epoch: EpochNumber) -> Vec<BlockHash> {
        let wanted: Vec<BlockHash> = self
            .missing
            .read()
            .get(&epoch)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        let ledger = self.ledger.lock();
        wanted
            .into_iter()
            .filter(|hash| !ledger.contains(epoch, hash))
            .collect()
    }

    /// Accepted microblocks for an epoch, in block-hash order.
    pub fn micro_blocks_at(&self, epoch: EpochNumber) -> Vec<Microblock> {
        self.ledger
            .lock()
            .micro_blocks
            .get(&epoch)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    /// The delta accepted alongside a microblock, if any.
    pub fn state_delta_of(&self, epoch: EpochNumber, hash: &BlockHash) -> Option<Vec<u8>> {
        self.ledger
            .lock()
            .state_deltas
            .get(&epoch)
            .and_then(|bucket| bucket.get(hash).cloned())
    }

    /// The cumulative delta snapshot.
    pub fn aggregated_state_delta(&self) -> Vec<u8> {
        self.ledger.lock().state_delta_from_shards.clone()
    }

    /// Drop every per-epoch table for `epoch`.
    pub fn purge_epoch(&self, epoch: EpochNumber) {
        {
            let mut ledger = self.ledger.lock();
            ledger.micro_blocks.remove(&epoch);
            ledger.state_deltas.remove(&epoch);
        }
        self.buffer.lock().remove(&epoch);
        self.missing.write().remove(&epoch);
    }
}

impl Default for IntakeState {
    fn default() -> Self {
        Self::new()
    }
}
