//! In-memory adapters.
//!
//! Back the outbound ports with process-local tables: unit and scenario
//! tests run against these, and single-process hosts can use them directly.
//! Production swaps in the persistent implementations from the node runtime.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use shared_crypto::BlsPublicKey;
use shared_types::{BlockHash, DsBlockNumber, EpochNumber, ShardId};

use crate::domain::{Committee, SignerBitmap};
use crate::ports::outbound::{
    AccountStore, BlockStore, ChainView, CoinbaseLedger, ConsensusEvent, ConsensusNotifier,
    StoreError, TimeSource,
};

// =============================================================================
// BLOCK STORE
// =============================================================================

/// In-memory block store with the same key shape as the persistent one:
/// bodies by block hash, a secondary `(epoch, shard)` index.
#[derive(Default)]
pub struct InMemoryBlockStore {
    bodies: Mutex<HashMap<BlockHash, Vec<u8>>>,
    index: Mutex<BTreeMap<(EpochNumber, ShardId), BlockHash>>,
    fail_writes: AtomicBool,
}

impl InMemoryBlockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (storage-fault injection).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Stored body for a block hash.
    pub fn get(&self, hash: &BlockHash) -> Option<Vec<u8>> {
        self.bodies.lock().get(hash).cloned()
    }

    /// Stored block hash for an `(epoch, shard)` pair.
    pub fn by_epoch_shard(&self, epoch: EpochNumber, shard_id: ShardId) -> Option<BlockHash> {
        self.index.lock().get(&(epoch, shard_id)).copied()
    }

    /// Number of stored bodies.
    pub fn len(&self) -> usize {
        self.bodies.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.bodies.lock().is_empty()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn put_microblock(
        &self,
        block_hash: &BlockHash,
        epoch: EpochNumber,
        shard_id: ShardId,
        body: &[u8],
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError("injected write failure".into()));
        }
        self.bodies.lock().insert(*block_hash, body.to_vec());
        self.index.lock().insert((epoch, shard_id), *block_hash);
        Ok(())
    }
}

// =============================================================================
// ACCOUNT STORE
// =============================================================================

/// In-memory account store: the temporary overlay is the concatenation of
/// applied deltas, the serialized form is a copy taken at `serialize_delta`.
#[derive(Default)]
pub struct InMemoryAccountStore {
    overlay: Mutex<Vec<u8>>,
    serialized: Mutex<Vec<u8>>,
    fail_next: AtomicBool,
}

impl InMemoryAccountStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next overlay apply fail (state-fault injection).
    pub fn set_fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    /// Current overlay contents.
    pub fn overlay(&self) -> Vec<u8> {
        self.overlay.lock().clone()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn deserialize_delta_temp(&self, delta: &[u8]) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError("injected apply failure".into()));
        }
        self.overlay.lock().extend_from_slice(delta);
        Ok(())
    }

    fn serialize_delta(&self) -> Result<(), StoreError> {
        *self.serialized.lock() = self.overlay.lock().clone();
        Ok(())
    }

    fn serialized_delta(&self) -> Vec<u8> {
        self.serialized.lock().clone()
    }
}

// =============================================================================
// COINBASE LEDGER
// =============================================================================

/// One coinbase crediting record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoinbaseRecord {
    /// Round-1 signer bitmap.
    pub b1: SignerBitmap,
    /// Round-2 signer bitmap.
    pub b2: SignerBitmap,
    /// Credited shard.
    pub shard_id: ShardId,
    /// Epoch the participation counts toward.
    pub epoch: EpochNumber,
}

/// In-memory coinbase ledger that records every crediting call.
#[derive(Default)]
pub struct InMemoryCoinbaseLedger {
    records: Mutex<Vec<CoinbaseRecord>>,
    fail_writes: AtomicBool,
}

impl InMemoryCoinbaseLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent crediting call fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// All crediting records so far.
    pub fn records(&self) -> Vec<CoinbaseRecord> {
        self.records.lock().clone()
    }
}

impl CoinbaseLedger for InMemoryCoinbaseLedger {
    fn save_coinbase(
        &self,
        b1: &SignerBitmap,
        b2: &SignerBitmap,
        shard_id: ShardId,
        epoch: EpochNumber,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError("injected coinbase failure".into()));
        }
        self.records.lock().push(CoinbaseRecord {
            b1: b1.clone(),
            b2: b2.clone(),
            shard_id,
            epoch,
        });
        Ok(())
    }
}

// =============================================================================
// NOTIFIER, TIME, CHAIN VIEW
// =============================================================================

/// Notifier that pushes events into the consensus driver's inbox. The send
/// never blocks; a dropped receiver means the driver is gone and the event
/// is discarded.
pub struct ChannelConsensusNotifier {
    tx: tokio::sync::mpsc::UnboundedSender<ConsensusEvent>,
}

impl ChannelConsensusNotifier {
    /// Wrap an existing inbox sender.
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<ConsensusEvent>) -> Self {
        Self { tx }
    }

    /// Create a notifier together with its receiving end.
    pub fn channel() -> (Self, tokio::sync::mpsc::UnboundedReceiver<ConsensusEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ConsensusNotifier for ChannelConsensusNotifier {
    fn notify(&self, event: ConsensusEvent) {
        let _ = self.tx.send(event);
    }
}

/// Manually driven clock.
#[derive(Default)]
pub struct ManualTimeSource {
    now_ms: AtomicU64,
}

impl ManualTimeSource {
    /// Clock starting at `now_ms`.
    pub fn at(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    /// Jump the clock.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Advance the clock.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Chain view over fixed committees with settable position, standing in for
/// the mediator.
#[derive(Default)]
pub struct StaticChainView {
    current_epoch: AtomicU64,
    next_ds_block: AtomicU64,
    vacuous: AtomicBool,
    ds_committee: RwLock<Committee>,
    shards: RwLock<Vec<Committee>>,
    my_shard_id: RwLock<Option<ShardId>>,
}

impl StaticChainView {
    /// Empty view at epoch 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current epoch.
    pub fn set_current_epoch(&self, epoch: EpochNumber) {
        self.current_epoch.store(epoch, Ordering::SeqCst);
    }

    /// Set the DS block number a fresh microblock must reference (its
    /// header's `ds_block_num + 1`).
    pub fn set_next_ds_block(&self, ds_block_num: DsBlockNumber) {
        self.next_ds_block.store(ds_block_num, Ordering::SeqCst);
    }

    /// Mark the current epoch vacuous.
    pub fn set_vacuous(&self, vacuous: bool) {
        self.vacuous.store(vacuous, Ordering::SeqCst);
    }

    /// Install the DS committee.
    pub fn set_ds_committee(&self, committee: Committee) {
        *self.ds_committee.write() = committee;
    }

    /// Install the shard committees.
    pub fn set_shards(&self, shards: Vec<Committee>) {
        *self.shards.write() = shards;
    }

    /// Set this node's own wire shard id.
    pub fn set_my_shard_id(&self, shard_id: Option<ShardId>) {
        *self.my_shard_id.write() = shard_id;
    }
}

impl ChainView for StaticChainView {
    fn current_epoch(&self) -> EpochNumber {
        self.current_epoch.load(Ordering::SeqCst)
    }

    fn is_latest_block(&self, ds_block_num: DsBlockNumber, epoch: EpochNumber) -> bool {
        ds_block_num == self.next_ds_block.load(Ordering::SeqCst)
            && epoch == self.current_epoch()
    }

    fn is_vacuous_epoch(&self, _epoch: EpochNumber) -> bool {
        self.vacuous.load(Ordering::SeqCst)
    }

    fn num_shards(&self) -> usize {
        self.shards.read().len()
    }

    fn ds_committee(&self) -> Committee {
        self.ds_committee.read().clone()
    }

    fn shard_committee(&self, shard: ShardId) -> Option<Committee> {
        self.shards.read().get(shard as usize).cloned()
    }

    fn my_shard_id(&self) -> Option<ShardId> {
        *self.my_shard_id.read()
    }

    fn is_shard_node(&self, key: &BlsPublicKey) -> bool {
        self.shards
            .read()
            .iter()
            .flatten()
            .any(|member| member.pub_key == *key)
    }

    fn is_ds_node(&self, key: &BlsPublicKey) -> bool {
        self.ds_committee
            .read()
            .iter()
            .any(|member| member.pub_key == *key)
    }
}
