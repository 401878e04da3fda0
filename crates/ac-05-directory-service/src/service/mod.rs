//! # Microblock Intake Service
//!
//! Application service wiring the domain checks to the outbound
//! collaborators. One instance is shared by every inbound-message thread;
//! interior state lives in [`IntakeState`] behind its lock discipline.
//!
//! ## Paths
//!
//! - **Shard path** — `dispatch_shard_submission` routes by epoch, then
//!   `validate_and_commit` runs the full check pipeline. Any failure rejects
//!   the submission.
//! - **Repair path** — `process_missing_submission` walks a fetched batch
//!   item by item, skipping bad entries so one poisoned item cannot
//!   invalidate the rest; only freshness and storage failures abort the
//!   whole batch.

use std::collections::HashMap;
use std::sync::Arc;

use shared_crypto::BlsPublicKey;
use shared_types::{BlockHash, EpochNumber, ShardId};
use tracing::{debug, info, warn};

use crate::config::IntakeConfig;
use crate::domain::{
    classify_state_delta, committee_hash, verify_co_signature, Committee, DeltaDisposition,
    IntakeError, IntakeResult, Microblock, ShardRef, SubmitKind,
};
use crate::ports::inbound::{DsPhase, MicroblockIntake, SubmissionOutcome};
use crate::ports::outbound::{
    AccountStore, BlockStore, ChainView, CoinbaseLedger, ConsensusEvent, ConsensusNotifier,
    SubmissionCodec, TimeSource,
};
use crate::state::{IntakeState, MicroblockLedger};

/// The Directory Service microblock intake core.
///
/// Generic over its collaborators so hosts can wire persistent
/// implementations while tests use the in-memory adapters.
pub struct MicroblockIntakeService<C, B, A, L, V, T, N>
where
    C: SubmissionCodec,
    B: BlockStore,
    A: AccountStore,
    L: CoinbaseLedger,
    V: ChainView,
    T: TimeSource,
    N: ConsensusNotifier,
{
    config: IntakeConfig,
    state: IntakeState,
    codec: Arc<C>,
    block_store: Arc<B>,
    account_store: Arc<A>,
    coinbase: Arc<L>,
    chain: Arc<V>,
    time: Arc<T>,
    notifier: Arc<N>,
}

impl<C, B, A, L, V, T, N> MicroblockIntakeService<C, B, A, L, V, T, N>
where
    C: SubmissionCodec,
    B: BlockStore,
    A: AccountStore,
    L: CoinbaseLedger,
    V: ChainView,
    T: TimeSource,
    N: ConsensusNotifier,
{
    /// Create a service over the given collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: IntakeConfig,
        codec: Arc<C>,
        block_store: Arc<B>,
        account_store: Arc<A>,
        coinbase: Arc<L>,
        chain: Arc<V>,
        time: Arc<T>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            config,
            state: IntakeState::new(),
            codec,
            block_store,
            account_store,
            coinbase,
            chain,
            time,
            notifier,
        }
    }

    // =========================================================================
    // SHARD PATH
    // =========================================================================

    /// Route a shard submission by epoch: process now, buffer, or reject as
    /// stale.
    fn dispatch_shard_submission(
        &self,
        epoch: EpochNumber,
        micro_blocks: Vec<Microblock>,
        state_deltas: Vec<Vec<u8>>,
    ) -> IntakeResult<SubmissionOutcome> {
        // Only index 0 carries data today; the vectors exist for forward
        // compatibility with batched submissions.
        let Some(micro_block) = micro_blocks.into_iter().next() else {
            warn!("shard submission carried no microblocks");
            return Err(IntakeError::EmptySubmission);
        };
        let Some(state_delta) = state_deltas.into_iter().next() else {
            warn!("shard submission carried no state deltas");
            return Err(IntakeError::EmptySubmission);
        };

        let current = self.chain.current_epoch();
        if current < epoch {
            self.buffer_submission(epoch, micro_block, state_delta);
            return Ok(SubmissionOutcome::Buffered);
        }

        if current == epoch {
            if self.state.phase() == DsPhase::MicroblockSubmission {
                self.validate_and_commit(micro_block, state_delta)?;
                return Ok(SubmissionOutcome::Accepted);
            }
            // Submission window not open yet for this epoch; hold the
            // submission until the drain hook replays it.
            self.buffer_submission(epoch, micro_block, state_delta);
            return Ok(SubmissionOutcome::Buffered);
        }

        warn!(
            submitted = epoch,
            current, "microblock submission is too late"
        );
        Err(IntakeError::StaleEpoch {
            submitted: epoch,
            current,
        })
    }

    fn buffer_submission(&self, epoch: EpochNumber, micro_block: Microblock, delta: Vec<u8>) {
        debug!(epoch, shard_id = micro_block.shard_id(), "buffering microblock submission");
        self.state
            .buffer
            .lock()
            .entry(epoch)
            .or_default()
            .push((micro_block, delta));
    }

    /// The authoritative validation pipeline for a current-epoch shard
    /// submission. Cheap structural checks run before the co-signature; the
    /// submission gate is re-checked after crypto to close the race with a
    /// concurrent epoch completion.
    fn validate_and_commit(&self, micro_block: Microblock, state_delta: Vec<u8>) -> IntakeResult<()> {
        let current_epoch = self.chain.current_epoch();
        let shard_id = micro_block.shard_id();

        // Duplicate-shard gate: cheap, and the common adversarial case.
        {
            let ledger = self.state.ledger.lock();
            if ledger.has_shard(current_epoch, shard_id) {
                warn!(shard_id, "duplicate microblock received for shard");
                return Err(IntakeError::DuplicateShard(shard_id));
            }
        }

        let computed = micro_block.header.my_hash();
        if computed != micro_block.block_hash {
            warn!(
                computed = %computed,
                received = %micro_block.block_hash,
                "microblock self-hash mismatch"
            );
            return Err(IntakeError::BlockHashMismatch {
                computed,
                received: micro_block.block_hash,
            });
        }

        if micro_block.header.version != self.config.microblock_version {
            warn!(
                got = micro_block.header.version,
                expected = self.config.microblock_version,
                "microblock version check failed"
            );
            return Err(IntakeError::WrongVersion {
                got: micro_block.header.version,
                expected: self.config.microblock_version,
            });
        }

        if !self
            .chain
            .is_latest_block(micro_block.header.ds_block_num + 1, micro_block.header.epoch_num)
        {
            warn!("microblock does not reference the latest block");
            return Err(IntakeError::NotLatestBlock);
        }

        self.check_timestamp(micro_block.timestamp_ms, current_epoch)?;

        info!(epoch = current_epoch, shard_id, "processing shard microblock");

        // Miner authority: the key must be assigned to the claimed shard.
        let miner = micro_block.header.miner_pub_key;
        match self.state.shard_of(&miner) {
            None => {
                warn!(miner = %miner, "cannot find the miner key");
                return Err(IntakeError::UnknownMiner(miner));
            }
            Some(assigned) if assigned != shard_id => {
                warn!(assigned, claimed = shard_id, "microblock shard id mismatch");
                return Err(IntakeError::ShardMismatch {
                    assigned,
                    claimed: shard_id,
                });
            }
            Some(_) => {}
        }

        let num_shards = self.chain.num_shards();
        let Some(shard_ref) = ShardRef::from_wire(shard_id, num_shards) else {
            warn!(shard_id, num_shards, "invalid shard id");
            return Err(IntakeError::InvalidShardId {
                shard_id,
                num_shards,
            });
        };

        let committee = self
            .committee_for(shard_ref)
            .ok_or(IntakeError::InvalidShardId {
                shard_id,
                num_shards,
            })?;

        let expected = committee_hash(&committee);
        if expected != micro_block.header.committee_hash {
            warn!(
                expected = %expected,
                received = %micro_block.header.committee_hash,
                "microblock committee hash mismatch"
            );
            return Err(IntakeError::CommitteeHashMismatch {
                expected,
                received: micro_block.header.committee_hash,
            });
        }

        verify_co_signature(&micro_block, &committee)?;

        // Commit region: gate re-check, coinbase, persistence, delta, and
        // the completion transition all happen under the ledger lock.
        let mut ledger = self.state.ledger.lock();

        if ledger.stop_new_submissions {
            warn!("microblock consensus already started, ignoring this submission");
            return Err(IntakeError::SubmissionWindowClosed);
        }

        if let ShardRef::Shard(shard) = shard_ref {
            self.coinbase
                .save_coinbase(
                    &micro_block.co_sigs.b1,
                    &micro_block.co_sigs.b2,
                    shard,
                    current_epoch,
                )
                .map_err(|error| {
                    warn!(%error, shard, "coinbase crediting failed");
                    IntakeError::CoinbaseFailed(shard)
                })?;
        }

        self.persist(&micro_block)?;

        if !self.chain.is_vacuous_epoch(current_epoch) {
            self.apply_state_delta(
                &mut ledger,
                &state_delta,
                &micro_block,
                current_epoch,
            )?;
        }

        let block_hash = micro_block.block_hash;
        let bucket = ledger.micro_blocks.entry(current_epoch).or_default();
        bucket.insert(block_hash, micro_block);

        let received = bucket.len();
        info!(
            epoch = current_epoch,
            received, total = num_shards, "microblocks received"
        );

        if received == num_shards {
            ledger.stop_new_submissions = true;
            drop(ledger);
            // The gate is latched; the event fires exactly once per epoch.
            self.notifier
                .notify(ConsensusEvent::ConsensusReady(current_epoch));
        }

        Ok(())
    }

    // =========================================================================
    // REPAIR PATH
    // =========================================================================

    /// Process a batch of microblocks fetched from DS peers to fill known
    /// gaps. Bad items are skipped; freshness and storage failures abort the
    /// batch.
    fn process_missing_submission(
        &self,
        epoch: EpochNumber,
        micro_blocks: Vec<Microblock>,
        state_deltas: Vec<Vec<u8>>,
    ) -> IntakeResult<SubmissionOutcome> {
        if micro_blocks.len() != state_deltas.len() {
            warn!(
                microblocks = micro_blocks.len(),
                state_deltas = state_deltas.len(),
                "repair batch size mismatch"
            );
            return Err(IntakeError::LengthMismatch {
                microblocks: micro_blocks.len(),
                state_deltas: state_deltas.len(),
            });
        }

        let current_epoch = self.chain.current_epoch();
        if epoch != current_epoch {
            info!(
                received = epoch,
                local = current_epoch,
                "untimely delivery of missing microblocks"
            );
        }

        let num_shards = self.chain.num_shards();

        for (micro_block, state_delta) in micro_blocks.into_iter().zip(state_deltas) {
            if !self.chain.is_latest_block(
                micro_block.header.ds_block_num + 1,
                micro_block.header.epoch_num,
            ) {
                warn!("fetched microblock does not reference the latest block");
                return Err(IntakeError::NotLatestBlock);
            }

            let shard_id = micro_block.shard_id();
            let miner = micro_block.header.miner_pub_key;
            info!(epoch, shard_id, miner = %miner, "processing fetched microblock");

            let Some(shard_ref) = ShardRef::from_wire(shard_id, num_shards) else {
                warn!(shard_id, num_shards, "invalid shard id in fetched microblock");
                continue;
            };

            // Miner authority; a bad binding skips the item only.
            match shard_ref {
                ShardRef::DsCommittee => {
                    let in_ds = self
                        .chain
                        .ds_committee()
                        .iter()
                        .any(|member| member.pub_key == miner);
                    if !in_ds {
                        warn!(miner = %miner, "cannot find the miner key in DS committee");
                        continue;
                    }
                }
                ShardRef::Shard(shard) => match self.state.shard_of(&miner) {
                    None => {
                        warn!(miner = %miner, "cannot find the miner key in normal shard");
                        continue;
                    }
                    Some(assigned) if assigned != shard => {
                        warn!(assigned, claimed = shard, "fetched microblock shard id mismatch");
                        continue;
                    }
                    Some(_) => {}
                },
            }

            // Self-authored microblocks were verified when produced.
            if self.chain.my_shard_id() != Some(shard_id) {
                let Some(committee) = self.committee_for(shard_ref) else {
                    warn!(shard_id, "no committee for fetched microblock");
                    continue;
                };
                if let Err(error) = verify_co_signature(&micro_block, &committee) {
                    warn!(%error, shard_id, "fetched microblock co-sig verification failed");
                    continue;
                }
            }

            if !self.state.is_missing(epoch, &micro_block.block_hash) {
                warn!(
                    block_hash = %micro_block.block_hash,
                    "fetched microblock is not in the missing list"
                );
                continue;
            }

            let mut ledger = self.state.ledger.lock();

            if ledger.contains(epoch, &micro_block.block_hash) {
                warn!(
                    block_hash = %micro_block.block_hash,
                    "fetched microblock already exists locally"
                );
                continue;
            }

            if let ShardRef::Shard(shard) = shard_ref {
                if let Err(error) = self.coinbase.save_coinbase(
                    &micro_block.co_sigs.b1,
                    &micro_block.co_sigs.b2,
                    shard,
                    current_epoch,
                ) {
                    warn!(%error, shard, "coinbase crediting failed for fetched microblock");
                    continue;
                }
            }

            if !self.chain.is_vacuous_epoch(epoch) {
                if let Err(error) =
                    self.apply_state_delta(&mut ledger, &state_delta, &micro_block, current_epoch)
                {
                    warn!(%error, "state delta attached to fetched microblock is invalid");
                    continue;
                }
            }

            // A storage fault is global; no point walking the rest.
            self.persist(&micro_block)?;

            let block_hash = micro_block.block_hash;
            let bucket = ledger.micro_blocks.entry(epoch).or_default();
            bucket.insert(block_hash, micro_block);
            info!(
                epoch,
                received = bucket.len(),
                total = num_shards,
                "microblocks received for epoch"
            );
        }

        let gaps = self.state.unfilled_gaps(epoch);
        if !gaps.is_empty() {
            warn!(
                epoch,
                remaining = gaps.len(),
                "still have missing microblocks after fetching"
            );
            return Err(IntakeError::MissingMicroblocksRemain(epoch));
        }

        self.notifier.notify(ConsensusEvent::MissingGapClosed(epoch));
        Ok(SubmissionOutcome::GapClosed)
    }

    // =========================================================================
    // SHARED STEPS
    // =========================================================================

    fn committee_for(&self, shard_ref: ShardRef) -> Option<Committee> {
        match shard_ref {
            ShardRef::DsCommittee => Some(self.chain.ds_committee()),
            ShardRef::Shard(shard) => self.chain.shard_committee(shard),
        }
    }

    fn check_timestamp(&self, timestamp_ms: u64, current_epoch: EpochNumber) -> IntakeResult<()> {
        let now_ms = self.time.now_ms();
        let window_ms = self.config.submission_window(current_epoch).as_millis() as u64;
        if now_ms.abs_diff(timestamp_ms) > window_ms {
            warn!(
                timestamp_ms,
                now_ms, window_ms, "microblock timestamp outside the accepted window"
            );
            return Err(IntakeError::TimestampOutOfWindow {
                timestamp_ms,
                now_ms,
                window_ms,
            });
        }
        Ok(())
    }

    fn persist(&self, micro_block: &Microblock) -> IntakeResult<()> {
        let body = self.codec.encode_microblock(micro_block).map_err(|error| {
            warn!(%error, "failed to serialize microblock for persistence");
            IntakeError::PersistFailed(micro_block.block_hash)
        })?;

        self.block_store
            .put_microblock(
                &micro_block.block_hash,
                micro_block.header.epoch_num,
                micro_block.shard_id(),
                &body,
            )
            .map_err(|error| {
                warn!(%error, "failed to put microblock in persistence");
                IntakeError::PersistFailed(micro_block.block_hash)
            })
    }

    /// Apply an accepted delta: temporary overlay, cumulative snapshot,
    /// retrieval index. Caller holds the ledger lock.
    fn apply_state_delta(
        &self,
        ledger: &mut MicroblockLedger,
        state_delta: &[u8],
        micro_block: &Microblock,
        index_epoch: EpochNumber,
    ) -> IntakeResult<()> {
        let declared = &micro_block.header.state_delta_hash;
        match classify_state_delta(declared, state_delta)? {
            DeltaDisposition::SkipEmpty => {
                debug!("state delta hash is null, skip processing state delta");
                Ok(())
            }
            DeltaDisposition::Apply => {
                self.account_store
                    .deserialize_delta_temp(state_delta)
                    .map_err(|error| {
                        warn!(%error, "account store delta apply failed");
                        IntakeError::AccountStoreFailed(error.to_string())
                    })?;
                self.account_store.serialize_delta().map_err(|error| {
                    warn!(%error, "account store delta serialization failed");
                    IntakeError::AccountStoreFailed(error.to_string())
                })?;

                // Refresh the cumulative snapshot after every apply so
                // final-block consensus always sees the full delta.
                ledger.state_delta_from_shards = self.account_store.serialized_delta();
                ledger
                    .state_deltas
                    .entry(index_epoch)
                    .or_default()
                    .insert(micro_block.block_hash, state_delta.to_vec());
                Ok(())
            }
        }
    }
}

impl<C, B, A, L, V, T, N> MicroblockIntake for MicroblockIntakeService<C, B, A, L, V, T, N>
where
    C: SubmissionCodec,
    B: BlockStore,
    A: AccountStore,
    L: CoinbaseLedger,
    V: ChainView,
    T: TimeSource,
    N: ConsensusNotifier,
{
    fn process_submission(&self, message: &[u8]) -> IntakeResult<SubmissionOutcome> {
        if self.config.lookup_node_mode {
            warn!("microblock submission not expected on a lookup node");
            return Ok(SubmissionOutcome::Disabled);
        }

        let submission = self.codec.decode_submission(message).map_err(|error| {
            warn!(%error, "failed to decode microblock submission");
            IntakeError::MalformedMessage(error.to_string())
        })?;

        match submission.kind {
            SubmitKind::Shard => {
                if !self.chain.is_shard_node(&submission.sender) {
                    warn!(
                        sender = %submission.sender,
                        "microblock sender does not match any of the shard members"
                    );
                    return Err(IntakeError::UnauthorizedSender(submission.sender));
                }
                self.dispatch_shard_submission(
                    submission.epoch_num,
                    submission.microblocks,
                    submission.state_deltas,
                )
            }
            SubmitKind::Missing => {
                if !self.chain.is_ds_node(&submission.sender) {
                    warn!(
                        sender = %submission.sender,
                        "microblock sender does not match any of the DS members"
                    );
                    return Err(IntakeError::UnauthorizedSender(submission.sender));
                }
                self.process_missing_submission(
                    submission.epoch_num,
                    submission.microblocks,
                    submission.state_deltas,
                )
            }
        }
    }

    fn commit_buffered_submissions(&self) {
        let current = self.chain.current_epoch();

        let entries = {
            let mut buffer = self.state.buffer.lock();

            let stale: Vec<EpochNumber> = buffer.range(..current).map(|(epoch, _)| *epoch).collect();
            for epoch in stale {
                let dropped = buffer.remove(&epoch).map(|bucket| bucket.len()).unwrap_or(0);
                info!(epoch, dropped, "discarding buffered submissions for past epoch");
            }

            // One epoch per drain: splice out the current bucket and leave
            // future epochs for the next epoch advance.
            buffer.remove(&current)
        };

        let Some(entries) = entries else {
            return;
        };

        info!(
            epoch = current,
            count = entries.len(),
            "replaying buffered microblock submissions"
        );
        for (micro_block, state_delta) in entries {
            if let Err(error) = self.validate_and_commit(micro_block, state_delta) {
                warn!(%error, "buffered microblock submission rejected");
            }
        }
    }

    fn record_missing(&self, epoch: EpochNumber, hashes: Vec<BlockHash>) {
        self.state.record_missing(epoch, hashes);
    }

    fn micro_blocks_at(&self, epoch: EpochNumber) -> Vec<Microblock> {
        self.state.micro_blocks_at(epoch)
    }

    fn state_delta_of(&self, epoch: EpochNumber, hash: &BlockHash) -> Option<Vec<u8>> {
        self.state.state_delta_of(epoch, hash)
    }

    fn aggregated_state_delta(&self) -> Vec<u8> {
        self.state.aggregated_state_delta()
    }

    fn set_phase(&self, phase: DsPhase) {
        self.state.set_phase(phase);
    }

    fn resume_submissions(&self) {
        self.state.resume_submissions();
    }

    fn purge_epoch(&self, epoch: EpochNumber) {
        self.state.purge_epoch(epoch);
    }

    fn set_shard_assignments(&self, assignments: HashMap<BlsPublicKey, ShardId>) {
        self.state.set_shard_assignments(assignments);
    }
}
