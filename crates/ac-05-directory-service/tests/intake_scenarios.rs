//! End-to-end intake scenarios: framed wire bytes in, persisted microblocks
//! and consensus events out. Everything goes through the public API with the
//! shipped adapters.

use std::collections::HashMap;
use std::sync::Arc;

use ac_05_directory_service::adapters::{
    BincodeSubmissionCodec, ChannelConsensusNotifier, InMemoryAccountStore, InMemoryBlockStore,
    InMemoryCoinbaseLedger, ManualTimeSource, StaticChainView,
};
use ac_05_directory_service::domain::co_signed_message;
use ac_05_directory_service::ports::outbound::SubmissionCodec;
use ac_05_directory_service::{
    committee_hash, Committee, CommitteeMember, ConsensusEvent, CoSignatures, IntakeConfig,
    Microblock, MicroblockHeader, MicroblockIntake, MicroblockIntakeService, MicroblockSubmission,
    SignerBitmap, SubmissionOutcome, SubmitKind,
};
use shared_crypto::{aggregate_signatures, sha256, BlsKeyPair, BlsPublicKey, BlsSignature};
use shared_types::{EpochNumber, Peer, ShardId, StateHash};

const NOW_MS: u64 = 1_700_000_000_000;

struct Network {
    service: MicroblockIntakeService<
        BincodeSubmissionCodec,
        InMemoryBlockStore,
        InMemoryAccountStore,
        InMemoryCoinbaseLedger,
        StaticChainView,
        ManualTimeSource,
        ChannelConsensusNotifier,
    >,
    codec: Arc<BincodeSubmissionCodec>,
    block_store: Arc<InMemoryBlockStore>,
    chain: Arc<StaticChainView>,
    events: tokio::sync::mpsc::UnboundedReceiver<ConsensusEvent>,
    shard_keys: Vec<Vec<BlsKeyPair>>,
    ds_keys: Vec<BlsKeyPair>,
    epoch: EpochNumber,
    next_ds_block: u64,
}

fn committee_of(keys: &[BlsKeyPair]) -> Committee {
    keys.iter()
        .map(|pair| CommitteeMember {
            pub_key: pair.public_key(),
            peer: Peer::default(),
        })
        .collect()
}

/// Spin up a DS node view over `num_shards` shards of three members each
/// (quorum: all three).
fn network(num_shards: usize, epoch: EpochNumber) -> Network {
    let shard_keys: Vec<Vec<BlsKeyPair>> = (0..num_shards)
        .map(|shard| {
            (0..3)
                .map(|member| BlsKeyPair::from_seed(&[(shard * 8 + member + 1) as u8; 32]).unwrap())
                .collect()
        })
        .collect();
    let ds_keys: Vec<BlsKeyPair> = (0..3)
        .map(|member| BlsKeyPair::from_seed(&[(230 + member) as u8; 32]).unwrap())
        .collect();

    let chain = Arc::new(StaticChainView::new());
    chain.set_current_epoch(epoch);
    chain.set_next_ds_block(7);
    chain.set_shards(shard_keys.iter().map(|keys| committee_of(keys)).collect());
    chain.set_ds_committee(committee_of(&ds_keys));
    chain.set_my_shard_id(Some(num_shards as ShardId));

    let codec = Arc::new(BincodeSubmissionCodec::new());
    let block_store = Arc::new(InMemoryBlockStore::new());
    let (notifier, events) = ChannelConsensusNotifier::channel();

    let service = MicroblockIntakeService::new(
        IntakeConfig::for_testing(),
        codec.clone(),
        block_store.clone(),
        Arc::new(InMemoryAccountStore::new()),
        Arc::new(InMemoryCoinbaseLedger::new()),
        chain.clone(),
        Arc::new(ManualTimeSource::at(NOW_MS)),
        Arc::new(notifier),
    );

    let assignments: HashMap<BlsPublicKey, ShardId> = shard_keys
        .iter()
        .enumerate()
        .flat_map(|(shard, keys)| {
            keys.iter()
                .map(move |pair| (pair.public_key(), shard as ShardId))
        })
        .collect();
    service.set_shard_assignments(assignments);

    Network {
        service,
        codec,
        block_store,
        chain,
        events,
        shard_keys,
        ds_keys,
        epoch,
        next_ds_block: 7,
    }
}

impl Network {
    /// Fully co-signed microblock for `shard` at `epoch`.
    fn produce(&self, shard: usize, epoch: EpochNumber, delta: &[u8]) -> Microblock {
        let keys = &self.shard_keys[shard];
        let header = MicroblockHeader {
            version: 1,
            ds_block_num: self.next_ds_block - 1,
            epoch_num: epoch,
            shard_id: shard as ShardId,
            miner_pub_key: keys[0].public_key(),
            committee_hash: committee_hash(&committee_of(keys)),
            state_delta_hash: if delta.is_empty() {
                StateHash::ZERO
            } else {
                StateHash::from(sha256(delta))
            },
            tx_root: sha256(delta),
            num_txs: delta.len() as u32,
        };

        let n = keys.len();
        let b1: SignerBitmap = SignerBitmap::repeat(true, n);
        let b2: SignerBitmap = SignerBitmap::repeat(true, n);

        let round1: Vec<BlsSignature> = keys
            .iter()
            .map(|pair| pair.sign(&header.signing_bytes()))
            .collect();
        let mut co_sigs = CoSignatures {
            cs1: aggregate_signatures(&round1).unwrap(),
            b1,
            cs2: aggregate_signatures(&round1).unwrap(),
            b2,
        };
        let message = co_signed_message(&header, &co_sigs);
        let round2: Vec<BlsSignature> = keys.iter().map(|pair| pair.sign(&message)).collect();
        co_sigs.cs2 = aggregate_signatures(&round2).unwrap();

        let block_hash = header.my_hash();
        Microblock {
            header,
            timestamp_ms: NOW_MS,
            co_sigs,
            block_hash,
        }
    }

    fn wire(&self, kind: SubmitKind, epoch: EpochNumber, items: Vec<(Microblock, Vec<u8>)>) -> Vec<u8> {
        let sender = match kind {
            SubmitKind::Shard => self.shard_keys[0][0].public_key(),
            SubmitKind::Missing => self.ds_keys[0].public_key(),
        };
        let (microblocks, state_deltas): (Vec<_>, Vec<_>) = items.into_iter().unzip();
        self.codec
            .encode_submission(&MicroblockSubmission {
                kind,
                epoch_num: epoch,
                microblocks,
                state_deltas,
                sender,
            })
            .unwrap()
    }
}

#[test]
fn full_epoch_collects_every_shard_and_signals_consensus() {
    let mut net = network(3, 40);

    for shard in 0..3 {
        let delta = format!("delta of shard {shard}").into_bytes();
        let mb = net.produce(shard, net.epoch, &delta);
        let message = net.wire(SubmitKind::Shard, net.epoch, vec![(mb, delta)]);
        assert_eq!(
            net.service.process_submission(&message).unwrap(),
            SubmissionOutcome::Accepted
        );
    }

    assert_eq!(net.service.micro_blocks_at(40).len(), 3);
    assert_eq!(net.events.try_recv().unwrap(), ConsensusEvent::ConsensusReady(40));

    // Every accepted microblock round-trips byte-identically from storage.
    for mb in net.service.micro_blocks_at(40) {
        let body = net.block_store.get(&mb.block_hash).unwrap();
        assert_eq!(net.codec.decode_microblock(&body).unwrap(), mb);
    }

    // The window is now closed for this epoch.
    let late = net.produce(0, net.epoch, b"");
    let message = net.wire(SubmitKind::Shard, net.epoch, vec![(late, Vec::new())]);
    assert!(net.service.process_submission(&message).is_err());
}

#[test]
fn early_submissions_wait_for_their_epoch() {
    let mut net = network(1, 40);

    // A shard races ahead: its microblock for epoch 42 arrives at epoch 40.
    let mb = net.produce(0, 42, b"early delta");
    let message = net.wire(SubmitKind::Shard, 42, vec![(mb, b"early delta".to_vec())]);
    assert_eq!(
        net.service.process_submission(&message).unwrap(),
        SubmissionOutcome::Buffered
    );
    assert!(net.service.micro_blocks_at(42).is_empty());

    // Epoch manager advances twice; the drain after 42 picks the entry up.
    net.chain.set_current_epoch(41);
    net.service.commit_buffered_submissions();
    assert!(net.service.micro_blocks_at(42).is_empty());

    net.chain.set_current_epoch(42);
    net.service.resume_submissions();
    net.service.commit_buffered_submissions();

    assert_eq!(net.service.micro_blocks_at(42).len(), 1);
    assert_eq!(net.events.try_recv().unwrap(), ConsensusEvent::ConsensusReady(42));
}

#[test]
fn repair_closes_reported_gaps() {
    let mut net = network(2, 40);

    // Shard 0 reported directly; shard 1 never arrived.
    let mb0 = net.produce(0, 40, b"d0");
    let message = net.wire(SubmitKind::Shard, 40, vec![(mb0, b"d0".to_vec())]);
    net.service.process_submission(&message).unwrap();

    let mb1 = net.produce(1, 40, b"d1");
    net.service.record_missing(40, vec![mb1.block_hash]);

    // A DS peer answers the fetch request.
    let repair = net.wire(SubmitKind::Missing, 40, vec![(mb1.clone(), b"d1".to_vec())]);
    assert_eq!(
        net.service.process_submission(&repair).unwrap(),
        SubmissionOutcome::GapClosed
    );

    assert_eq!(net.service.micro_blocks_at(40).len(), 2);
    assert_eq!(net.service.state_delta_of(40, &mb1.block_hash), Some(b"d1".to_vec()));
    assert_eq!(net.events.try_recv().unwrap(), ConsensusEvent::MissingGapClosed(40));
}

#[test]
fn epoch_lifecycle_purge_then_reuse() {
    let mut net = network(1, 40);

    let mb = net.produce(0, 40, b"epoch forty");
    let message = net.wire(SubmitKind::Shard, 40, vec![(mb, b"epoch forty".to_vec())]);
    net.service.process_submission(&message).unwrap();
    assert_eq!(net.events.try_recv().unwrap(), ConsensusEvent::ConsensusReady(40));

    // Final-block consensus concluded; the epoch manager tears down epoch 40
    // and reopens the window for 41.
    net.service.purge_epoch(40);
    net.service.resume_submissions();
    net.chain.set_current_epoch(41);

    assert!(net.service.micro_blocks_at(40).is_empty());

    let mb = net.produce(0, 41, b"epoch forty one");
    let message = net.wire(SubmitKind::Shard, 41, vec![(mb, b"epoch forty one".to_vec())]);
    assert_eq!(
        net.service.process_submission(&message).unwrap(),
        SubmissionOutcome::Accepted
    );
    assert_eq!(net.events.try_recv().unwrap(), ConsensusEvent::ConsensusReady(41));
}
