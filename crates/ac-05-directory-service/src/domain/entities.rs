//! # Domain Entities
//!
//! Microblocks, committees, and the submission envelope processed by the
//! Directory Service intake core.

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use shared_crypto::{BlsPublicKey, BlsSignature, Sha256Hasher};
use shared_types::{
    BlockHash, CommitteeHash, DsBlockNumber, EpochNumber, Hash, Peer, ShardId, StateHash,
};

/// Signer-presence bitmap for one co-signing round. Bit `i` corresponds to
/// committee position `i`; the MSB-first packing matches the wire encoding.
pub type SignerBitmap = BitVec<u8, Msb0>;

/// Microblock header. The self-hash and the co-signed message both cover
/// exactly the fields below, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroblockHeader {
    /// Header format version.
    pub version: u32,
    /// DS block the producing shard was working under.
    pub ds_block_num: DsBlockNumber,
    /// Transaction epoch this microblock belongs to.
    pub epoch_num: EpochNumber,
    /// Producing shard, in the wire convention (`num_shards` means the DS
    /// committee itself).
    pub shard_id: ShardId,
    /// Key of the shard leader that assembled the microblock.
    pub miner_pub_key: BlsPublicKey,
    /// Hash of the producing committee, binding the co-signature to a
    /// concrete membership list.
    pub committee_hash: CommitteeHash,
    /// Hash of the accompanying state-delta blob; zero when the microblock
    /// carries no delta.
    pub state_delta_hash: StateHash,
    /// Merkle root of the transactions in the microblock body.
    pub tx_root: Hash,
    /// Number of transactions in the body.
    pub num_txs: u32,
}

impl MicroblockHeader {
    /// Canonical byte form of the header: fixed-order big-endian fields.
    /// This is the `serialize(header)` prefix of the co-signed message.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(160);
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.ds_block_num.to_be_bytes());
        out.extend_from_slice(&self.epoch_num.to_be_bytes());
        out.extend_from_slice(&self.shard_id.to_be_bytes());
        out.extend_from_slice(self.miner_pub_key.as_bytes());
        out.extend_from_slice(self.committee_hash.as_bytes());
        out.extend_from_slice(self.state_delta_hash.as_bytes());
        out.extend_from_slice(&self.tx_root);
        out.extend_from_slice(&self.num_txs.to_be_bytes());
        out
    }

    /// Self-hash of the header; an honest microblock's `block_hash` equals
    /// this value.
    pub fn my_hash(&self) -> BlockHash {
        BlockHash::from(shared_crypto::sha256(&self.signing_bytes()))
    }
}

/// Two-round commit artifacts: round-1 signature and bitmap feed into the
/// round-2 message, round-2 signature seals the microblock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoSignatures {
    /// Aggregated round-1 commit signature.
    pub cs1: BlsSignature,
    /// Round-1 signer bitmap.
    pub b1: SignerBitmap,
    /// Aggregated round-2 commit signature.
    pub cs2: BlsSignature,
    /// Round-2 signer bitmap.
    pub b2: SignerBitmap,
}

/// A shard's per-epoch output: header, co-signatures, and content hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Microblock {
    /// Header covered by the co-signature.
    pub header: MicroblockHeader,
    /// Wall-clock production time in milliseconds since the Unix epoch.
    /// Not covered by the co-signed message.
    pub timestamp_ms: u64,
    /// Two-round commit signatures and bitmaps.
    pub co_sigs: CoSignatures,
    /// Content hash; must equal `header.my_hash()`.
    pub block_hash: BlockHash,
}

impl Microblock {
    /// Producing shard in the wire convention.
    pub fn shard_id(&self) -> ShardId {
        self.header.shard_id
    }
}

/// One committee seat: signing key plus network endpoint. Seat order is
/// significant; it aligns with bitmap positions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMember {
    /// Member signing key.
    pub pub_key: BlsPublicKey,
    /// Member network endpoint.
    pub peer: Peer,
}

/// An ordered committee; the DS committee and shard committees share this
/// shape.
pub type Committee = Vec<CommitteeMember>;

/// Hash an ordered committee: SHA-256 over each seat's key bytes followed by
/// its canonical `ip:port` text. Reordering seats changes the hash.
pub fn committee_hash(committee: &[CommitteeMember]) -> CommitteeHash {
    let mut hasher = Sha256Hasher::new();
    for member in committee {
        hasher.update(member.pub_key.as_bytes());
        hasher.update(member.peer.to_string().as_bytes());
    }
    CommitteeHash::from(hasher.finalize())
}

/// A resolved producer reference: either a real shard or the DS committee
/// itself. Replaces the `shard_id == num_shards` wire sentinel everywhere
/// past the decode boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShardRef {
    /// A normal shard, indexable into the shard list.
    Shard(ShardId),
    /// The Directory Service committee.
    DsCommittee,
}

impl ShardRef {
    /// Resolve a wire shard id against the current shard count. Ids past the
    /// sentinel are invalid.
    pub fn from_wire(shard_id: ShardId, num_shards: usize) -> Option<Self> {
        match (shard_id as usize).cmp(&num_shards) {
            std::cmp::Ordering::Less => Some(ShardRef::Shard(shard_id)),
            std::cmp::Ordering::Equal => Some(ShardRef::DsCommittee),
            std::cmp::Ordering::Greater => None,
        }
    }
}

/// Submission flavor carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitKind {
    /// Primary path: a shard submitting its microblock for the current epoch.
    Shard,
    /// Repair path: a DS peer returning microblocks we reported missing.
    Missing,
}

/// Decoded microblock submission message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroblockSubmission {
    /// Primary or repair path.
    pub kind: SubmitKind,
    /// Epoch the sender believes this submission is for.
    pub epoch_num: EpochNumber,
    /// Submitted microblocks. The shard path consumes index 0 only; the
    /// vector exists for the batched repair path and forward compatibility.
    pub microblocks: Vec<Microblock>,
    /// State-delta blobs, parallel to `microblocks`.
    pub state_deltas: Vec<Vec<u8>>,
    /// Key of the node that sent the message.
    pub sender: BlsPublicKey,
}

/// Wire encoding of a signer bitmap: big-endian `u16` bit count, then the
/// bits packed MSB-first. This exact form is spliced into the co-signed
/// message after CS1.
pub fn bitvector_bytes(bits: &BitSlice<u8, Msb0>) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + bits.len().div_ceil(8));
    out.extend_from_slice(&(bits.len() as u16).to_be_bytes());
    let mut packed = bits.to_bitvec();
    packed.set_uninitialized(false);
    out.extend_from_slice(packed.as_raw_slice());
    out
}
