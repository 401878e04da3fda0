//! Default wire codec using bincode.

use crate::domain::{Microblock, MicroblockSubmission};
use crate::ports::outbound::{CodecError, SubmissionCodec};

/// Bincode-backed submission codec.
#[derive(Default)]
pub struct BincodeSubmissionCodec;

impl BincodeSubmissionCodec {
    /// Create the codec.
    pub fn new() -> Self {
        Self
    }
}

fn codec_error(e: bincode::Error) -> CodecError {
    CodecError {
        message: e.to_string(),
    }
}

impl SubmissionCodec for BincodeSubmissionCodec {
    fn decode_submission(&self, bytes: &[u8]) -> Result<MicroblockSubmission, CodecError> {
        bincode::deserialize(bytes).map_err(codec_error)
    }

    fn encode_submission(&self, submission: &MicroblockSubmission) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(submission).map_err(codec_error)
    }

    fn encode_microblock(&self, micro_block: &Microblock) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(micro_block).map_err(codec_error)
    }

    fn decode_microblock(&self, bytes: &[u8]) -> Result<Microblock, CodecError> {
        bincode::deserialize(bytes).map_err(codec_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CoSignatures, MicroblockHeader, SignerBitmap, SubmitKind};
    use bitvec::prelude::*;
    use shared_crypto::{BlsPublicKey, BlsSignature};
    use shared_types::{CommitteeHash, StateHash};

    fn sample_microblock() -> Microblock {
        let header = MicroblockHeader {
            version: 1,
            ds_block_num: 12,
            epoch_num: 1200,
            shard_id: 1,
            miner_pub_key: BlsPublicKey::from_bytes([9u8; 48]),
            committee_hash: CommitteeHash::from([8u8; 32]),
            state_delta_hash: StateHash::ZERO,
            tx_root: [7u8; 32],
            num_txs: 3,
        };
        let block_hash = header.my_hash();
        let mut b2: SignerBitmap = BitVec::repeat(false, 5);
        b2.set(0, true);
        b2.set(2, true);

        Microblock {
            header,
            timestamp_ms: 1_700_000_000_000,
            co_sigs: CoSignatures {
                cs1: BlsSignature::from_bytes([1u8; 96]),
                b1: BitVec::repeat(true, 5),
                cs2: BlsSignature::from_bytes([2u8; 96]),
                b2,
            },
            block_hash,
        }
    }

    #[test]
    fn test_microblock_round_trip_is_byte_stable() {
        let codec = BincodeSubmissionCodec::new();
        let block = sample_microblock();

        let body = codec.encode_microblock(&block).unwrap();
        let decoded = codec.decode_microblock(&body).unwrap();
        assert_eq!(decoded, block);

        let body_again = codec.encode_microblock(&decoded).unwrap();
        assert_eq!(body, body_again);
    }

    #[test]
    fn test_submission_round_trip() {
        let codec = BincodeSubmissionCodec::new();
        let submission = MicroblockSubmission {
            kind: SubmitKind::Shard,
            epoch_num: 1200,
            microblocks: vec![sample_microblock()],
            state_deltas: vec![vec![1, 2, 3]],
            sender: BlsPublicKey::from_bytes([4u8; 48]),
        };

        let bytes = codec.encode_submission(&submission).unwrap();
        assert_eq!(codec.decode_submission(&bytes).unwrap(), submission);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let codec = BincodeSubmissionCodec::new();
        assert!(codec.decode_submission(&[0xFF; 7]).is_err());
    }
}
