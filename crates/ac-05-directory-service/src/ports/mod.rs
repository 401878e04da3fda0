//! Hexagonal ports: the driving API (`inbound`) and the driven collaborator
//! traits (`outbound`).

pub mod inbound;
pub mod outbound;

pub use inbound::{DsPhase, MicroblockIntake, SubmissionOutcome};
pub use outbound::{
    AccountStore, BlockStore, ChainView, CodecError, CoinbaseLedger, ConsensusEvent,
    ConsensusNotifier, StoreError, SubmissionCodec, SystemTimeSource, TimeSource,
};
