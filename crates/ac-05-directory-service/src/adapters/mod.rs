//! Default adapters for the outbound ports: the bincode wire codec and
//! in-memory collaborators for tests and single-process hosts.

pub mod codec;
pub mod memory;

pub use codec::BincodeSubmissionCodec;
pub use memory::{
    ChannelConsensusNotifier, CoinbaseRecord, InMemoryAccountStore, InMemoryBlockStore,
    InMemoryCoinbaseLedger, ManualTimeSource, StaticChainView,
};
