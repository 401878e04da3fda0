//! # Shared Types Crate
//!
//! Cross-subsystem identifiers for Arcadia Chain: content hashes, protocol
//! counters, and network addresses.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: identifiers that cross a subsystem boundary
//!   are defined here, never redeclared locally.
//! - **Cheap by construction**: everything in this crate is `Copy` or a thin
//!   wrapper; no allocation on the hot path.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entities;

pub use entities::{
    BlockHash, CommitteeHash, DsBlockNumber, EpochNumber, Hash, Peer, ShardId, StateHash,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
