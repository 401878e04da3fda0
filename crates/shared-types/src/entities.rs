//! # Core Identifiers
//!
//! Protocol counters, content hashes, and network addresses shared by every
//! Arcadia subsystem.
//!
//! ## Clusters
//!
//! - **Counters**: `EpochNumber`, `DsBlockNumber`, `ShardId`
//! - **Hashes**: `BlockHash`, `StateHash`, `CommitteeHash`
//! - **Networking**: `Peer`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

// =============================================================================
// CLUSTER A: PROTOCOL COUNTERS
// =============================================================================

/// Transaction epoch counter; monotonically increasing across the chain.
pub type EpochNumber = u64;

/// Directory Service block counter; one DS block per PoW round.
pub type DsBlockNumber = u64;

/// Shard index. By wire convention, the value equal to the number of shards
/// refers to the DS committee itself rather than a real shard.
pub type ShardId = u32;

// =============================================================================
// CLUSTER B: CONTENT HASHES
// =============================================================================

/// A 32-byte SHA-256 content hash.
pub type Hash = [u8; 32];

macro_rules! hash_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        pub struct $name(pub Hash);

        impl $name {
            /// The all-zero hash, used as an explicit "absent" marker.
            pub const ZERO: Self = Self([0u8; 32]);

            /// Whether this is the all-zero marker hash.
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Raw hash bytes.
            pub fn as_bytes(&self) -> &Hash {
                &self.0
            }
        }

        impl From<Hash> for $name {
            fn from(bytes: Hash) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    };
}

hash_newtype! {
    /// Content hash identifying a block (micro or final).
    BlockHash
}

hash_newtype! {
    /// Hash binding an account-state delta blob to a block header.
    StateHash
}

hash_newtype! {
    /// Hash of an ordered committee (member keys and addresses).
    CommitteeHash
}

// =============================================================================
// CLUSTER C: NETWORKING
// =============================================================================

/// Network endpoint of a committee member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Peer {
    /// Listen address.
    pub ip: IpAddr,
    /// Listen port.
    pub port: u16,
}

impl Peer {
    /// Create a peer from address parts.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl Default for Peer {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hash_marker() {
        assert!(StateHash::ZERO.is_zero());
        assert!(StateHash::default().is_zero());
        assert!(!StateHash::from([1u8; 32]).is_zero());
    }

    #[test]
    fn test_hash_display_is_lower_hex() {
        let hash = BlockHash::from([0xABu8; 32]);
        assert_eq!(hash.to_string(), "ab".repeat(32));
    }

    #[test]
    fn test_hash_ordering_matches_bytes() {
        let low = BlockHash::from([0u8; 32]);
        let high = BlockHash::from([9u8; 32]);
        assert!(low < high);
    }

    #[test]
    fn test_peer_display() {
        let peer = Peer::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), 33133);
        assert_eq!(peer.to_string(), "10.0.0.7:33133");
    }
}
