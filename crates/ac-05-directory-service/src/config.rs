//! Intake configuration.

use std::time::Duration;

/// Tunables for microblock intake.
#[derive(Clone, Debug)]
pub struct IntakeConfig {
    /// Exact microblock header version this node accepts.
    pub microblock_version: u32,
    /// Base lifetime of a consensus object; part of the timestamp window.
    pub consensus_object_timeout: Duration,
    /// Time allowed for shard microblock consensus; part of the timestamp
    /// window.
    pub microblock_timeout: Duration,
    /// Extra slack granted on the first tx epoch after a PoW round, when
    /// transaction distribution to shards is still in flight.
    pub extra_tx_distribute_time: Duration,
    /// Tx epochs per PoW round; decides when the extra slack applies.
    pub num_final_block_per_pow: u64,
    /// Lookup nodes relay only; intake is a success no-op for them.
    pub lookup_node_mode: bool,
}

impl IntakeConfig {
    /// Accepted distance between a microblock timestamp and the local clock
    /// at `current_epoch`.
    pub fn submission_window(&self, current_epoch: u64) -> Duration {
        let mut window = self.consensus_object_timeout + self.microblock_timeout;
        if current_epoch % self.num_final_block_per_pow == 0 {
            window += self.extra_tx_distribute_time;
        }
        window
    }

    /// Config for tests: tight windows, mainnet cadence.
    pub fn for_testing() -> Self {
        Self {
            consensus_object_timeout: Duration::from_secs(2),
            microblock_timeout: Duration::from_secs(2),
            extra_tx_distribute_time: Duration::from_secs(1),
            ..Self::default()
        }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            microblock_version: 1,
            consensus_object_timeout: Duration::from_secs(10),
            microblock_timeout: Duration::from_secs(30),
            extra_tx_distribute_time: Duration::from_secs(15),
            num_final_block_per_pow: 100,
            lookup_node_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_window_on_first_tx_epoch_after_pow() {
        let config = IntakeConfig::for_testing();
        let base = config.consensus_object_timeout + config.microblock_timeout;

        assert_eq!(config.submission_window(1), base);
        assert_eq!(
            config.submission_window(100),
            base + config.extra_tx_distribute_time
        );
        assert_eq!(
            config.submission_window(0),
            base + config.extra_tx_distribute_time
        );
    }
}
