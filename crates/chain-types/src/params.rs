use crate::ChainType;
use serde::{Deserialize, Serialize};

/// Protocol constants for one chain.
///
/// Times are in seconds.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    /// Block format version written by this node.
    pub block_version: u32,
    /// Minimum time between a block and its successor for the top ranked blocksmith.
    pub smithing_period: i64,
    /// Extra time granted to each following rank.
    pub blocksmith_time_gap: i64,
    /// How far in the future a candidate's timestamp may be.
    pub max_clock_skew: i64,
    /// How many blocks below the tip may be popped off.
    pub max_rollback_blocks: u32,
    /// The cumulative difficulty added by a rank `0` block.
    pub cumulative_difficulty_base: u64,
    /// How many blocksmiths share the coinbase of a block.
    pub coinbase_lottery_winners: usize,
    /// The coinbase minted by each block.
    pub coinbase_reward: i64,
    /// How long a snapshot may take to generate before its megablock expires.
    pub snapshot_generation_timeout: i64,
    /// The score given to every eligible blocksmith when the chain has no
    /// participation scores of its own.
    pub blocksmith_score: u64,
}

impl ChainParams {
    /// Main chain defaults.
    pub fn main() -> Self {
        Self {
            block_version: 1,
            smithing_period: 15,
            blocksmith_time_gap: 10,
            max_clock_skew: 30,
            max_rollback_blocks: 720,
            cumulative_difficulty_base: 1_000_000_000,
            coinbase_lottery_winners: 5,
            coinbase_reward: 5_000_000_000,
            snapshot_generation_timeout: 1_200,
            blocksmith_score: 1,
        }
    }

    /// Spine chain defaults.
    pub fn spine() -> Self {
        Self {
            block_version: 1,
            smithing_period: 300,
            blocksmith_time_gap: 60,
            max_clock_skew: 30,
            max_rollback_blocks: 10,
            cumulative_difficulty_base: 1_000_000_000,
            coinbase_lottery_winners: 0,
            coinbase_reward: 0,
            snapshot_generation_timeout: 1_200,
            blocksmith_score: 100_000_000,
        }
    }

    /// The defaults for the given chain.
    pub fn for_chain(chain: ChainType) -> Self {
        match chain {
            ChainType::Main => Self::main(),
            ChainType::Spine => Self::spine(),
        }
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::main()
    }
}
