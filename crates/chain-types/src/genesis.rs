use crate::{
    crypto::{hash_bytes, id_from_hash},
    hex_bytes, Block, ChainParams, ChainType, CumulativeDifficulty, Payload,
};
use serde::{Deserialize, Serialize};

/// The default genesis configuration.
pub const DEFAULT_GENESIS: &str = include_str!("../../../genesis.yml");

/// Describes how to construct the first block of each chain, along with the
/// nodes allowed to smith from the start and each chain's protocol constants.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Genesis {
    /// The main chain genesis block constants.
    pub main: GenesisBlock,
    /// The spine chain genesis block constants.
    pub spine: GenesisBlock,
    /// Nodes registered at genesis.
    ///
    /// They are inserted into the main chain node registry and become the
    /// initial spine public keys.
    pub nodes: Vec<GenesisNode>,
    /// Main chain protocol constants.
    #[serde(default = "ChainParams::main")]
    pub main_params: ChainParams,
    /// Spine chain protocol constants.
    #[serde(default = "ChainParams::spine")]
    pub spine_params: ChainParams,
}

/// The verbatim constants of a genesis block.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GenesisBlock {
    /// Seconds since `UNIX_EPOCH`.
    pub timestamp: i64,
    /// The starting difficulty of the chain.
    pub cumulative_difficulty: CumulativeDifficulty,
    /// Hex encoded.
    #[serde(with = "hex_bytes")]
    pub block_seed: Vec<u8>,
    /// Hex encoded.
    #[serde(with = "hex_bytes")]
    pub block_signature: Vec<u8>,
    /// Hex encoded.
    #[serde(with = "hex_bytes")]
    pub blocksmith_public_key: Vec<u8>,
    /// Transactions included in the block. Only meaningful for the main chain.
    #[serde(default)]
    pub transactions: Vec<GenesisTransaction>,
}

/// A transaction included in the main chain genesis block.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GenesisTransaction {
    /// Hex encoded transaction bytes.
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
    /// The fee paid.
    #[serde(default)]
    pub fee: i64,
    /// The amount transferred.
    #[serde(default)]
    pub amount: i64,
}

/// A node registered at genesis.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GenesisNode {
    /// The node's numeric identifier.
    pub node_id: i64,
    /// Hex encoded compressed public key.
    #[serde(with = "hex_bytes")]
    pub node_public_key: Vec<u8>,
    /// The node's starting participation score.
    pub participation_score: u64,
}

impl Genesis {
    /// The genesis block constants for the given chain.
    pub fn block_constants(&self, chain: ChainType) -> &GenesisBlock {
        match chain {
            ChainType::Main => &self.main,
            ChainType::Spine => &self.spine,
        }
    }

    /// The protocol constants for the given chain.
    pub fn params(&self, chain: ChainType) -> &ChainParams {
        match chain {
            ChainType::Main => &self.main_params,
            ChainType::Spine => &self.spine_params,
        }
    }

    /// Produce the genesis [`Block`] of the chain carrying payload `P`.
    ///
    /// Seed, signature and difficulty are taken verbatim. The hash and ID are
    /// derived from the content.
    pub fn block<P: Payload>(&self) -> Block<P> {
        let constants = self.block_constants(P::CHAIN);
        let payload = P::from_genesis(self);
        let payload_bytes = payload.to_bytes();
        let (total_amount, total_fee) = payload.totals();
        let mut block = Block {
            id: 0,
            height: 0,
            block_hash: [0; 32],
            previous_block_hash: None,
            timestamp: constants.timestamp,
            block_seed: constants.block_seed.clone(),
            block_signature: constants.block_signature.clone(),
            cumulative_difficulty: constants.cumulative_difficulty,
            blocksmith_public_key: constants.blocksmith_public_key.clone(),
            total_amount,
            total_fee,
            total_coinbase: 0,
            version: self.params(P::CHAIN).block_version,
            payload_length: u32::try_from(payload_bytes.len()).unwrap_or(u32::MAX),
            payload_hash: hash_bytes(&payload_bytes),
            payload,
        };
        block.block_hash = block.compute_hash();
        block.id = id_from_hash(&block.block_hash);
        block
    }
}

impl Default for Genesis {
    fn default() -> Self {
        serde_yaml::from_str(DEFAULT_GENESIS)
            .expect("default `genesis.yml` must be valid (checked in tests)")
    }
}
