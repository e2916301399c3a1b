//! The block type shared by both chains and its canonical byte encoding.

use crate::{
    crypto::{hash_bytes, id_from_hash},
    ChainType, CumulativeDifficulty, Hash, MainPayload, Payload, SpinePayload,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;


/// A block of either chain, parameterised by its payload.
///
/// `height` and `cumulative_difficulty` are assigned on push and are not part
/// of the byte encoding, so a popped block re-pushed onto the same parent
/// keeps its hash.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Block<P> {
    /// The first 8 bytes of `block_hash` as a little-endian `i64`.
    pub id: i64,
    /// Zero for genesis.
    pub height: u32,
    /// SHA-256 of the signed encoding.
    pub block_hash: Hash,
    /// `None` only for genesis.
    pub previous_block_hash: Option<Hash>,
    /// Seconds since `UNIX_EPOCH`.
    pub timestamp: i64,
    /// The producer's signature over the hash of the previous block's seed.
    pub block_seed: Vec<u8>,
    /// The producer's signature over the unsigned encoding.
    pub block_signature: Vec<u8>,
    /// The running score of the chain ending at this block.
    pub cumulative_difficulty: CumulativeDifficulty,
    /// The producer's compressed public key.
    pub blocksmith_public_key: Vec<u8>,
    /// The sum of transferred amounts.
    pub total_amount: i64,
    /// The sum of fees.
    pub total_fee: i64,
    /// The coinbase distributed by this block. Always zero on the spine chain.
    pub total_coinbase: i64,
    /// The block format version.
    pub version: u32,
    /// Length of the payload encoding.
    pub payload_length: u32,
    /// SHA-256 of the payload encoding.
    pub payload_hash: Hash,
    /// The chain specific contents.
    pub payload: P,
}

/// A block of either chain, shared behind an `Arc`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chain", content = "block", rename_all = "lowercase")]
pub enum AnyBlock {
    /// A main chain block.
    Main(Arc<Block<MainPayload>>),
    /// A spine chain block.
    Spine(Arc<Block<SpinePayload>>),
}

impl<P: Payload> Block<P> {
    /// The encoding covered by the block signature.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            4 + 8 * 4 + 4 + 32 + self.blocksmith_public_key.len() + self.block_seed.len() + 32,
        );
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.total_amount.to_le_bytes());
        buf.extend_from_slice(&self.total_fee.to_le_bytes());
        buf.extend_from_slice(&self.total_coinbase.to_le_bytes());
        buf.extend_from_slice(&self.payload_length.to_le_bytes());
        buf.extend_from_slice(&self.payload_hash);
        buf.extend_from_slice(&self.blocksmith_public_key);
        buf.extend_from_slice(&self.block_seed);
        buf.extend_from_slice(&self.previous_block_hash.unwrap_or_default());
        buf
    }

    /// The full encoding, including the signature.
    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = self.unsigned_bytes();
        buf.extend_from_slice(&self.block_signature);
        buf
    }

    /// Hash the signed encoding.
    pub fn compute_hash(&self) -> Hash {
        hash_bytes(&self.bytes())
    }

    /// Recompute `block_hash` and `id` from the current contents.
    pub fn seal(&mut self) {
        self.block_hash = self.compute_hash();
        self.id = id_from_hash(&self.block_hash);
    }

    /// Whether the payload length and hash match the payload.
    pub fn payload_matches(&self) -> bool {
        self.payload.summary() == (self.payload_length, self.payload_hash)
    }

    /// Whether this is the first block of its chain.
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }

    /// The chain this block belongs to.
    pub fn chain(&self) -> ChainType {
        P::CHAIN
    }
}

impl AnyBlock {
    /// The chain of the wrapped block.
    pub fn chain(&self) -> ChainType {
        match self {
            AnyBlock::Main(_) => ChainType::Main,
            AnyBlock::Spine(_) => ChainType::Spine,
        }
    }

    /// The height of the wrapped block.
    pub fn height(&self) -> u32 {
        match self {
            AnyBlock::Main(b) => b.height,
            AnyBlock::Spine(b) => b.height,
        }
    }

    /// The ID of the wrapped block.
    pub fn id(&self) -> i64 {
        match self {
            AnyBlock::Main(b) => b.id,
            AnyBlock::Spine(b) => b.id,
        }
    }

    /// The hash of the wrapped block.
    pub fn block_hash(&self) -> Hash {
        match self {
            AnyBlock::Main(b) => b.block_hash,
            AnyBlock::Spine(b) => b.block_hash,
        }
    }
}

impl<P: Payload> From<Block<P>> for AnyBlock {
    fn from(block: Block<P>) -> Self {
        P::into_any(Arc::new(block))
    }
}
