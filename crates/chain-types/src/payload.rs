//! The chain-specific contents of a block.

use crate::{
    block::{AnyBlock, Block},
    crypto::{hash_bytes, id_from_hash},
    BatchReceipt, ChainType, Genesis, Hash,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc};

/// The payload carried by blocks of one chain.
///
/// Implemented by [`MainPayload`] and [`SpinePayload`].
pub trait Payload:
    Clone + Debug + Default + Eq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The chain whose blocks carry this payload.
    const CHAIN: ChainType;

    /// The byte encoding committed to by the block's payload hash.
    fn to_bytes(&self) -> Vec<u8>;

    /// The payload of this chain's genesis block.
    fn from_genesis(genesis: &Genesis) -> Self;

    /// Wrap a block of this chain for chain-agnostic consumers.
    fn into_any(block: Arc<Block<Self>>) -> AnyBlock;

    /// The `(total_amount, total_fee)` carried by the payload.
    fn totals(&self) -> (i64, i64) {
        (0, 0)
    }

    /// The payload length and hash committed to by a block header.
    fn summary(&self) -> (u32, Hash) {
        let bytes = self.to_bytes();
        let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        (len, hash_bytes(&bytes))
    }
}

/// An opaque transaction. The core only cares about its identity and totals.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Derived from the hash of `bytes`.
    pub id: i64,
    /// The fee paid to the blocksmith.
    pub fee: i64,
    /// The amount transferred.
    pub amount: i64,
    /// The signed transaction bytes.
    pub bytes: Vec<u8>,
}

/// A batch receipt included in a main block.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct PublishedReceipt {
    /// The receipt itself.
    pub receipt: BatchReceipt,
    /// The height of the main block publishing the receipt.
    pub block_height: u32,
    /// The position of the receipt within its block.
    pub published_index: u32,
}

/// Whether a spine public key entry registers or revokes a key.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum PublicKeyAction {
    /// The key may smith spine blocks from the entry's height onward.
    #[default]
    Add,
    /// The key is revoked from the entry's height onward.
    Remove,
}

/// A spine public key entry, carried in spine blocks.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct SpinePublicKey {
    /// The node's registration public key.
    pub node_public_key: Vec<u8>,
    /// The node's numeric identifier.
    pub node_id: i64,
    /// Whether the key is added or removed.
    pub public_key_action: PublicKeyAction,
    /// The main chain height at which the registration change happened.
    pub main_block_height: u32,
    /// The spine block height that carries this entry.
    #[serde(default)]
    pub height: u32,
    /// Whether this is the most recent entry for the node.
    #[serde(default)]
    pub latest: bool,
}

/// The payload of a main chain block.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct MainPayload {
    /// Transactions included in the block.
    pub transactions: Vec<Transaction>,
    /// Receipts published in the block.
    pub published_receipts: Vec<PublishedReceipt>,
}

/// The payload of a spine chain block.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct SpinePayload {
    /// Spine public key changes included in the block.
    pub spine_public_keys: Vec<SpinePublicKey>,
}

impl Transaction {
    /// Create a transaction, deriving its ID from its bytes.
    pub fn new(bytes: Vec<u8>, fee: i64, amount: i64) -> Self {
        let id = id_from_hash(&hash_bytes(&bytes));
        Self {
            id,
            fee,
            amount,
            bytes,
        }
    }
}

impl PublishedReceipt {
    /// The byte encoding of the published receipt.
    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = self.receipt.bytes();
        buf.extend_from_slice(&self.block_height.to_le_bytes());
        buf.extend_from_slice(&self.published_index.to_le_bytes());
        buf
    }
}

impl PublicKeyAction {
    /// The numeric code used in byte encodings and storage.
    pub fn code(&self) -> u32 {
        match self {
            PublicKeyAction::Add => 0,
            PublicKeyAction::Remove => 1,
        }
    }

    /// The action for a numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(PublicKeyAction::Add),
            1 => Some(PublicKeyAction::Remove),
            _ => None,
        }
    }
}

impl SpinePublicKey {
    /// The byte encoding of the entry.
    ///
    /// `height` and `latest` are storage bookkeeping and are not encoded.
    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.node_public_key.len() + 16);
        buf.extend_from_slice(&self.node_public_key);
        buf.extend_from_slice(&self.public_key_action.code().to_le_bytes());
        buf.extend_from_slice(&self.main_block_height.to_le_bytes());
        buf.extend_from_slice(&self.node_id.to_le_bytes());
        buf
    }
}

impl MainPayload {
    /// The sum of all transaction amounts.
    pub fn total_amount(&self) -> i64 {
        self.transactions
            .iter()
            .fold(0i64, |acc, tx| acc.saturating_add(tx.amount))
    }

    /// The sum of all transaction fees.
    pub fn total_fee(&self) -> i64 {
        self.transactions
            .iter()
            .fold(0i64, |acc, tx| acc.saturating_add(tx.fee))
    }
}

impl Payload for MainPayload {
    const CHAIN: ChainType = ChainType::Main;

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![];
        for tx in &self.transactions {
            buf.extend_from_slice(&tx.bytes);
        }
        for receipt in &self.published_receipts {
            buf.extend(receipt.bytes());
        }
        buf
    }

    fn totals(&self) -> (i64, i64) {
        (self.total_amount(), self.total_fee())
    }

    fn from_genesis(genesis: &Genesis) -> Self {
        let transactions = genesis
            .main
            .transactions
            .iter()
            .map(|tx| Transaction::new(tx.bytes.clone(), tx.fee, tx.amount))
            .collect();
        Self {
            transactions,
            published_receipts: vec![],
        }
    }

    fn into_any(block: Arc<Block<Self>>) -> AnyBlock {
        AnyBlock::Main(block)
    }
}

impl Payload for SpinePayload {
    const CHAIN: ChainType = ChainType::Spine;

    fn to_bytes(&self) -> Vec<u8> {
        self.spine_public_keys
            .iter()
            .flat_map(SpinePublicKey::bytes)
            .collect()
    }

    fn from_genesis(genesis: &Genesis) -> Self {
        let spine_public_keys = genesis
            .nodes
            .iter()
            .map(|node| SpinePublicKey {
                node_public_key: node.node_public_key.clone(),
                node_id: node.node_id,
                public_key_action: PublicKeyAction::Add,
                main_block_height: 0,
                height: 0,
                latest: true,
            })
            .collect();
        Self { spine_public_keys }
    }

    fn into_any(block: Arc<Block<Self>>) -> AnyBlock {
        AnyBlock::Spine(block)
    }
}
