use chain_db::QueryError;
use chain_types::{ChainType, Hash};
use std::fmt;
use thiserror::Error;

/// Node creation failed.
#[derive(Debug, Error)]
pub enum NewError {
    #[error("connection pool creation failed: {0}")]
    ConnPool(#[from] rusqlite::Error),
    #[error("genesis bootstrap failed: {0}")]
    Genesis(#[from] ChainError),
}

/// A candidate block was rejected. The chain is left untouched.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ValidationError {
    #[error("block timestamp {timestamp} is ahead of observed time {observed}")]
    InvalidTimestamp { timestamp: i64, observed: i64 },
    #[error("blocksmith is not in the smithing order of the previous block")]
    InvalidBlocksmith,
    #[error("block timestamp {timestamp} is before the blocksmith's smith time {smith_time}")]
    InvalidSmithTime { timestamp: i64, smith_time: i64 },
    #[error("block ID derived from the block hash is zero")]
    InvalidId,
    #[error("block signature does not verify against the blocksmith public key")]
    InvalidSignature,
    #[error("previous block hash does not match the chain tip")]
    InvalidPreviousBlockHash,
    #[error("existing block at height {height} has a greater cumulative difficulty")]
    InvalidCumulativeDifficulty { height: u32 },
    #[error("payload does not match the committed payload hash and length")]
    InvalidPayload,
    #[error("blocksmith is not in the smithing list")]
    BlocksmithNotInSmithingList,
}

/// A block lookup that found nothing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockRef {
    Tip,
    Height(u32),
    Id(i64),
    Hash(Hash),
}

/// Any failure of a chain operation.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("database error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("{chain} block not found: {at}")]
    BlockNotFound { chain: ChainType, at: BlockRef },
    #[error("{0} genesis block not found")]
    GenesisNotFound(ChainType),
    #[error("stored {0} genesis block does not match the configured genesis")]
    GenesisMismatch(ChainType),
    #[error("{chain} tip moved from height {expected} to {found} before the push")]
    StaleTip {
        chain: ChainType,
        expected: u32,
        found: u32,
    },
    #[error("a chain lock was poisoned")]
    LockPoisoned,
    #[error("cumulative difficulty overflowed")]
    DifficultyOverflow,
    #[error(transparent)]
    Mempool(#[from] MempoolError),
}

/// A received block was not accepted.
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("received block has no previous block hash")]
    MissingPreviousBlockHash,
    #[error("a receipt was already issued for this block and sender")]
    BlockAlreadyReceipted,
    #[error("received block does not extend or compete with the local tip")]
    InvalidBranch,
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Receipt(#[from] ReceiptError),
}

/// Receipt generation failed.
#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("a receipt was already issued for this block and sender")]
    AlreadyIssued,
    #[error("failed to record receipt marker: {0}")]
    Marker(#[from] rusqlite::Error),
}

/// Mempool access failed.
#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("mempool lock was poisoned")]
    LockPoisoned,
}

impl ChainError {
    pub(crate) fn not_found(chain: ChainType, at: BlockRef) -> Self {
        Self::BlockNotFound { chain, at }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tip => write!(f, "tip"),
            Self::Height(h) => write!(f, "height {h}"),
            Self::Id(id) => write!(f, "id {id}"),
            Self::Hash(hash) => {
                write!(f, "hash ")?;
                hash.iter().try_for_each(|b| write!(f, "{b:02x}"))
            }
        }
    }
}
