//! Leader selection.
//!
//! For every reference block each chain derives a deterministic order of the
//! eligible blocksmiths. The block following the reference may be produced by
//! the blocksmith of rank `r` once its smith time has passed.
//!
//! Both strategies cache the last computed order keyed by the identity of its
//! reference block. Reads of a cached order return a copy. A miss recomputes
//! under the exclusive side of the cache lock, so a reader never observes a
//! half built order.

use chain_db::QueryError;
use chain_types::{crypto::hash_bytes_iter, Block, Blocksmith, ChainParams, Payload};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

pub use main::{MainBlocksmithStrategy, RegistryBlocksmiths};
pub use spine::{SpineBlocksmithStrategy, SpineKeyBlocksmiths};

mod main;
mod spine;
#[cfg(test)]
mod tests;

/// The eligible blocksmiths of a chain as of a given height.
pub trait BlocksmithSource: Send + Sync {
    /// Blocksmiths eligible to build on top of the block at `height`.
    ///
    /// The returned blocksmiths have not yet had their seed or order computed.
    fn blocksmiths_at(&self, height: u32) -> Result<Vec<Blocksmith>, QueryError>;
}

/// Produces the smithing order of a chain.
pub trait BlocksmithStrategy<P: Payload>: Send + Sync {
    /// The order for the block following `reference`, from the cache when it
    /// was computed for the same reference.
    fn sorted(&self, reference: &Block<P>) -> SortedBlocksmiths;

    /// Recompute the order for `reference`, replacing the cached order.
    fn sort_blocksmiths(&self, reference: &Block<P>) -> SortedBlocksmiths;

    /// The earliest timestamp at which the blocksmith of `rank` may produce
    /// the block following `previous`.
    fn smith_time(&self, rank: usize, previous: &Block<P>) -> i64;

    /// Drop the cached order.
    fn invalidate(&self);

    /// The blocksmiths for the block following `reference` in smithing order.
    fn sorted_blocksmiths(&self, reference: &Block<P>) -> Vec<Blocksmith> {
        self.sorted(reference).into_blocksmiths()
    }

    /// Map from blocksmith public key to rank for the block following `reference`.
    fn sorted_blocksmiths_map(&self, reference: &Block<P>) -> HashMap<Vec<u8>, usize> {
        self.sorted(reference).ranks
    }
}

/// Blocksmiths in smithing order, indexed by public key.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SortedBlocksmiths {
    key: i64,
    blocksmiths: Vec<Blocksmith>,
    ranks: HashMap<Vec<u8>, usize>,
}

/// Shared caching logic of both strategies.
pub(crate) struct SmithingCache<S> {
    source: S,
    sorted: RwLock<Option<SortedBlocksmiths>>,
}

impl SortedBlocksmiths {
    /// Derive each blocksmith's seed and order from `reference_seed`, then sort
    /// by seed with ties broken by node ID.
    pub fn new(key: i64, reference_seed: &[u8], eligible: Vec<Blocksmith>) -> Self {
        let mut blocksmiths: Vec<_> = eligible
            .into_iter()
            .map(|mut b| {
                b.block_seed = blocksmith_seed(reference_seed, b.node_id);
                b.node_order = node_order(b.block_seed, b.score);
                b
            })
            .collect();
        blocksmiths.sort_by(|a, b| {
            a.block_seed
                .cmp(&b.block_seed)
                .then(a.node_id.cmp(&b.node_id))
        });
        let ranks = blocksmiths
            .iter()
            .enumerate()
            .map(|(rank, b)| (b.node_public_key.clone(), rank))
            .collect();
        Self {
            key,
            blocksmiths,
            ranks,
        }
    }

    /// The cache key of the reference block this order was computed for.
    pub fn key(&self) -> i64 {
        self.key
    }

    /// The blocksmiths in smithing order.
    pub fn blocksmiths(&self) -> &[Blocksmith] {
        &self.blocksmiths
    }

    /// Public key to rank.
    pub fn ranks(&self) -> &HashMap<Vec<u8>, usize> {
        &self.ranks
    }

    /// The rank of the blocksmith with the given public key.
    pub fn rank_of(&self, public_key: &[u8]) -> Option<usize> {
        self.ranks.get(public_key).copied()
    }

    pub fn len(&self) -> usize {
        self.blocksmiths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocksmiths.is_empty()
    }

    pub fn into_blocksmiths(self) -> Vec<Blocksmith> {
        self.blocksmiths
    }
}

impl<S: BlocksmithSource> SmithingCache<S> {
    pub(crate) fn new(source: S) -> Self {
        Self {
            source,
            sorted: RwLock::new(None),
        }
    }

    pub(crate) fn get(&self, key: i64, height: u32, reference_seed: &[u8]) -> SortedBlocksmiths {
        {
            let guard = self.sorted.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(sorted) = guard.as_ref().filter(|s| s.key == key) {
                return sorted.clone();
            }
        }
        self.compute(key, height, reference_seed, false)
    }

    /// Recompute under the write lock. Unless `force` is set, an order cached
    /// by another thread while waiting for the lock is returned instead.
    ///
    /// On a query failure the previous order is returned and kept.
    pub(crate) fn compute(
        &self,
        key: i64,
        height: u32,
        reference_seed: &[u8],
        force: bool,
    ) -> SortedBlocksmiths {
        let mut guard = self.sorted.write().unwrap_or_else(PoisonError::into_inner);
        if !force {
            if let Some(sorted) = guard.as_ref().filter(|s| s.key == key) {
                return sorted.clone();
            }
        }
        match self.source.blocksmiths_at(height) {
            Ok(eligible) => {
                let sorted = SortedBlocksmiths::new(key, reference_seed, eligible);
                *guard = Some(sorted.clone());
                sorted
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::error!("failed to query blocksmiths at height {height}: {_err}");
                guard.clone().unwrap_or_default()
            }
        }
    }

    pub(crate) fn invalidate(&self) {
        *self.sorted.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl<T: BlocksmithSource + ?Sized> BlocksmithSource for Arc<T> {
    fn blocksmiths_at(&self, height: u32) -> Result<Vec<Blocksmith>, QueryError> {
        (**self).blocksmiths_at(height)
    }
}

/// SHA-256 over `reference_seed || node_id` (big-endian), read as a
/// big-endian `u64` from the first 8 bytes.
pub fn blocksmith_seed(reference_seed: &[u8], node_id: i64) -> u64 {
    let id = node_id.to_be_bytes();
    let hash = hash_bytes_iter([reference_seed, &id[..]]);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(prefix)
}

/// `(block_seed << 32) / max(score, 1)`.
pub fn node_order(block_seed: u64, score: u64) -> u128 {
    (u128::from(block_seed) << 32) / u128::from(score.max(1))
}

/// `previous_timestamp + smithing_period + rank * blocksmith_time_gap`.
pub fn smith_time(params: &ChainParams, previous_timestamp: i64, rank: usize) -> i64 {
    let rank = i64::try_from(rank).unwrap_or(i64::MAX);
    previous_timestamp
        .saturating_add(params.smithing_period)
        .saturating_add(rank.saturating_mul(params.blocksmith_time_gap))
}

/// The first `winners` blocksmiths by ascending node order, ties broken by
/// node ID. Independent of the smithing order.
pub fn coinbase_lottery_winners(blocksmiths: &[Blocksmith], winners: usize) -> Vec<Blocksmith> {
    let mut by_order = blocksmiths.to_vec();
    by_order.sort_by(|a, b| {
        a.node_order
            .cmp(&b.node_order)
            .then(a.node_id.cmp(&b.node_id))
    });
    by_order.truncate(winners);
    by_order
}

/// Split `total_coinbase` evenly between the winners as `(node_id, amount)`.
///
/// The remainder of the division goes to the first winner.
pub fn coinbase_shares(total_coinbase: i64, winners: &[Blocksmith]) -> Vec<(i64, i64)> {
    let Ok(count) = i64::try_from(winners.len()) else {
        return vec![];
    };
    if count == 0 || total_coinbase <= 0 {
        return vec![];
    }
    let share = total_coinbase / count;
    let remainder = total_coinbase % count;
    winners
        .iter()
        .enumerate()
        .map(|(ix, w)| {
            let amount = if ix == 0 { share + remainder } else { share };
            (w.node_id, amount)
        })
        .collect()
}
