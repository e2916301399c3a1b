use super::{smith_time, BlocksmithSource, BlocksmithStrategy, SmithingCache, SortedBlocksmiths};
use chain_db::{pool::ConnectionPool, QueryError};
use chain_types::{Block, Blocksmith, ChainParams, SpinePayload};

/// Nodes whose latest spine public key entry is an `Add`.
///
/// Every spine blocksmith is given the same score.
#[derive(Clone)]
pub struct SpineKeyBlocksmiths {
    pool: ConnectionPool,
    score: u64,
}

/// Leader selection for the spine chain.
///
/// Spine genesis reuses height zero across resets, so the order is cached by
/// reference block ID instead of height.
pub struct SpineBlocksmithStrategy<S = SpineKeyBlocksmiths> {
    params: ChainParams,
    cache: SmithingCache<S>,
}

impl SpineKeyBlocksmiths {
    pub fn new(pool: ConnectionPool, score: u64) -> Self {
        Self { pool, score }
    }
}

impl BlocksmithSource for SpineKeyBlocksmiths {
    fn blocksmiths_at(&self, height: u32) -> Result<Vec<Blocksmith>, QueryError> {
        let conn = self.pool.acquire();
        let keys = chain_db::list_active_spine_public_keys_at(&conn, height)?;
        Ok(keys
            .into_iter()
            .map(|key| Blocksmith::new(key.node_id, key.node_public_key, self.score))
            .collect())
    }
}

impl<S: BlocksmithSource> SpineBlocksmithStrategy<S> {
    pub fn new(source: S, params: ChainParams) -> Self {
        Self {
            params,
            cache: SmithingCache::new(source),
        }
    }
}

impl<S: BlocksmithSource> BlocksmithStrategy<SpinePayload> for SpineBlocksmithStrategy<S> {
    fn sorted(&self, reference: &Block<SpinePayload>) -> SortedBlocksmiths {
        self.cache
            .get(reference.id, reference.height, &reference.block_seed)
    }

    fn sort_blocksmiths(&self, reference: &Block<SpinePayload>) -> SortedBlocksmiths {
        self.cache
            .compute(reference.id, reference.height, &reference.block_seed, true)
    }

    fn smith_time(&self, rank: usize, previous: &Block<SpinePayload>) -> i64 {
        smith_time(&self.params, previous.timestamp, rank)
    }

    fn invalidate(&self) {
        self.cache.invalidate();
    }
}
