use super::{smith_time, BlocksmithSource, BlocksmithStrategy, SmithingCache, SortedBlocksmiths};
use chain_db::{pool::ConnectionPool, QueryError};
use chain_types::{Block, Blocksmith, ChainParams, MainPayload};

/// Registered nodes with a positive participation score.
#[derive(Clone)]
pub struct RegistryBlocksmiths {
    pool: ConnectionPool,
}

/// Leader selection for the main chain.
///
/// The order is cached by reference block height.
pub struct MainBlocksmithStrategy<S = RegistryBlocksmiths> {
    params: ChainParams,
    cache: SmithingCache<S>,
}

impl RegistryBlocksmiths {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

impl BlocksmithSource for RegistryBlocksmiths {
    fn blocksmiths_at(&self, height: u32) -> Result<Vec<Blocksmith>, QueryError> {
        let conn = self.pool.acquire();
        let nodes = chain_db::list_registered_nodes_at(&conn, height)?;
        Ok(nodes.into_iter().map(Blocksmith::from).collect())
    }
}

impl<S: BlocksmithSource> MainBlocksmithStrategy<S> {
    pub fn new(source: S, params: ChainParams) -> Self {
        Self {
            params,
            cache: SmithingCache::new(source),
        }
    }
}

impl<S: BlocksmithSource> BlocksmithStrategy<MainPayload> for MainBlocksmithStrategy<S> {
    fn sorted(&self, reference: &Block<MainPayload>) -> SortedBlocksmiths {
        self.cache.get(
            i64::from(reference.height),
            reference.height,
            &reference.block_seed,
        )
    }

    fn sort_blocksmiths(&self, reference: &Block<MainPayload>) -> SortedBlocksmiths {
        self.cache.compute(
            i64::from(reference.height),
            reference.height,
            &reference.block_seed,
            true,
        )
    }

    fn smith_time(&self, rank: usize, previous: &Block<MainPayload>) -> i64 {
        smith_time(&self.params, previous.timestamp, rank)
    }

    fn invalidate(&self) {
        self.cache.invalidate();
    }
}
