//! The chain state machine.
//!
//! A [`BlockService`] owns the canonical chain of one payload type. Blocks
//! become canonical only through [`BlockService::push`] and leave it only
//! through [`BlockService::pop_off_to_block`]. Both run under the service's
//! write lock and emit their events after the lock is released.

use crate::{
    error::{BlockRef, ChainError, ValidationError},
    mempool::Mempool,
    payload::ChainPayload,
    smith::BlocksmithStrategy,
};
use chain_db::{pool::ConnectionPool, with_tx};
use chain_types::{
    crypto::{self, id_from_hash},
    event::EventSink,
    Block, ChainParams, ChainType, Genesis, Hash,
};
use secp256k1::SecretKey;
use std::sync::{Arc, Mutex, MutexGuard};


/// Block production and storage for the chain carrying payload `P`.
pub struct BlockService<P: ChainPayload> {
    pool: ConnectionPool,
    params: ChainParams,
    strategy: Arc<dyn BlocksmithStrategy<P>>,
    events: Arc<dyn EventSink>,
    mempool: Option<Arc<dyn Mempool>>,
    write_lock: Mutex<()>,
}

/// The caller-chosen fields of a new block.
#[derive(Clone, Debug)]
pub struct BlockParams<'a, P> {
    /// The block being built upon.
    pub previous: &'a Block<P>,
    pub timestamp: i64,
    pub payload: P,
    /// Always zero on the spine chain.
    pub total_coinbase: i64,
}

impl<P: ChainPayload> BlockService<P> {
    pub fn new(
        pool: ConnectionPool,
        params: ChainParams,
        strategy: Arc<dyn BlocksmithStrategy<P>>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            pool,
            params,
            strategy,
            events,
            mempool: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Remove pushed and restore popped transactions through `mempool`.
    pub fn with_mempool(mut self, mempool: Arc<dyn Mempool>) -> Self {
        self.mempool = Some(mempool);
        self
    }

    pub fn chain(&self) -> ChainType {
        P::CHAIN
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn strategy(&self) -> &dyn BlocksmithStrategy<P> {
        &*self.strategy
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub(crate) fn mempool(&self) -> Option<&dyn Mempool> {
        self.mempool.as_deref()
    }

    /// Build and sign a block on top of `params.previous`.
    ///
    /// The height is set to the successor of the previous block. The
    /// cumulative difficulty is carried over from the previous block and only
    /// assigned on push.
    pub fn construct_block(&self, params: BlockParams<'_, P>, secret_key: &SecretKey) -> Block<P> {
        let BlockParams {
            previous,
            timestamp,
            payload,
            total_coinbase,
        } = params;
        let (total_amount, total_fee) = payload.totals();
        let (payload_length, payload_hash) = payload.summary();
        let mut block = Block {
            id: 0,
            height: previous.height + 1,
            block_hash: [0; 32],
            previous_block_hash: Some(previous.block_hash),
            timestamp,
            block_seed: crypto::sign(&previous.block_seed, secret_key),
            block_signature: vec![],
            cumulative_difficulty: previous.cumulative_difficulty,
            blocksmith_public_key: crypto::public_key(secret_key),
            total_amount,
            total_fee,
            total_coinbase,
            version: self.params.block_version,
            payload_length,
            payload_hash,
            payload,
        };
        block.block_signature = crypto::sign(&block.unsigned_bytes(), secret_key);
        block.seal();
        block
    }

    /// The genesis block of this chain as described by `genesis`.
    pub fn construct_genesis_block(&self, genesis: &Genesis) -> Block<P> {
        genesis.block::<P>()
    }

    /// Check that `candidate` may follow `previous`.
    ///
    /// Checks run in a fixed order and the first failure is returned.
    pub fn validate(
        &self,
        candidate: &Block<P>,
        previous: &Block<P>,
        observed_time: i64,
    ) -> Result<(), ChainError> {
        if candidate.timestamp > observed_time.saturating_add(self.params.max_clock_skew) {
            return Err(ValidationError::InvalidTimestamp {
                timestamp: candidate.timestamp,
                observed: observed_time,
            }
            .into());
        }

        let sorted = self.strategy.sorted(previous);
        let rank = sorted
            .rank_of(&candidate.blocksmith_public_key)
            .ok_or(ValidationError::InvalidBlocksmith)?;

        let smith_time = self.strategy.smith_time(rank, previous);
        if smith_time > candidate.timestamp {
            return Err(ValidationError::InvalidSmithTime {
                timestamp: candidate.timestamp,
                smith_time,
            }
            .into());
        }

        if id_from_hash(&candidate.compute_hash()) == 0 {
            return Err(ValidationError::InvalidId.into());
        }

        if !crypto::verify(
            &candidate.unsigned_bytes(),
            &candidate.block_signature,
            &candidate.blocksmith_public_key,
        ) {
            return Err(ValidationError::InvalidSignature.into());
        }

        if candidate.previous_block_hash != Some(previous.block_hash) {
            return Err(ValidationError::InvalidPreviousBlockHash.into());
        }

        let height = previous.height + 1;
        let difficulty = previous
            .cumulative_difficulty
            .next(self.base_difficulty(), rank)
            .ok_or(ValidationError::InvalidCumulativeDifficulty { height })?;
        let conn = self.pool.acquire();
        if let Some(existing) = chain_db::get_block_by_height::<P>(&conn, height)? {
            if existing.cumulative_difficulty > difficulty {
                return Err(ValidationError::InvalidCumulativeDifficulty { height }.into());
            }
        }

        if !candidate.payload_matches() {
            return Err(ValidationError::InvalidPayload.into());
        }
        Ok(())
    }

    /// Make `candidate` the successor of `previous` on the canonical chain.
    ///
    /// `previous` must still be the stored tip and the candidate must name it
    /// as its parent. Height and cumulative difficulty are assigned here.
    /// Returns the stored block.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(chain = %P::CHAIN)))]
    pub fn push(
        &self,
        previous: &Block<P>,
        candidate: Block<P>,
        broadcast: bool,
    ) -> Result<Block<P>, ChainError> {
        let guard = self.lock()?;
        let block = self.push_locked(previous, candidate)?;
        drop(guard);
        self.emit_pushed(&block, broadcast);
        Ok(block)
    }

    /// Pop every block above `common` off the chain, newest first.
    ///
    /// Returns an empty list if `common` lies below the rollback floor.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(chain = %P::CHAIN)))]
    pub fn pop_off_to_block(&self, common: &Block<P>) -> Result<Vec<Block<P>>, ChainError> {
        let guard = self.lock()?;
        let popped = self.pop_off_locked(common)?;
        drop(guard);
        self.emit_popped(common.height, &popped);
        Ok(popped)
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, ()>, ChainError> {
        self.write_lock.lock().map_err(|_| ChainError::LockPoisoned)
    }

    pub(crate) fn push_locked(
        &self,
        previous: &Block<P>,
        mut block: Block<P>,
    ) -> Result<Block<P>, ChainError> {
        let tip = chain_db::get_last_block::<P>(&self.pool.acquire())?
            .ok_or(ChainError::not_found(P::CHAIN, BlockRef::Tip))?;
        if tip.block_hash != previous.block_hash {
            return Err(ChainError::StaleTip {
                chain: P::CHAIN,
                expected: previous.height,
                found: tip.height,
            });
        }
        if block.previous_block_hash != Some(previous.block_hash) {
            return Err(ValidationError::InvalidPreviousBlockHash.into());
        }

        let sorted = self.strategy.sorted(previous);
        let rank = sorted
            .rank_of(&block.blocksmith_public_key)
            .ok_or(ValidationError::BlocksmithNotInSmithingList)?;
        block.height = previous.height + 1;
        block.cumulative_difficulty = previous
            .cumulative_difficulty
            .next(self.base_difficulty(), rank)
            .ok_or(ChainError::DifficultyOverflow)?;
        block.seal();

        let mut conn = self.pool.acquire();
        with_tx(&mut conn, |tx| {
            chain_db::insert_block(tx, &block)?;
            P::record_push(tx, &block, &sorted, &self.params)
        })?;
        self.strategy.invalidate();

        if let Some(mempool) = &self.mempool {
            if let Err(_err) = mempool.remove_transactions(block.payload.transactions()) {
                #[cfg(feature = "tracing")]
                tracing::warn!("failed to remove pushed transactions from mempool: {_err}");
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "pushed {} block {} at height {} (rank {rank})",
            P::CHAIN,
            block.id,
            block.height
        );
        Ok(block)
    }

    pub(crate) fn pop_off_locked(&self, common: &Block<P>) -> Result<Vec<Block<P>>, ChainError> {
        let mut conn = self.pool.acquire();
        let tip = chain_db::get_last_block::<P>(&conn)?
            .ok_or(ChainError::not_found(P::CHAIN, BlockRef::Tip))?;
        let floor = P::rollback_floor(&conn, &tip, &self.params)?;
        if common.height < floor {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "refusing to pop {} chain off to height {} below rollback floor {floor}",
                P::CHAIN,
                common.height,
            );
            return Ok(vec![]);
        }

        let stored = chain_db::get_block_by_height::<P>(&conn, common.height)?;
        if stored.map(|b| b.block_hash) != Some(common.block_hash) {
            return Err(ChainError::not_found(
                P::CHAIN,
                BlockRef::Hash(common.block_hash),
            ));
        }
        if common.height >= tip.height {
            return Ok(vec![]);
        }

        let popped = with_tx(&mut conn, |tx| {
            let popped = chain_db::list_blocks_above_height::<P>(tx, common.height)?;
            chain_db::rollback_to_height::<P>(tx, common.height)?;
            Ok::<_, ChainError>(popped)
        })?;
        self.strategy.invalidate();

        if let Some(mempool) = &self.mempool {
            let txs = popped
                .iter()
                .flat_map(|b| b.payload.transactions().iter().cloned())
                .collect();
            if let Err(_err) = mempool.backup_transactions(txs) {
                #[cfg(feature = "tracing")]
                tracing::warn!("failed to back up popped transactions: {_err}");
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            "popped {} {} blocks off to height {}",
            popped.len(),
            P::CHAIN,
            common.height
        );
        Ok(popped)
    }

    pub(crate) fn emit_pushed(&self, block: &Block<P>, broadcast: bool) {
        let block = P::into_any(Arc::new(block.clone()));
        if broadcast {
            self.events.broadcast_block(block.clone());
        }
        self.events.block_pushed(block);
    }

    pub(crate) fn emit_popped(&self, common_height: u32, popped: &[Block<P>]) {
        if popped.is_empty() {
            return;
        }
        let popped = popped
            .iter()
            .map(|b| P::into_any(Arc::new(b.clone())))
            .collect();
        self.events.blocks_popped_off(P::CHAIN, common_height, popped);
    }

    fn base_difficulty(&self) -> u128 {
        u128::from(self.params.cumulative_difficulty_base)
    }
}

/// Read access. None of these take the write lock.
impl<P: ChainPayload> BlockService<P> {
    /// The block at the greatest height.
    pub fn last_block(&self) -> Result<Block<P>, ChainError> {
        let conn = self.pool.acquire();
        chain_db::get_last_block::<P>(&conn)?.ok_or(ChainError::not_found(P::CHAIN, BlockRef::Tip))
    }

    pub fn block_by_height(&self, height: u32) -> Result<Block<P>, ChainError> {
        let conn = self.pool.acquire();
        chain_db::get_block_by_height::<P>(&conn, height)?
            .ok_or(ChainError::not_found(P::CHAIN, BlockRef::Height(height)))
    }

    pub fn block_by_id(&self, id: i64) -> Result<Block<P>, ChainError> {
        let conn = self.pool.acquire();
        chain_db::get_block_by_id::<P>(&conn, id)?
            .ok_or(ChainError::not_found(P::CHAIN, BlockRef::Id(id)))
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Result<Block<P>, ChainError> {
        let conn = self.pool.acquire();
        chain_db::get_block_by_hash::<P>(&conn, hash)?
            .ok_or(ChainError::not_found(P::CHAIN, BlockRef::Hash(*hash)))
    }

    /// Up to `limit` blocks from `height` upward, in ascending order.
    pub fn blocks_from_height(&self, height: u32, limit: u32) -> Result<Vec<Block<P>>, ChainError> {
        let conn = self.pool.acquire();
        Ok(chain_db::list_blocks_from_height::<P>(&conn, height, limit)?)
    }

    pub fn genesis_block(&self) -> Result<Block<P>, ChainError> {
        let conn = self.pool.acquire();
        chain_db::get_block_by_height::<P>(&conn, 0)?.ok_or(ChainError::GenesisNotFound(P::CHAIN))
    }

    /// The `limit` most recent blocks, newest first.
    pub fn blocks(&self, limit: u32) -> Result<Vec<Block<P>>, ChainError> {
        let conn = self.pool.acquire();
        Ok(chain_db::list_latest_blocks::<P>(&conn, limit)?)
    }
}
