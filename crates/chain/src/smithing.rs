//! Local block production.

use crate::{
    block_service::{BlockParams, BlockService},
    error::ChainError,
    payload::ChainPayload,
    status::ChainStatus,
};
use chain_types::{crypto, Block};
use secp256k1::SecretKey;
use std::sync::Arc;

/// Produces blocks on one chain with the local node's key whenever its turn comes.
pub struct Smither<P: ChainPayload> {
    service: Arc<BlockService<P>>,
    status: Arc<ChainStatus>,
    secret_key: SecretKey,
    public_key: Vec<u8>,
}

impl<P: ChainPayload> Smither<P> {
    pub fn new(service: Arc<BlockService<P>>, status: Arc<ChainStatus>, secret_key: SecretKey) -> Self {
        Self {
            service,
            status,
            public_key: crypto::public_key(&secret_key),
            secret_key,
        }
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// This node's rank and smith time for the block following `tip`.
    pub fn next_slot(&self, tip: &Block<P>) -> Option<(usize, i64)> {
        let strategy = self.service.strategy();
        let rank = strategy.sorted(tip).rank_of(&self.public_key)?;
        Some((rank, strategy.smith_time(rank, tip)))
    }

    /// Smith and push a block on the current tip if this node's smith time
    /// has come by `now`.
    ///
    /// Does nothing while the chain is downloading or another attempt is in
    /// progress. Losing the tip to a concurrent push or pop-off also yields
    /// `None`, the next attempt builds on the new tip.
    pub fn try_smith(&self, now: i64) -> Result<Option<Block<P>>, ChainError> {
        let chain = P::CHAIN;
        if self.status.is_downloading(chain) || !self.status.try_begin_smithing(chain) {
            return Ok(None);
        }
        let res = self.smith_on_tip(now);
        self.status.set_smithing(chain, false);
        match res {
            Err(ChainError::StaleTip { .. }) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("{chain} tip moved while smithing");
                Ok(None)
            }
            res => res,
        }
    }

    fn smith_on_tip(&self, now: i64) -> Result<Option<Block<P>>, ChainError> {
        let tip = self.service.last_block()?;
        let Some((_rank, smith_time)) = self.next_slot(&tip) else {
            return Ok(None);
        };
        if now < smith_time {
            return Ok(None);
        }
        let block = self.smith(&tip, now)?;
        #[cfg(feature = "tracing")]
        tracing::info!(
            "smithed {} block {} at height {} (rank {_rank})",
            P::CHAIN,
            block.id,
            block.height
        );
        Ok(Some(block))
    }

    fn smith(&self, tip: &Block<P>, now: i64) -> Result<Block<P>, ChainError> {
        let (payload, total_coinbase) = {
            let conn = self.service.pool().acquire();
            P::next_payload(&conn, self.service.mempool(), self.service.params())?
        };
        let block = self.service.construct_block(
            BlockParams {
                previous: tip,
                timestamp: now,
                payload,
                total_coinbase,
            },
            &self.secret_key,
        );
        self.service.push(tip, block, true)
    }
}
