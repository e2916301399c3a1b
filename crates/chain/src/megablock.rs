//! Snapshot checkpoints anchoring main chain heights to the spine chain.

use crate::error::{BlockRef, ChainError};
use chain_db::{pool::ConnectionPool, with_tx};
use chain_types::{ChainParams, ChainType, Hash, Megablock, SpinePayload};

/// Creates and looks up megablocks.
#[derive(Clone)]
pub struct MegablockService {
    pool: ConnectionPool,
    spine_params: ChainParams,
}

impl MegablockService {
    pub fn new(pool: ConnectionPool, spine_params: ChainParams) -> Self {
        Self { pool, spine_params }
    }

    /// Record a megablock for the snapshot of the main chain at
    /// `main_block_height`.
    ///
    /// The megablock expires `snapshot_generation_timeout` after the snapshot
    /// and is anchored at the first spine height expected to be produced after
    /// expiry, at least one above the current spine tip.
    pub fn create_megablock(
        &self,
        full_snapshot_hash: Hash,
        main_block_height: u32,
        snapshot_timestamp: i64,
        chunk_hashes: Vec<Hash>,
    ) -> Result<Megablock, ChainError> {
        let mut conn = self.pool.acquire();
        let spine_tip = chain_db::get_last_block::<SpinePayload>(&conn)?
            .ok_or(ChainError::not_found(ChainType::Spine, BlockRef::Tip))?;

        let expiration_timestamp =
            snapshot_timestamp.saturating_add(self.spine_params.snapshot_generation_timeout);
        let steps = spine_blocks_until(
            expiration_timestamp - spine_tip.timestamp,
            self.spine_params.smithing_period,
        );
        let mut megablock = Megablock {
            id: 0,
            full_snapshot_hash,
            main_block_height,
            spine_block_height: spine_tip.height.saturating_add(steps),
            expiration_timestamp,
            chunk_hashes,
        };
        megablock.id = with_tx(&mut conn, |tx| chain_db::insert_megablock(tx, &megablock))?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "created megablock {} for main height {} anchored at spine height {}",
            megablock.id,
            megablock.main_block_height,
            megablock.spine_block_height,
        );
        Ok(megablock)
    }

    /// The megablock with the greatest spine height at or below `spine_tip_height`.
    pub fn latest_anchored_megablock(
        &self,
        spine_tip_height: u32,
    ) -> Result<Option<Megablock>, ChainError> {
        let conn = self.pool.acquire();
        Ok(chain_db::get_latest_megablock_at(&conn, spine_tip_height)?)
    }

    pub fn megablock_by_spine_height(
        &self,
        spine_block_height: u32,
    ) -> Result<Option<Megablock>, ChainError> {
        let conn = self.pool.acquire();
        Ok(chain_db::get_megablock_by_spine_height(&conn, spine_block_height)?)
    }
}

/// `max(1, ceil(duration / period))`.
fn spine_blocks_until(duration: i64, period: i64) -> u32 {
    if duration <= 0 || period <= 0 {
        return 1;
    }
    let steps = duration.saturating_add(period - 1) / period;
    u32::try_from(steps).unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::spine_blocks_until;

    #[test]
    fn rounds_up_to_whole_spine_blocks() {
        assert_eq!(spine_blocks_until(1_200, 300), 4);
        assert_eq!(spine_blocks_until(1_201, 300), 5);
        assert_eq!(spine_blocks_until(1, 300), 1);
        assert_eq!(spine_blocks_until(0, 300), 1);
        assert_eq!(spine_blocks_until(-50, 300), 1);
    }
}
