//! How the block service treats each chain's payload.

use crate::{
    error::ChainError,
    mempool::Mempool,
    smith::{coinbase_lottery_winners, coinbase_shares, SortedBlocksmiths},
};
use chain_db::PayloadStore;
use chain_types::{
    Block, ChainParams, MainPayload, PublicKeyAction, SpinePayload, SpinePublicKey, Transaction,
};
use rusqlite::Connection;
use std::collections::{BTreeMap, HashMap};

/// The most transactions a locally smithed main block carries.
pub const MAX_BLOCK_TRANSACTIONS: usize = 500;

/// Chain-specific hooks of [`BlockService`](crate::BlockService).
pub trait ChainPayload: PayloadStore {
    /// Transactions carried by the payload.
    fn transactions(&self) -> &[Transaction] {
        &[]
    }

    /// The lowest height the chain ending at `tip` may be popped off to.
    fn rollback_floor(
        _conn: &Connection,
        tip: &Block<Self>,
        params: &ChainParams,
    ) -> Result<u32, ChainError> {
        Ok(tip.height.saturating_sub(params.max_rollback_blocks))
    }

    /// Write rows derived from a block within the transaction inserting it.
    fn record_push(
        _tx: &rusqlite::Transaction,
        _block: &Block<Self>,
        _blocksmiths: &SortedBlocksmiths,
        _params: &ChainParams,
    ) -> Result<(), ChainError> {
        Ok(())
    }

    /// The payload and total coinbase of a locally smithed block.
    fn next_payload(
        conn: &Connection,
        mempool: Option<&dyn Mempool>,
        params: &ChainParams,
    ) -> Result<(Self, i64), ChainError>;
}

impl ChainPayload for MainPayload {
    fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Also never below the main height of the latest megablock anchored at
    /// or below the spine tip.
    fn rollback_floor(
        conn: &Connection,
        tip: &Block<Self>,
        params: &ChainParams,
    ) -> Result<u32, ChainError> {
        let floor = tip.height.saturating_sub(params.max_rollback_blocks);
        let Some(spine_tip) = chain_db::get_last_block::<SpinePayload>(conn)? else {
            return Ok(floor);
        };
        let anchored = chain_db::get_latest_megablock_at(conn, spine_tip.height)?
            .map(|m| m.main_block_height)
            .unwrap_or_default();
        Ok(floor.max(anchored))
    }

    fn record_push(
        tx: &rusqlite::Transaction,
        block: &Block<Self>,
        blocksmiths: &SortedBlocksmiths,
        params: &ChainParams,
    ) -> Result<(), ChainError> {
        let winners = coinbase_lottery_winners(blocksmiths.blocksmiths(), params.coinbase_lottery_winners);
        for (node_id, amount) in coinbase_shares(block.total_coinbase, &winners) {
            chain_db::insert_coinbase_reward(tx, block.height, node_id, amount)?;
        }
        Ok(())
    }

    fn next_payload(
        _conn: &Connection,
        mempool: Option<&dyn Mempool>,
        params: &ChainParams,
    ) -> Result<(Self, i64), ChainError> {
        let transactions = match mempool {
            Some(mempool) => mempool.select_transactions(MAX_BLOCK_TRANSACTIONS)?,
            None => vec![],
        };
        let coinbase = if params.coinbase_lottery_winners > 0 {
            params.coinbase_reward
        } else {
            0
        };
        let payload = MainPayload {
            transactions,
            published_receipts: vec![],
        };
        Ok((payload, coinbase))
    }
}

impl ChainPayload for SpinePayload {
    /// Spine key changes needed to match the main chain registry at its tip.
    fn next_payload(
        conn: &Connection,
        _mempool: Option<&dyn Mempool>,
        _params: &ChainParams,
    ) -> Result<(Self, i64), ChainError> {
        let main_height = chain_db::get_last_block::<MainPayload>(conn)?
            .map(|b| b.height)
            .unwrap_or_default();
        let registered: HashMap<i64, Vec<u8>> = chain_db::list_registered_nodes_at(conn, main_height)?
            .into_iter()
            .map(|reg| (reg.node_id, reg.node_public_key))
            .collect();
        let active: HashMap<i64, Vec<u8>> = chain_db::list_latest_spine_public_keys(conn)?
            .into_iter()
            .filter(|key| key.public_key_action == PublicKeyAction::Add)
            .map(|key| (key.node_id, key.node_public_key))
            .collect();

        let entry = |node_id: i64, key: &[u8], action| SpinePublicKey {
            node_public_key: key.to_vec(),
            node_id,
            public_key_action: action,
            main_block_height: main_height,
            height: 0,
            latest: true,
        };
        let mut changes = BTreeMap::new();
        for (node_id, key) in &active {
            if registered.get(node_id) != Some(key) {
                changes.insert(*node_id, entry(*node_id, key, PublicKeyAction::Remove));
            }
        }
        // A changed key replaces the removal of the old one.
        for (node_id, key) in &registered {
            if active.get(node_id) != Some(key) {
                changes.insert(*node_id, entry(*node_id, key, PublicKeyAction::Add));
            }
        }
        let payload = SpinePayload {
            spine_public_keys: changes.into_values().collect(),
        };
        Ok((payload, 0))
    }
}
