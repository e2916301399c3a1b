use crate::error::ChainError;
use chain_db::{pool::ConnectionPool, with_tx, PayloadStore};
use chain_types::{Genesis, MainPayload, NodeRegistration, SpinePayload};
use rusqlite::Transaction;

/// Insert the genesis block of each chain that has no blocks yet.
///
/// Main genesis comes with the registrations of the genesis nodes and spine
/// genesis with their spine public keys. A stored genesis block that differs
/// from `genesis` is an error.
pub fn ensure_genesis(pool: &ConnectionPool, genesis: &Genesis) -> Result<(), ChainError> {
    let mut conn = pool.acquire();
    with_tx(&mut conn, |tx| {
        if ensure_chain_genesis::<MainPayload>(tx, genesis)? {
            for node in &genesis.nodes {
                let reg = NodeRegistration {
                    node_id: node.node_id,
                    node_public_key: node.node_public_key.clone(),
                    participation_score: node.participation_score,
                    registration_height: 0,
                };
                chain_db::insert_node_registration(tx, &reg)?;
            }
        }
        ensure_chain_genesis::<SpinePayload>(tx, genesis)?;
        Ok(())
    })
}

/// Returns whether the block was inserted.
fn ensure_chain_genesis<P: PayloadStore>(
    tx: &Transaction,
    genesis: &Genesis,
) -> Result<bool, ChainError> {
    let expected = genesis.block::<P>();
    match chain_db::get_block_by_height::<P>(tx, 0)? {
        Some(stored) if stored.block_hash == expected.block_hash => Ok(false),
        Some(_) => Err(ChainError::GenesisMismatch(P::CHAIN)),
        None => {
            chain_db::insert_block(tx, &expected)?;
            #[cfg(feature = "tracing")]
            tracing::info!("inserted {} genesis block {}", P::CHAIN, expected.id);
            Ok(true)
        }
    }
}
