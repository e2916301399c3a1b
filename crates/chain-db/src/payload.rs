use crate::{conversion_error, decode, encode, error::ColumnError, sql, to_i64, QueryError};
use chain_types::{
    MainPayload, Payload, PublicKeyAction, PublishedReceipt, SpinePayload, SpinePublicKey,
    Transaction as ChainTransaction,
};
use rusqlite::{named_params, types::Type, Connection, Row, Transaction};

/// Storage of the chain-specific rows that make up a block's payload.
pub trait PayloadStore: Payload {
    /// Insert the payload rows of the block at `height`.
    fn insert_payload(tx: &Transaction, height: u32, payload: &Self) -> rusqlite::Result<()>;

    /// Re-assemble the payload of the block at `height`.
    fn get_payload(conn: &Connection, height: u32) -> Result<Self, QueryError>;

    /// Delete payload rows and derived state above `height`.
    fn rollback_payloads(tx: &Transaction, height: u32) -> rusqlite::Result<()>;
}

impl PayloadStore for MainPayload {
    fn insert_payload(tx: &Transaction, height: u32, payload: &Self) -> rusqlite::Result<()> {
        let mut stmt_tx = tx.prepare(sql::insert::BLOCK_TRANSACTION)?;
        for (ix, t) in payload.transactions.iter().enumerate() {
            stmt_tx.execute(named_params! {
                ":tx_id": t.id,
                ":block_height": height,
                ":tx_index": to_i64(ix),
                ":fee": t.fee,
                ":amount": t.amount,
                ":bytes": t.bytes,
            })?;
        }
        stmt_tx.finalize()?;

        let mut stmt_receipt = tx.prepare(sql::insert::PUBLISHED_RECEIPT)?;
        for receipt in &payload.published_receipts {
            stmt_receipt.execute(named_params! {
                ":block_height": height,
                ":published_index": receipt.published_index,
                ":receipt": encode(&receipt.receipt),
            })?;
        }
        stmt_receipt.finalize()?;
        Ok(())
    }

    fn get_payload(conn: &Connection, height: u32) -> Result<Self, QueryError> {
        let mut stmt = conn.prepare(sql::query::LIST_BLOCK_TRANSACTIONS)?;
        let transactions = stmt
            .query_map(named_params! { ":block_height": height }, |row| {
                Ok(ChainTransaction {
                    id: row.get("tx_id")?,
                    fee: row.get("fee")?,
                    amount: row.get("amount")?,
                    bytes: row.get("bytes")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(sql::query::LIST_PUBLISHED_RECEIPTS)?;
        let rows = stmt
            .query_map(named_params! { ":block_height": height }, |row| {
                let ix: u32 = row.get("published_index")?;
                let blob: Vec<u8> = row.get("receipt")?;
                Ok((ix, blob))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let published_receipts = rows
            .into_iter()
            .map(|(published_index, blob)| {
                Ok(PublishedReceipt {
                    receipt: decode(&blob)?,
                    block_height: height,
                    published_index,
                })
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        Ok(MainPayload {
            transactions,
            published_receipts,
        })
    }

    fn rollback_payloads(tx: &Transaction, height: u32) -> rusqlite::Result<()> {
        for stmt in [
            sql::delete::BLOCK_TRANSACTIONS_ABOVE_HEIGHT,
            sql::delete::PUBLISHED_RECEIPTS_ABOVE_HEIGHT,
            sql::delete::COINBASE_REWARDS_ABOVE_HEIGHT,
            sql::delete::NODE_REGISTRATIONS_ABOVE_HEIGHT,
        ] {
            tx.execute(stmt, named_params! { ":height": height })?;
        }
        Ok(())
    }
}

impl PayloadStore for SpinePayload {
    fn insert_payload(tx: &Transaction, height: u32, payload: &Self) -> rusqlite::Result<()> {
        let mut stmt_clear = tx.prepare(sql::update::CLEAR_SPINE_PUBLIC_KEY_LATEST)?;
        let mut stmt_key = tx.prepare(sql::insert::SPINE_PUBLIC_KEY)?;
        for (ix, key) in payload.spine_public_keys.iter().enumerate() {
            stmt_clear.execute(named_params! { ":node_id": key.node_id })?;
            stmt_key.execute(named_params! {
                ":node_id": key.node_id,
                ":node_public_key": key.node_public_key,
                ":public_key_action": key.public_key_action.code(),
                ":main_block_height": key.main_block_height,
                ":height": height,
                ":key_index": to_i64(ix),
            })?;
        }
        stmt_clear.finalize()?;
        stmt_key.finalize()?;
        Ok(())
    }

    fn get_payload(conn: &Connection, height: u32) -> Result<Self, QueryError> {
        let mut stmt = conn.prepare(sql::query::LIST_BLOCK_SPINE_PUBLIC_KEYS)?;
        let spine_public_keys = stmt
            .query_map(named_params! { ":height": height }, spine_public_key_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SpinePayload { spine_public_keys })
    }

    fn rollback_payloads(tx: &Transaction, height: u32) -> rusqlite::Result<()> {
        tx.execute(
            sql::delete::SPINE_PUBLIC_KEYS_ABOVE_HEIGHT,
            named_params! { ":height": height },
        )?;
        tx.execute(sql::update::RESTORE_SPINE_PUBLIC_KEY_LATEST, ())?;
        // Chunks reference their megablock.
        for stmt in [
            sql::delete::MEGABLOCK_CHUNKS_ABOVE_HEIGHT,
            sql::delete::MEGABLOCKS_ABOVE_HEIGHT,
        ] {
            tx.execute(stmt, named_params! { ":height": height })?;
        }
        Ok(())
    }
}

pub(crate) fn spine_public_key_from_row(row: &Row) -> rusqlite::Result<SpinePublicKey> {
    let code: u32 = row.get("public_key_action")?;
    let public_key_action = PublicKeyAction::from_code(code)
        .ok_or_else(|| conversion_error(2, Type::Integer, ColumnError::PublicKeyAction(code)))?;
    Ok(SpinePublicKey {
        node_public_key: row.get("node_public_key")?,
        node_id: row.get("node_id")?,
        public_key_action,
        main_block_height: row.get("main_block_height")?,
        height: row.get("height")?,
        latest: row.get("latest")?,
    })
}
