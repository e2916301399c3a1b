#![warn(missing_docs)]

//! The chain node's DB interface and sqlite implementation.
//!
//! Both chains share the `block` table, keyed by chain and height. The
//! chain-specific payload rows live in their own tables and are written and
//! rolled back through the [`PayloadStore`] implementation of each payload.
//!
//! All functions here are synchronous and take a plain [`Connection`] or
//! [`Transaction`] so that callers decide the transaction boundaries. See
//! [`with_tx`].

pub use error::{DecodeError, QueryError};
pub use megablock::{get_latest_megablock_at, get_megablock_by_spine_height, insert_megablock};
pub use payload::PayloadStore;
#[cfg(feature = "pool")]
pub use pool::ConnectionPool;
pub use receipt::{get_receipt_marker, insert_receipt_marker};
pub use registry::{
    insert_coinbase_reward, insert_node_registration, list_active_spine_public_keys_at,
    list_coinbase_rewards, list_latest_spine_public_keys, list_registered_nodes_at,
};
#[doc(inline)]
pub use chain_db_sql as sql;

use chain_types::{Block, ChainType, CumulativeDifficulty, Hash};
use error::ColumnError;
use rusqlite::{
    named_params, types::Type, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use serde::{Deserialize, Serialize};

mod error;
mod megablock;
mod payload;
#[cfg(feature = "pool")]
pub mod pool;
mod receipt;
mod registry;

/// Encodes the given value into a blob.
///
/// This serializes the value using postcard.
pub fn encode<T>(value: &T) -> Vec<u8>
where
    T: Serialize,
{
    postcard::to_allocvec(value).expect("postcard serialization cannot fail")
}

/// Decodes the given blob into a value of type `T`.
///
/// This deserializes the bytes into a value of `T` with `postcard`.
pub fn decode<T>(value: &[u8]) -> Result<T, DecodeError>
where
    T: for<'de> Deserialize<'de>,
{
    Ok(postcard::from_bytes(value)?)
}

/// Create all tables.
pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    for table in sql::table::ALL {
        conn.execute(table.create, ())?;
    }
    Ok(())
}

/// Run `f` within a transaction, committing only if it returns `Ok`.
///
/// The transaction is rolled back when dropped on the error path. It begins
/// `IMMEDIATE`, so concurrent writers wait on the busy timeout for the write
/// lock rather than failing to upgrade a read lock mid-transaction.
pub fn with_tx<T, E>(
    conn: &mut Connection,
    f: impl FnOnce(&mut Transaction) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<rusqlite::Error>,
{
    let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let out = f(&mut tx)?;
    tx.commit()?;
    Ok(out)
}

/// The value stored in the `chain` column for the given chain.
pub fn chain_code(chain: ChainType) -> i64 {
    match chain {
        ChainType::Main => 0,
        ChainType::Spine => 1,
    }
}

/// For the given block:
///
/// 1. Insert an entry into the `block` table.
/// 2. Insert its payload rows via [`PayloadStore::insert_payload`].
///
/// The block's `height` and `cumulative_difficulty` are stored as given.
pub fn insert_block<P: PayloadStore>(tx: &Transaction, block: &Block<P>) -> rusqlite::Result<()> {
    tx.execute(
        sql::insert::BLOCK,
        named_params! {
            ":chain": chain_code(P::CHAIN),
            ":block_id": block.id,
            ":height": block.height,
            ":block_hash": block.block_hash,
            ":previous_block_hash": block.previous_block_hash,
            ":timestamp": block.timestamp,
            ":block_seed": block.block_seed,
            ":block_signature": block.block_signature,
            ":cumulative_difficulty": block.cumulative_difficulty.to_string(),
            ":blocksmith_public_key": block.blocksmith_public_key,
            ":total_amount": block.total_amount,
            ":total_fee": block.total_fee,
            ":total_coinbase": block.total_coinbase,
            ":version": block.version,
            ":payload_length": block.payload_length,
            ":payload_hash": block.payload_hash,
        },
    )?;
    P::insert_payload(tx, block.height, &block.payload)
}

/// Fetch the block at the given height along with its payload.
pub fn get_block_by_height<P: PayloadStore>(
    conn: &Connection,
    height: u32,
) -> Result<Option<Block<P>>, QueryError> {
    let header = conn
        .query_row(
            sql::query::GET_BLOCK_BY_HEIGHT,
            named_params! {
                ":chain": chain_code(P::CHAIN),
                ":height": height,
            },
            block_header_from_row,
        )
        .optional()?;
    header.map(|h| with_payload(conn, h)).transpose()
}

/// Fetch the highest block with the given ID.
pub fn get_block_by_id<P: PayloadStore>(
    conn: &Connection,
    block_id: i64,
) -> Result<Option<Block<P>>, QueryError> {
    let header = conn
        .query_row(
            sql::query::GET_BLOCK_BY_ID,
            named_params! {
                ":chain": chain_code(P::CHAIN),
                ":block_id": block_id,
            },
            block_header_from_row,
        )
        .optional()?;
    header.map(|h| with_payload(conn, h)).transpose()
}

/// Fetch the block with the given hash.
pub fn get_block_by_hash<P: PayloadStore>(
    conn: &Connection,
    block_hash: &Hash,
) -> Result<Option<Block<P>>, QueryError> {
    let header = conn
        .query_row(
            sql::query::GET_BLOCK_BY_HASH,
            named_params! {
                ":chain": chain_code(P::CHAIN),
                ":block_hash": block_hash,
            },
            block_header_from_row,
        )
        .optional()?;
    header.map(|h| with_payload(conn, h)).transpose()
}

/// Fetch the block with the greatest height.
pub fn get_last_block<P: PayloadStore>(conn: &Connection) -> Result<Option<Block<P>>, QueryError> {
    let header = conn
        .query_row(
            sql::query::GET_LAST_BLOCK,
            named_params! {
                ":chain": chain_code(P::CHAIN),
            },
            block_header_from_row,
        )
        .optional()?;
    header.map(|h| with_payload(conn, h)).transpose()
}

/// The number of blocks stored for the chain.
pub fn get_block_count(conn: &Connection, chain: ChainType) -> rusqlite::Result<u64> {
    let count: i64 = conn.query_row(
        sql::query::GET_BLOCK_COUNT,
        named_params! {
            ":chain": chain_code(chain),
        },
        |row| row.get(0),
    )?;
    Ok(u64::try_from(count).unwrap_or_default())
}

/// Lists up to `limit` blocks starting at `height`, in ascending order.
pub fn list_blocks_from_height<P: PayloadStore>(
    conn: &Connection,
    height: u32,
    limit: u32,
) -> Result<Vec<Block<P>>, QueryError> {
    let mut stmt = conn.prepare(sql::query::LIST_BLOCKS_FROM_HEIGHT)?;
    let headers = stmt
        .query_map(
            named_params! {
                ":chain": chain_code(P::CHAIN),
                ":height": height,
                ":limit": limit,
            },
            block_header_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    headers.into_iter().map(|h| with_payload(conn, h)).collect()
}

/// Lists the `limit` most recent blocks, newest first.
pub fn list_latest_blocks<P: PayloadStore>(
    conn: &Connection,
    limit: u32,
) -> Result<Vec<Block<P>>, QueryError> {
    let mut stmt = conn.prepare(sql::query::LIST_LATEST_BLOCKS)?;
    let headers = stmt
        .query_map(
            named_params! {
                ":chain": chain_code(P::CHAIN),
                ":limit": limit,
            },
            block_header_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    headers.into_iter().map(|h| with_payload(conn, h)).collect()
}

/// Lists all blocks above `height`, newest first.
pub fn list_blocks_above_height<P: PayloadStore>(
    conn: &Connection,
    height: u32,
) -> Result<Vec<Block<P>>, QueryError> {
    let mut stmt = conn.prepare(sql::query::LIST_BLOCKS_ABOVE_HEIGHT)?;
    let headers = stmt
        .query_map(
            named_params! {
                ":chain": chain_code(P::CHAIN),
                ":height": height,
            },
            block_header_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    headers.into_iter().map(|h| with_payload(conn, h)).collect()
}

/// Delete every block above `height` along with its payload rows and any
/// chain-specific derived state. See [`PayloadStore::rollback_payloads`].
pub fn rollback_to_height<P: PayloadStore>(tx: &Transaction, height: u32) -> rusqlite::Result<()> {
    tx.execute(
        sql::delete::BLOCKS_ABOVE_HEIGHT,
        named_params! {
            ":chain": chain_code(P::CHAIN),
            ":height": height,
        },
    )?;
    P::rollback_payloads(tx, height)
}

/// A block row without its payload.
type BlockHeader = Block<()>;

fn with_payload<P: PayloadStore>(conn: &Connection, h: BlockHeader) -> Result<Block<P>, QueryError> {
    let payload = P::get_payload(conn, h.height)?;
    Ok(Block {
        id: h.id,
        height: h.height,
        block_hash: h.block_hash,
        previous_block_hash: h.previous_block_hash,
        timestamp: h.timestamp,
        block_seed: h.block_seed,
        block_signature: h.block_signature,
        cumulative_difficulty: h.cumulative_difficulty,
        blocksmith_public_key: h.blocksmith_public_key,
        total_amount: h.total_amount,
        total_fee: h.total_fee,
        total_coinbase: h.total_coinbase,
        version: h.version,
        payload_length: h.payload_length,
        payload_hash: h.payload_hash,
        payload,
    })
}

fn block_header_from_row(row: &Row) -> rusqlite::Result<BlockHeader> {
    let cd: String = row.get("cumulative_difficulty")?;
    let cumulative_difficulty = cd
        .parse::<CumulativeDifficulty>()
        .map_err(|e| conversion_error(7, Type::Text, ColumnError::from(e)))?;
    Ok(Block {
        id: row.get("block_id")?,
        height: row.get("height")?,
        block_hash: row.get("block_hash")?,
        previous_block_hash: row.get("previous_block_hash")?,
        timestamp: row.get("timestamp")?,
        block_seed: row.get("block_seed")?,
        block_signature: row.get("block_signature")?,
        cumulative_difficulty,
        blocksmith_public_key: row.get("blocksmith_public_key")?,
        total_amount: row.get("total_amount")?,
        total_fee: row.get("total_fee")?,
        total_coinbase: row.get("total_coinbase")?,
        version: row.get("version")?,
        payload_length: row.get("payload_length")?,
        payload_hash: row.get("payload_hash")?,
        payload: (),
    })
}

pub(crate) fn conversion_error(col: usize, ty: Type, err: ColumnError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, ty, Box::new(err))
}

/// Convert an unsigned count or score for storage in an `INTEGER` column.
pub(crate) fn to_i64<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}
