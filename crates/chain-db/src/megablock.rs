use crate::{sql, to_i64, QueryError};
use chain_types::{Hash, Megablock};
use rusqlite::{named_params, Connection, OptionalExtension, Row, Transaction};

/// Insert a megablock and its ordered chunk hashes, returning the new row ID.
pub fn insert_megablock(tx: &Transaction, megablock: &Megablock) -> rusqlite::Result<i64> {
    tx.execute(
        sql::insert::MEGABLOCK,
        named_params! {
            ":full_snapshot_hash": megablock.full_snapshot_hash,
            ":main_block_height": megablock.main_block_height,
            ":spine_block_height": megablock.spine_block_height,
            ":expiration_timestamp": megablock.expiration_timestamp,
        },
    )?;
    let id = tx.last_insert_rowid();
    let mut stmt = tx.prepare(sql::insert::MEGABLOCK_CHUNK)?;
    for (ix, hash) in megablock.chunk_hashes.iter().enumerate() {
        stmt.execute(named_params! {
            ":megablock_id": id,
            ":chunk_index": to_i64(ix),
            ":chunk_hash": hash,
        })?;
    }
    stmt.finalize()?;
    Ok(id)
}

/// The megablock with the greatest spine height at or below `spine_block_height`.
pub fn get_latest_megablock_at(
    conn: &Connection,
    spine_block_height: u32,
) -> Result<Option<Megablock>, QueryError> {
    let megablock = conn
        .query_row(
            sql::query::GET_LATEST_MEGABLOCK_AT,
            named_params! { ":spine_block_height": spine_block_height },
            megablock_from_row,
        )
        .optional()?;
    megablock.map(|m| with_chunks(conn, m)).transpose()
}

/// The most recently created megablock anchored at exactly `spine_block_height`.
pub fn get_megablock_by_spine_height(
    conn: &Connection,
    spine_block_height: u32,
) -> Result<Option<Megablock>, QueryError> {
    let megablock = conn
        .query_row(
            sql::query::GET_MEGABLOCK_BY_SPINE_HEIGHT,
            named_params! { ":spine_block_height": spine_block_height },
            megablock_from_row,
        )
        .optional()?;
    megablock.map(|m| with_chunks(conn, m)).transpose()
}

fn with_chunks(conn: &Connection, mut megablock: Megablock) -> Result<Megablock, QueryError> {
    let mut stmt = conn.prepare(sql::query::LIST_MEGABLOCK_CHUNKS)?;
    megablock.chunk_hashes = stmt
        .query_map(named_params! { ":megablock_id": megablock.id }, |row| {
            row.get::<_, Hash>("chunk_hash")
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(megablock)
}

fn megablock_from_row(row: &Row) -> rusqlite::Result<Megablock> {
    Ok(Megablock {
        id: row.get("id")?,
        full_snapshot_hash: row.get("full_snapshot_hash")?,
        main_block_height: row.get("main_block_height")?,
        spine_block_height: row.get("spine_block_height")?,
        expiration_timestamp: row.get("expiration_timestamp")?,
        chunk_hashes: vec![],
    })
}
