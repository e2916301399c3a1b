use crate::sql;
use chain_types::Hash;
use rusqlite::{named_params, Connection, OptionalExtension};

/// Record that a receipt was issued for `datum_hash` to `sender_public_key`.
///
/// Returns `false` if a marker already existed.
pub fn insert_receipt_marker(
    conn: &Connection,
    datum_hash: &Hash,
    sender_public_key: &[u8],
    reference_block_height: u32,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        sql::insert::RECEIPT_MARKER,
        named_params! {
            ":datum_hash": datum_hash,
            ":sender_public_key": sender_public_key,
            ":reference_block_height": reference_block_height,
        },
    )?;
    Ok(inserted > 0)
}

/// The reference height of the receipt issued for `datum_hash` to
/// `sender_public_key`, if any.
pub fn get_receipt_marker(
    conn: &Connection,
    datum_hash: &Hash,
    sender_public_key: &[u8],
) -> rusqlite::Result<Option<u32>> {
    conn.query_row(
        sql::query::GET_RECEIPT_MARKER,
        named_params! {
            ":datum_hash": datum_hash,
            ":sender_public_key": sender_public_key,
        },
        |row| row.get("reference_block_height"),
    )
    .optional()
}
