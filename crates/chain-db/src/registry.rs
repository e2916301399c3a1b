//! Node registry, spine public key and coinbase reward rows.

use crate::{payload::spine_public_key_from_row, sql, to_i64};
use chain_types::{NodeRegistration, SpinePublicKey};
use rusqlite::{named_params, Connection};

/// Insert or replace a node registration at its registration height.
pub fn insert_node_registration(conn: &Connection, reg: &NodeRegistration) -> rusqlite::Result<()> {
    conn.execute(
        sql::insert::NODE_REGISTRATION,
        named_params! {
            ":node_id": reg.node_id,
            ":node_public_key": reg.node_public_key,
            ":participation_score": to_i64(reg.participation_score),
            ":registration_height": reg.registration_height,
        },
    )?;
    Ok(())
}

/// The latest registration of each node as of `height`, restricted to nodes
/// with a positive participation score. Ordered by node ID.
pub fn list_registered_nodes_at(
    conn: &Connection,
    height: u32,
) -> rusqlite::Result<Vec<NodeRegistration>> {
    let mut stmt = conn.prepare(sql::query::LIST_REGISTERED_NODES_AT)?;
    let rows = stmt.query_map(named_params! { ":height": height }, |row| {
        let score: i64 = row.get("participation_score")?;
        Ok(NodeRegistration {
            node_id: row.get("node_id")?,
            node_public_key: row.get("node_public_key")?,
            participation_score: u64::try_from(score).unwrap_or_default(),
            registration_height: row.get("registration_height")?,
        })
    })?;
    rows.collect()
}

/// The spine public keys whose most recent entry at or below `height` is an
/// `Add`. Ordered by node ID.
pub fn list_active_spine_public_keys_at(
    conn: &Connection,
    height: u32,
) -> rusqlite::Result<Vec<SpinePublicKey>> {
    let mut stmt = conn.prepare(sql::query::LIST_ACTIVE_SPINE_PUBLIC_KEYS_AT)?;
    let rows = stmt.query_map(named_params! { ":height": height }, spine_public_key_from_row)?;
    rows.collect()
}

/// Every entry currently flagged as the latest for its node.
pub fn list_latest_spine_public_keys(conn: &Connection) -> rusqlite::Result<Vec<SpinePublicKey>> {
    let mut stmt = conn.prepare(sql::query::LIST_LATEST_SPINE_PUBLIC_KEYS)?;
    let rows = stmt.query_map((), spine_public_key_from_row)?;
    rows.collect()
}

/// Record a coinbase reward paid by the main block at `height`.
pub fn insert_coinbase_reward(
    conn: &Connection,
    height: u32,
    node_id: i64,
    amount: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        sql::insert::COINBASE_REWARD,
        named_params! {
            ":block_height": height,
            ":node_id": node_id,
            ":amount": amount,
        },
    )?;
    Ok(())
}

/// The `(node_id, amount)` rewards paid by the main block at `height`.
pub fn list_coinbase_rewards(conn: &Connection, height: u32) -> rusqlite::Result<Vec<(i64, i64)>> {
    let mut stmt = conn.prepare(sql::query::LIST_COINBASE_REWARDS)?;
    let rows = stmt.query_map(named_params! { ":block_height": height }, |row| {
        Ok((row.get("node_id")?, row.get("amount")?))
    })?;
    rows.collect()
}
