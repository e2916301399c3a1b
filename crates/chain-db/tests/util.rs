#![allow(dead_code)]

use chain_db as db;
use chain_types::{
    Block, CumulativeDifficulty, Genesis, MainPayload, Payload, PublicKeyAction, SpinePayload,
    SpinePublicKey, Transaction,
};
use rusqlite::Connection;

pub fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::create_tables(&conn).unwrap();
    conn
}

pub fn test_pool_conf() -> db::pool::Config {
    db::pool::Config {
        source: db::pool::Source::Memory(uuid::Uuid::new_v4().into()),
        conn_limit: 4,
    }
}

/// A child of `parent` carrying the given payload. Not signed.
pub fn child<P: Payload>(parent: &Block<P>, payload: P) -> Block<P> {
    let (payload_length, payload_hash) = payload.summary();
    let (total_amount, total_fee) = payload.totals();
    let mut block = Block {
        id: 0,
        height: parent.height + 1,
        block_hash: [0; 32],
        previous_block_hash: Some(parent.block_hash),
        timestamp: parent.timestamp + 15,
        block_seed: vec![parent.height as u8 + 1; 64],
        block_signature: vec![7; 64],
        cumulative_difficulty: CumulativeDifficulty(parent.cumulative_difficulty.0 + 100),
        blocksmith_public_key: parent.blocksmith_public_key.clone(),
        total_amount,
        total_fee,
        total_coinbase: 0,
        version: 1,
        payload_length,
        payload_hash,
        payload,
    };
    block.seal();
    block
}

pub fn main_chain(len: usize) -> Vec<Block<MainPayload>> {
    let mut blocks = vec![Genesis::default().block::<MainPayload>()];
    while blocks.len() < len {
        let parent = blocks.last().unwrap();
        let h = parent.height + 1;
        let payload = MainPayload {
            transactions: (0..2)
                .map(|i| Transaction::new(vec![h as u8, i], i64::from(i) + 1, 10))
                .collect(),
            published_receipts: vec![],
        };
        blocks.push(child(parent, payload));
    }
    blocks
}

pub fn spine_chain(len: usize) -> Vec<Block<SpinePayload>> {
    let mut blocks = vec![Genesis::default().block::<SpinePayload>()];
    while blocks.len() < len {
        let parent = blocks.last().unwrap();
        blocks.push(child(parent, SpinePayload::default()));
    }
    blocks
}

pub fn spine_key(node_id: i64, action: PublicKeyAction) -> SpinePublicKey {
    SpinePublicKey {
        node_public_key: vec![node_id as u8; 33],
        node_id,
        public_key_action: action,
        main_block_height: 0,
        height: 0,
        latest: true,
    }
}

pub fn insert_all<P: db::PayloadStore>(conn: &mut Connection, blocks: &[Block<P>]) {
    db::with_tx(conn, |tx| {
        for block in blocks {
            db::insert_block(tx, block)?;
        }
        Ok::<_, rusqlite::Error>(())
    })
    .unwrap();
}
