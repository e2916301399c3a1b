use chain_db as db;
use chain_types::{ChainType, MainPayload, SpinePayload};
use util::{insert_all, main_chain, spine_chain, test_conn};

mod util;

#[test]
fn insert_and_get_by_height() {
    let mut conn = test_conn();
    let blocks = main_chain(4);
    insert_all(&mut conn, &blocks);

    for block in &blocks {
        let fetched = db::get_block_by_height::<MainPayload>(&conn, block.height)
            .unwrap()
            .unwrap();
        assert_eq!(&fetched, block);
    }
    assert!(db::get_block_by_height::<MainPayload>(&conn, 4)
        .unwrap()
        .is_none());
}

#[test]
fn get_by_id_and_hash() {
    let mut conn = test_conn();
    let blocks = main_chain(3);
    insert_all(&mut conn, &blocks);

    let b = &blocks[2];
    let by_id = db::get_block_by_id::<MainPayload>(&conn, b.id).unwrap().unwrap();
    assert_eq!(by_id.block_hash, b.block_hash);
    let by_hash = db::get_block_by_hash::<MainPayload>(&conn, &b.block_hash)
        .unwrap()
        .unwrap();
    assert_eq!(by_hash.id, b.id);
}

#[test]
fn chains_are_kept_apart() {
    let mut conn = test_conn();
    insert_all(&mut conn, &main_chain(3));
    insert_all(&mut conn, &spine_chain(2));

    assert_eq!(db::get_block_count(&conn, ChainType::Main).unwrap(), 3);
    assert_eq!(db::get_block_count(&conn, ChainType::Spine).unwrap(), 2);
    let main_tip = db::get_last_block::<MainPayload>(&conn).unwrap().unwrap();
    let spine_tip = db::get_last_block::<SpinePayload>(&conn).unwrap().unwrap();
    assert_eq!(main_tip.height, 2);
    assert_eq!(spine_tip.height, 1);
}

#[test]
fn genesis_spine_keys_are_read_back() {
    let mut conn = test_conn();
    let blocks = spine_chain(1);
    insert_all(&mut conn, &blocks);
    let fetched = db::get_block_by_height::<SpinePayload>(&conn, 0)
        .unwrap()
        .unwrap();
    assert_eq!(fetched.payload, blocks[0].payload);
}

#[test]
fn list_blocks() {
    let mut conn = test_conn();
    let blocks = main_chain(6);
    insert_all(&mut conn, &blocks);

    let from: Vec<_> = db::list_blocks_from_height::<MainPayload>(&conn, 2, 3)
        .unwrap()
        .into_iter()
        .map(|b| b.height)
        .collect();
    assert_eq!(from, vec![2, 3, 4]);

    let latest: Vec<_> = db::list_latest_blocks::<MainPayload>(&conn, 2)
        .unwrap()
        .into_iter()
        .map(|b| b.height)
        .collect();
    assert_eq!(latest, vec![5, 4]);

    let above: Vec<_> = db::list_blocks_above_height::<MainPayload>(&conn, 3)
        .unwrap()
        .into_iter()
        .map(|b| b.height)
        .collect();
    assert_eq!(above, vec![5, 4]);
}

#[test]
fn duplicate_height_is_rejected() {
    let mut conn = test_conn();
    let blocks = main_chain(2);
    insert_all(&mut conn, &blocks);
    let res = db::with_tx(&mut conn, |tx| db::insert_block(tx, &blocks[1]));
    assert!(res.is_err());
    // The failed transaction left nothing behind.
    assert_eq!(db::get_block_count(&conn, ChainType::Main).unwrap(), 2);
}

#[test]
fn rollback_main_removes_payload_rows() {
    let mut conn = test_conn();
    let blocks = main_chain(5);
    insert_all(&mut conn, &blocks);
    db::insert_coinbase_reward(&conn, 4, 1, 50).unwrap();

    db::with_tx(&mut conn, |tx| db::rollback_to_height::<MainPayload>(tx, 2)).unwrap();

    let tip = db::get_last_block::<MainPayload>(&conn).unwrap().unwrap();
    assert_eq!(tip, blocks[2]);
    assert!(db::list_coinbase_rewards(&conn, 4).unwrap().is_empty());
    let txs: i64 = conn
        .query_row("SELECT COUNT(*) FROM block_transaction", (), |r| r.get(0))
        .unwrap();
    // Genesis carries one transaction, heights 1 and 2 carry two each.
    assert_eq!(txs, 5);
}

#[test]
fn rollback_then_replay_is_identical() {
    let mut conn = test_conn();
    let blocks = main_chain(5);
    insert_all(&mut conn, &blocks);
    db::with_tx(&mut conn, |tx| db::rollback_to_height::<MainPayload>(tx, 1)).unwrap();
    insert_all(&mut conn, &blocks[2..]);

    let replayed = db::list_blocks_from_height::<MainPayload>(&conn, 0, 10).unwrap();
    assert_eq!(replayed, blocks);
}
