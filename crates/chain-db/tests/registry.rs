use chain_db as db;
use chain_types::{MainPayload, NodeRegistration, PublicKeyAction, SpinePayload};
use rusqlite::Connection;
use util::{child, insert_all, main_chain, spine_chain, spine_key, test_conn};

mod util;

fn active(conn: &Connection, height: u32) -> Vec<i64> {
    db::list_active_spine_public_keys_at(conn, height)
        .unwrap()
        .into_iter()
        .map(|k| k.node_id)
        .collect()
}

fn registration(node_id: i64, score: u64, height: u32) -> NodeRegistration {
    NodeRegistration {
        node_id,
        node_public_key: vec![node_id as u8; 33],
        participation_score: score,
        registration_height: height,
    }
}

#[test]
fn registered_nodes_at_height() {
    let conn = test_conn();
    db::insert_node_registration(&conn, &registration(1, 10, 0)).unwrap();
    db::insert_node_registration(&conn, &registration(2, 20, 5)).unwrap();
    db::insert_node_registration(&conn, &registration(3, 0, 0)).unwrap();
    // A later update of node 1 drops its score to zero.
    db::insert_node_registration(&conn, &registration(1, 0, 8)).unwrap();

    let ids = |h| -> Vec<i64> {
        db::list_registered_nodes_at(&conn, h)
            .unwrap()
            .into_iter()
            .map(|r| r.node_id)
            .collect()
    };
    assert_eq!(ids(0), vec![1]);
    assert_eq!(ids(5), vec![1, 2]);
    assert_eq!(ids(8), vec![2]);
}

#[test]
fn main_rollback_removes_registrations_above() {
    let mut conn = test_conn();
    insert_all(&mut conn, &main_chain(4));
    db::insert_node_registration(&conn, &registration(1, 10, 0)).unwrap();
    db::insert_node_registration(&conn, &registration(2, 10, 3)).unwrap();

    db::with_tx(&mut conn, |tx| db::rollback_to_height::<MainPayload>(tx, 2)).unwrap();
    let regs = db::list_registered_nodes_at(&conn, 10).unwrap();
    assert_eq!(regs, vec![registration(1, 10, 0)]);
}

#[test]
fn spine_keys_track_latest_and_restore_on_rollback() {
    let mut conn = test_conn();
    let mut blocks = spine_chain(1);
    let remove = SpinePayload {
        spine_public_keys: vec![spine_key(2, PublicKeyAction::Remove)],
    };
    blocks.push(child(&blocks[0], remove));
    let add = SpinePayload {
        spine_public_keys: vec![spine_key(4, PublicKeyAction::Add)],
    };
    blocks.push(child(&blocks[1], add));
    insert_all(&mut conn, &blocks);

    assert_eq!(active(&conn, 0), vec![1, 2, 3]);
    assert_eq!(active(&conn, 1), vec![1, 3]);
    assert_eq!(active(&conn, 2), vec![1, 3, 4]);

    let latest = db::list_latest_spine_public_keys(&conn).unwrap();
    let node_2 = latest.iter().find(|k| k.node_id == 2).unwrap();
    assert_eq!(node_2.public_key_action, PublicKeyAction::Remove);
    assert_eq!(latest.len(), 4);

    db::with_tx(&mut conn, |tx| db::rollback_to_height::<SpinePayload>(tx, 0)).unwrap();
    assert_eq!(active(&conn, 5), vec![1, 2, 3]);
    let latest = db::list_latest_spine_public_keys(&conn).unwrap();
    assert_eq!(latest.len(), 3);
    assert!(latest
        .iter()
        .all(|k| k.public_key_action == PublicKeyAction::Add && k.latest));
}
