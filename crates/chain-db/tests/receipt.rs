use chain_db as db;
use util::test_conn;

mod util;

#[test]
fn receipt_markers_are_unique_per_sender() {
    let conn = test_conn();
    let hash = [9; 32];
    assert!(db::get_receipt_marker(&conn, &hash, b"alice").unwrap().is_none());
    assert!(db::insert_receipt_marker(&conn, &hash, b"alice", 3).unwrap());
    assert!(!db::insert_receipt_marker(&conn, &hash, b"alice", 4).unwrap());
    assert!(db::insert_receipt_marker(&conn, &hash, b"bob", 4).unwrap());
    assert_eq!(db::get_receipt_marker(&conn, &hash, b"alice").unwrap(), Some(3));
}
