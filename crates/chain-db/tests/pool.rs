use chain_db::{self as db, ConnectionPool};
use chain_types::MainPayload;
use std::time::Duration;
use tempfile::TempDir;
use util::{main_chain, test_pool_conf};

mod util;

#[test]
fn conn_pool_new() {
    let _db = ConnectionPool::new(&test_pool_conf()).unwrap();
}

#[test]
fn conn_pool_close() {
    let db = ConnectionPool::with_tables(&test_pool_conf()).unwrap();
    assert!(db.all_connections_ready());
    db.close().unwrap();
}

#[test]
fn closed_pool_closes_returned_connections() {
    let conf = db::pool::Config {
        conn_limit: 2,
        ..test_pool_conf()
    };
    let db = ConnectionPool::with_tables(&conf).unwrap();
    let clone = db.clone();
    let held = db.acquire();
    db.close().unwrap();

    assert!(clone.is_closed());
    assert!(matches!(
        clone.try_acquire(),
        Err(db::pool::AcquireError::Closed)
    ));
    assert!(matches!(
        db.acquire_timeout(Duration::from_millis(10)),
        Err(db::pool::AcquireError::Closed)
    ));

    // The held connection is closed on drop, not returned.
    drop(held);
    assert!(!db.all_connections_ready());
    assert!(matches!(db.try_acquire(), Err(db::pool::AcquireError::Closed)));
}

#[test]
fn try_acquire_reports_busy() {
    let conf = db::pool::Config {
        conn_limit: 1,
        ..test_pool_conf()
    };
    let db = ConnectionPool::new(&conf).unwrap();
    let held = db.try_acquire().unwrap();
    assert!(matches!(
        db.try_acquire(),
        Err(db::pool::AcquireError::Busy)
    ));
    assert!(matches!(
        db.acquire_timeout(Duration::from_millis(10)),
        Err(db::pool::AcquireError::Timeout)
    ));
    drop(held);
    db.try_acquire().unwrap();
}

#[test]
fn connections_share_memory_db() {
    let db = ConnectionPool::with_tables(&test_pool_conf()).unwrap();
    let blocks = main_chain(2);
    for block in &blocks {
        db.insert_block(block).unwrap();
    }
    // Hold one connection so the read is served by another.
    let _held = db.acquire();
    let tip = db.get_last_block::<MainPayload>().unwrap().unwrap();
    assert_eq!(tip.block_hash, blocks[1].block_hash);
    let genesis = db.get_block_by_height::<MainPayload>(0).unwrap().unwrap();
    assert_eq!(genesis, blocks[0]);
}

#[test]
fn acquire_then_maps_inner_error() {
    let db = ConnectionPool::new(&test_pool_conf()).unwrap();
    let res = db.acquire_then(|h| h.execute("NOT SQL", ()));
    assert!(matches!(res, Err(db::pool::AcquireThenError::Inner(_))));
}

#[test]
fn conn_pool_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("conn_pool_path.sqlite3");
    let conf = db::pool::Config {
        source: db::pool::Source::Path(path.clone()),
        conn_limit: 2,
    };
    let db = ConnectionPool::with_tables(&conf).unwrap();
    let conn = db.acquire();
    conn.pragma_query(None, "trusted_schema", |row| {
        let val = row.get::<_, bool>(0)?;
        assert!(!val);
        Ok(())
    })
    .unwrap();
    conn.pragma_query(None, "foreign_keys", |row| {
        let val = row.get::<_, bool>(0)?;
        assert!(val);
        Ok(())
    })
    .unwrap();
    conn.pragma_query(None, "journal_mode", |row| {
        let val = row.get::<_, String>(0)?;
        assert_eq!(val, "wal");
        Ok(())
    })
    .unwrap();
    drop(conn);

    db.insert_block(&main_chain(1)[0]).unwrap();
    db.close().unwrap();

    let reopened = ConnectionPool::new(&conf).unwrap();
    assert!(reopened
        .get_last_block::<MainPayload>()
        .unwrap()
        .is_some());
}
