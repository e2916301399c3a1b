use chain_db as db;
use rusqlite::Connection;

#[test]
fn create_tables() {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    db::create_tables(&conn).expect("Failed to create tables");

    // Verify that each table exists by querying the SQLite master table
    for table in db::sql::table::ALL {
        let query = format!(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='{}';",
            table.name,
        );
        let result: String = conn
            .query_row(&query, (), |row| row.get(0))
            .unwrap_or_else(|_| panic!("Table {} does not exist", table.name));
        assert_eq!(result, table.name);
    }
}

#[test]
fn create_tables_is_idempotent() {
    let conn = Connection::open_in_memory().unwrap();
    db::create_tables(&conn).unwrap();
    db::create_tables(&conn).unwrap();
}
