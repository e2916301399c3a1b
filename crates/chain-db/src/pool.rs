//! Provides the node's blocking [`ConnectionPool`] implementation and related items.
//!
//! The pool hands out up to `conn_limit` connections at once. Idle
//! connections wait in a bounded `crossbeam` channel. Taking a handle
//! receives from the channel and dropping it sends the connection back.
//! Once the pool is closed, dropped handles close their connection instead.

use crate::{with_tx, PayloadStore, QueryError};
use chain_types::Block;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use rusqlite::Connection;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;

/// Access to the node's DB connection pool and DB-access-related methods.
///
/// The handle is safe to clone and share between threads.
#[derive(Clone)]
pub struct ConnectionPool {
    idle_tx: Sender<Connection>,
    idle_rx: Receiver<Connection>,
    capacity: usize,
    closed: Arc<AtomicBool>,
}

/// A temporary connection handle to a [`ConnectionPool`].
///
/// Provides `Deref`, `DerefMut` impls for the inner [`rusqlite::Connection`].
/// The connection returns to the pool when the handle drops.
pub struct ConnectionHandle {
    conn: Option<Connection>,
    idle_tx: Sender<Connection>,
    closed: Arc<AtomicBool>,
}

/// Node configuration related to the database.
#[derive(Clone, Debug)]
pub struct Config {
    /// The number of simultaneous connections to the database to maintain.
    pub conn_limit: usize,
    /// How to source the node's database.
    pub source: Source,
}

/// The source of the node's database.
#[derive(Clone, Debug)]
pub enum Source {
    /// Use an in-memory database using the given string as a unique ID.
    Memory(String),
    /// Use the database at the given path.
    Path(PathBuf),
}

/// Failed to acquire a connection.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// All connections are in use.
    #[error("all connections are busy")]
    Busy,
    /// No connection became available within the timeout.
    #[error("timed out waiting for a connection")]
    Timeout,
    /// The pool was closed.
    #[error("the connection pool is closed")]
    Closed,
}

/// Any error that might occur during node DB connection pool access.
#[derive(Debug, Error)]
pub enum AcquireThenError<E> {
    /// Failed to acquire a DB connection.
    #[error("failed to acquire a DB connection: {0}")]
    Acquire(#[from] AcquireError),
    /// The error returned by the `acquire_then` function result.
    #[error("{0}")]
    Inner(E),
}

/// An `acquire_then` error whose function returns a result with a rusqlite error.
pub type AcquireThenRusqliteError = AcquireThenError<rusqlite::Error>;

/// An `acquire_then` error whose function returns a result with a query error.
pub type AcquireThenQueryError = AcquireThenError<QueryError>;

/// One or more connections failed to close.
#[derive(Debug, Error)]
pub struct ConnectionCloseErrors(pub Vec<(rusqlite::Connection, rusqlite::Error)>);

const EXPECT_CONN_SOME: &str = "connection cannot be `None` before drop";

impl ConnectionPool {
    /// Create the connection pool from the given configuration.
    ///
    /// Note that this function does not initialise the DB tables. See the
    /// [`ConnectionPool::with_tables`] constructor.
    pub fn new(conf: &Config) -> rusqlite::Result<Self> {
        let capacity = conf.conn_limit.max(1);
        let (idle_tx, idle_rx) = channel::bounded(capacity);
        for _ in 0..capacity {
            let conn = new_conn(&conf.source)?;
            // The channel has room for exactly `capacity` connections.
            let _ = idle_tx.try_send(conn);
        }
        let conn_pool = Self {
            idle_tx,
            idle_rx,
            capacity,
            closed: Arc::new(AtomicBool::new(false)),
        };
        if let Source::Path(_) = conf.source {
            let conn = conn_pool.acquire();
            conn.pragma_update(None, "journal_mode", "wal")?;
        }
        Ok(conn_pool)
    }

    /// Create the connection pool from the given configuration and ensure the DB tables have been
    /// created if they do not already exist before returning.
    pub fn with_tables(conf: &Config) -> rusqlite::Result<Self> {
        let conn_pool = Self::new(conf)?;
        conn_pool.create_tables()?;
        Ok(conn_pool)
    }

    /// Acquire a temporary database [`ConnectionHandle`], blocking until one is idle.
    ///
    /// Blocks forever once the pool is closed. Callers that may outlive the
    /// pool use [`ConnectionPool::acquire_timeout`] or
    /// [`ConnectionPool::try_acquire`], which report [`AcquireError::Closed`].
    pub fn acquire(&self) -> ConnectionHandle {
        // The pool holds a sender, so the channel never disconnects.
        let conn = loop {
            if let Ok(conn) = self.idle_rx.recv() {
                break conn;
            }
        };
        self.handle(conn)
    }

    /// Acquire a connection, giving up after `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<ConnectionHandle, AcquireError> {
        self.check_open()?;
        self.idle_rx
            .recv_timeout(timeout)
            .map(|conn| self.handle(conn))
            .map_err(|_| AcquireError::Timeout)
    }

    /// Attempt to acquire a temporary database [`ConnectionHandle`] without blocking.
    ///
    /// Returns `Err` in the case that all database connections are busy.
    pub fn try_acquire(&self) -> Result<ConnectionHandle, AcquireError> {
        self.check_open()?;
        match self.idle_rx.try_recv() {
            Ok(conn) => Ok(self.handle(conn)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Err(AcquireError::Busy),
        }
    }

    /// The total number of simultaneous connections managed by the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether every connection is idle.
    pub fn all_connections_ready(&self) -> bool {
        self.idle_rx.len() == self.capacity
    }

    /// Close all idle connections, returning a `ConnectionCloseErrors` in the case of any errors.
    ///
    /// Marks the pool closed for every clone. Connections still held by a
    /// handle are closed when that handle drops.
    pub fn close(&self) -> Result<(), ConnectionCloseErrors> {
        self.closed.store(true, Ordering::Release);
        let mut errs = vec![];
        while let Ok(conn) = self.idle_rx.try_recv() {
            if let Err(err) = conn.close() {
                errs.push(err);
            }
        }
        if !errs.is_empty() {
            return Err(ConnectionCloseErrors(errs));
        }
        Ok(())
    }

    /// Whether [`ConnectionPool::close`] was called on this pool or a clone.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<(), AcquireError> {
        if self.is_closed() {
            return Err(AcquireError::Closed);
        }
        Ok(())
    }

    fn handle(&self, conn: Connection) -> ConnectionHandle {
        ConnectionHandle {
            conn: Some(conn),
            idle_tx: self.idle_tx.clone(),
            closed: self.closed.clone(),
        }
    }
}

/// Short-hand methods for blocking DB access.
impl ConnectionPool {
    /// Acquire a connection and pass it to the given function.
    pub fn acquire_then<F, T, E>(&self, f: F) -> Result<T, AcquireThenError<E>>
    where
        F: FnOnce(&mut ConnectionHandle) -> Result<T, E>,
    {
        let mut handle = self.acquire();
        f(&mut handle).map_err(AcquireThenError::Inner)
    }

    /// Create all database tables.
    pub fn create_tables(&self) -> rusqlite::Result<()> {
        let mut conn = self.acquire();
        with_tx(&mut conn, |tx| crate::create_tables(tx))
    }

    /// Insert the given block and its payload rows in one transaction.
    pub fn insert_block<P: PayloadStore>(&self, block: &Block<P>) -> rusqlite::Result<()> {
        let mut conn = self.acquire();
        with_tx(&mut conn, |tx| crate::insert_block(tx, block))
    }

    /// Fetch the block with the greatest height.
    pub fn get_last_block<P: PayloadStore>(&self) -> Result<Option<Block<P>>, QueryError> {
        let conn = self.acquire();
        crate::get_last_block(&conn)
    }

    /// Fetch the block at the given height.
    pub fn get_block_by_height<P: PayloadStore>(
        &self,
        height: u32,
    ) -> Result<Option<Block<P>>, QueryError> {
        let conn = self.acquire();
        crate::get_block_by_height(&conn, height)
    }
}

impl Config {
    /// Config with specified source and connection limit.
    pub fn new(source: Source, conn_limit: usize) -> Self {
        Self { source, conn_limit }
    }

    /// The default connection limit.
    ///
    /// This default uses the number of available CPUs as a heuristic for a
    /// default connection limit. Specifically, it multiplies the number of
    /// available CPUs by 4.
    pub fn default_conn_limit() -> usize {
        num_cpus::get().saturating_mul(4)
    }
}

impl Source {
    /// A temporary, in-memory DB with a default ID.
    pub fn default_memory() -> Self {
        // Default ID cannot be an empty string.
        Self::Memory("__default-id".to_string())
    }
}

impl AsRef<rusqlite::Connection> for ConnectionHandle {
    fn as_ref(&self) -> &rusqlite::Connection {
        self
    }
}

impl AsMut<rusqlite::Connection> for ConnectionHandle {
    fn as_mut(&mut self) -> &mut rusqlite::Connection {
        self
    }
}

impl core::ops::Deref for ConnectionHandle {
    type Target = Connection;
    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect(EXPECT_CONN_SOME)
    }
}

impl core::ops::DerefMut for ConnectionHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect(EXPECT_CONN_SOME)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.closed.load(Ordering::Acquire) {
                let _ = conn.close();
                return;
            }
            // Never full: at most `capacity` connections exist.
            let _ = self.idle_tx.try_send(conn);
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::default_memory()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            conn_limit: Self::default_conn_limit(),
            source: Source::default(),
        }
    }
}

impl core::fmt::Display for ConnectionCloseErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        writeln!(f, "failed to close one or more connections:")?;
        for (ix, (_conn, err)) in self.0.iter().enumerate() {
            writeln!(f, "  {ix}: {err}")?;
        }
        Ok(())
    }
}

/// Create a new connection given a DB source.
pub(crate) fn new_conn(source: &Source) -> rusqlite::Result<rusqlite::Connection> {
    let conn = match source {
        Source::Memory(id) => new_mem_conn(id),
        Source::Path(p) => {
            if let Some(dir) = p.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            let conn = rusqlite::Connection::open(p)?;
            conn.pragma_update(None, "trusted_schema", false)?;
            conn.pragma_update(None, "synchronous", 1)?;
            Ok(conn)
        }
    }?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}

/// Create an in-memory connection with the given ID
fn new_mem_conn(id: &str) -> rusqlite::Result<rusqlite::Connection> {
    let conn_str = format!("file:/{id}");
    rusqlite::Connection::open_with_flags_and_vfs(conn_str, Default::default(), "memdb")
}
