//! Block management for the main and spine chains.
//!
//! Each chain is driven by a [`BlockService`] that validates, pushes and pops
//! blocks, backed by a shared sqlite [`ConnectionPool`]. Leader selection
//! lives in [`smith`], fork resolution for relayed blocks in
//! [`BlockReceiver`]. A [`Node`] wires all of these together.

pub use block_service::{BlockParams, BlockService};
#[doc(inline)]
pub use chain_db as db;
pub use error::{
    BlockRef, ChainError, MempoolError, NewError, ReceiptError, ReceiveError, ValidationError,
};
pub use genesis::ensure_genesis;
pub use megablock::MegablockService;
pub use mempool::{InMemoryMempool, Mempool};
pub use payload::{ChainPayload, MAX_BLOCK_TRANSACTIONS};
pub use receipt::{DbReceiptService, ReceiptService};
pub use receive::BlockReceiver;
pub use smithing::Smither;
pub use status::ChainStatus;

use chain_db::pool::ConnectionPool;
use chain_types::{
    event::{EventRx, EventSink, EventTx},
    Genesis, MainPayload, SpinePayload,
};
use secp256k1::SecretKey;
use smith::{MainBlocksmithStrategy, RegistryBlocksmiths, SpineBlocksmithStrategy, SpineKeyBlocksmiths};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

mod block_service;
pub mod error;
mod genesis;
mod megablock;
mod mempool;
mod payload;
mod receipt;
mod receive;
pub mod smith;
mod smithing;
mod status;
#[cfg(any(feature = "test-utils", test))]
pub mod test_utils;

/// All configuration options for a [`Node`].
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Configuration related to the database.
    pub db: db::pool::Config,
    /// The network's genesis blocks, nodes and protocol constants.
    pub genesis: Genesis,
    /// The key this node smiths and signs receipts with, if any.
    pub node_secret: Option<SecretKey>,
}

/// Both chains of a node and their shared services.
pub struct Node {
    conn_pool: ConnectionPool,
    status: Arc<ChainStatus>,
    events: EventTx,
    mempool: Arc<InMemoryMempool>,
    receipts: Arc<DbReceiptService>,
    main: Arc<BlockService<MainPayload>>,
    spine: Arc<BlockService<SpinePayload>>,
    megablocks: MegablockService,
    node_secret: Option<SecretKey>,
}

impl Node {
    /// Create the connection pool, ensure the tables and genesis blocks
    /// exist, then build the services of both chains.
    pub fn new(conf: &Config) -> Result<Self, NewError> {
        let conn_pool = db(&conf.db)?;
        ensure_genesis(&conn_pool, &conf.genesis)?;

        let events = EventTx::new();
        let sink: Arc<dyn EventSink> = Arc::new(events.clone());
        let mempool = Arc::new(InMemoryMempool::new());
        let receipts = Arc::new(DbReceiptService::new(conn_pool.clone()));

        let main_params = conf.genesis.main_params.clone();
        let main_strategy = Arc::new(MainBlocksmithStrategy::new(
            RegistryBlocksmiths::new(conn_pool.clone()),
            main_params.clone(),
        ));
        let main = BlockService::<MainPayload>::new(
            conn_pool.clone(),
            main_params,
            main_strategy,
            sink.clone(),
        )
        .with_mempool(mempool.clone());

        let spine_params = conf.genesis.spine_params.clone();
        let spine_strategy = Arc::new(SpineBlocksmithStrategy::new(
            SpineKeyBlocksmiths::new(conn_pool.clone(), spine_params.blocksmith_score),
            spine_params.clone(),
        ));
        let megablocks = MegablockService::new(conn_pool.clone(), spine_params.clone());
        let spine =
            BlockService::<SpinePayload>::new(conn_pool.clone(), spine_params, spine_strategy, sink);

        Ok(Self {
            conn_pool,
            status: Arc::new(ChainStatus::new()),
            events,
            mempool,
            receipts,
            main: Arc::new(main),
            spine: Arc::new(spine),
            megablocks,
            node_secret: conf.node_secret,
        })
    }

    /// Close the connection pool.
    pub fn close(self) -> Result<(), db::pool::ConnectionCloseErrors> {
        self.conn_pool.close()
    }

    pub fn conn_pool(&self) -> &ConnectionPool {
        &self.conn_pool
    }

    pub fn main(&self) -> &Arc<BlockService<MainPayload>> {
        &self.main
    }

    pub fn spine(&self) -> &Arc<BlockService<SpinePayload>> {
        &self.spine
    }

    pub fn megablocks(&self) -> &MegablockService {
        &self.megablocks
    }

    pub fn mempool(&self) -> &Arc<InMemoryMempool> {
        &self.mempool
    }

    pub fn status(&self) -> &Arc<ChainStatus> {
        &self.status
    }

    pub fn events(&self) -> &EventTx {
        &self.events
    }

    /// Listen for events emitted from now on.
    pub fn subscribe(&self) -> EventRx {
        self.events.new_listener()
    }

    pub fn main_receiver(&self) -> BlockReceiver<MainPayload> {
        BlockReceiver::new(self.main.clone(), self.receipts.clone())
    }

    pub fn spine_receiver(&self) -> BlockReceiver<SpinePayload> {
        BlockReceiver::new(self.spine.clone(), self.receipts.clone())
    }

    /// A main chain smither, if the node has a key.
    pub fn main_smither(&self) -> Option<Smither<MainPayload>> {
        let secret = self.node_secret?;
        Some(Smither::new(self.main.clone(), self.status.clone(), secret))
    }

    /// A spine chain smither, if the node has a key.
    pub fn spine_smither(&self) -> Option<Smither<SpinePayload>> {
        let secret = self.node_secret?;
        Some(Smither::new(self.spine.clone(), self.status.clone(), secret))
    }
}

/// Create a connection pool with all tables created.
pub fn db(conf: &db::pool::Config) -> Result<ConnectionPool, rusqlite::Error> {
    ConnectionPool::with_tables(conf)
}

/// Seconds since `UNIX_EPOCH`.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
