#![allow(dead_code)]

use crate::{
    db::pool::{Config, ConnectionPool, Source},
    ensure_genesis,
    smith::{MainBlocksmithStrategy, RegistryBlocksmiths, SpineBlocksmithStrategy, SpineKeyBlocksmiths},
    BlockParams, BlockService, ChainPayload, Mempool,
};
use chain_types::{
    crypto,
    event::{ChainEvent, EventSink},
    AnyBlock, Block, ChainType, Genesis, MainPayload, SpinePayload, Transaction,
};
use secp256k1::SecretKey;
use std::sync::{Arc, Mutex};

/// Collects every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<ChainEvent>>,
}

pub fn test_db_conf() -> Config {
    Config {
        source: Source::Memory(uuid::Uuid::new_v4().into()),
        ..Default::default()
    }
}

pub fn test_conn_pool() -> ConnectionPool {
    let conf = test_db_conf();
    crate::db(&conf).unwrap()
}

pub fn test_conn_pool_with_genesis() -> ConnectionPool {
    let conn_pool = test_conn_pool();
    ensure_genesis(&conn_pool, &Genesis::default()).unwrap();
    conn_pool
}

pub fn test_node_conf() -> crate::Config {
    crate::Config {
        db: test_db_conf(),
        genesis: Genesis::default(),
        node_secret: Some(genesis_secret(1)),
    }
}

/// The secret key of a node in the default genesis.
pub fn genesis_secret(node_id: i64) -> SecretKey {
    crypto::secret_key_from_seed(&format!("genesis-node-{node_id}")).unwrap()
}

pub fn genesis_secrets() -> Vec<SecretKey> {
    Genesis::default()
        .nodes
        .iter()
        .map(|node| genesis_secret(node.node_id))
        .collect()
}

pub fn main_service(
    conn_pool: &ConnectionPool,
    events: Arc<dyn EventSink>,
) -> BlockService<MainPayload> {
    let params = Genesis::default().main_params;
    let strategy = Arc::new(MainBlocksmithStrategy::new(
        RegistryBlocksmiths::new(conn_pool.clone()),
        params.clone(),
    ));
    BlockService::<MainPayload>::new(conn_pool.clone(), params, strategy, events)
}

pub fn main_service_with_mempool(
    conn_pool: &ConnectionPool,
    events: Arc<dyn EventSink>,
    mempool: Arc<dyn Mempool>,
) -> BlockService<MainPayload> {
    main_service(conn_pool, events).with_mempool(mempool)
}

pub fn spine_service(
    conn_pool: &ConnectionPool,
    events: Arc<dyn EventSink>,
) -> BlockService<SpinePayload> {
    let params = Genesis::default().spine_params;
    let strategy = Arc::new(SpineBlocksmithStrategy::new(
        SpineKeyBlocksmiths::new(conn_pool.clone(), params.blocksmith_score),
        params.clone(),
    ));
    BlockService::<SpinePayload>::new(conn_pool.clone(), params, strategy, events)
}

/// The secret key of the genesis node at `rank` for the block following `tip`.
pub fn smith_secret<P: ChainPayload>(
    service: &BlockService<P>,
    tip: &Block<P>,
    rank: usize,
) -> SecretKey {
    let sorted = service.strategy().sorted(tip);
    let public_key = &sorted.blocksmiths()[rank].node_public_key;
    genesis_secrets()
        .into_iter()
        .find(|sk| &crypto::public_key(sk) == public_key)
        .expect("blocksmith must be a genesis node")
}

/// A block on `tip` by the blocksmith at `rank`, `delay` seconds after its
/// smith time.
pub fn next_block<P: ChainPayload>(
    service: &BlockService<P>,
    tip: &Block<P>,
    rank: usize,
    delay: i64,
    payload: P,
) -> Block<P> {
    let secret = smith_secret(service, tip, rank);
    let timestamp = service.strategy().smith_time(rank, tip) + delay;
    service.construct_block(
        BlockParams {
            previous: tip,
            timestamp,
            payload,
            total_coinbase: 0,
        },
        &secret,
    )
}

/// Push `n` empty blocks smithed by rank zero onto the current tip.
pub fn extend_chain<P: ChainPayload>(service: &BlockService<P>, n: usize) -> Vec<Block<P>> {
    let mut tip = service.last_block().unwrap();
    let mut pushed = Vec::with_capacity(n);
    for _ in 0..n {
        let block = next_block(service, &tip, 0, 0, P::default());
        tip = service.push(&tip, block, false).unwrap();
        pushed.push(tip.clone());
    }
    pushed
}

pub fn test_transaction(n: i64) -> Transaction {
    Transaction::new(format!("test-transaction-{n}").into_bytes(), n, n * 10)
}

pub fn main_payload(txs: Vec<Transaction>) -> MainPayload {
    MainPayload {
        transactions: txs,
        published_receipts: vec![],
    }
}

impl RecordingEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drain the events recorded so far.
    pub fn take(&self) -> Vec<ChainEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    fn record(&self, event: ChainEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl EventSink for RecordingEvents {
    fn broadcast_block(&self, block: AnyBlock) {
        self.record(ChainEvent::BroadcastBlock { block });
    }

    fn block_pushed(&self, block: AnyBlock) {
        self.record(ChainEvent::BlockPushed { block });
    }

    fn blocks_popped_off(&self, chain: ChainType, common_height: u32, popped: Vec<AnyBlock>) {
        self.record(ChainEvent::BlocksPoppedOff {
            chain,
            common_height,
            popped,
        });
    }
}
