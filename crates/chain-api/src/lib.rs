//! HTTP/2 API over a node's chains.
//!
//! Reads go through the chains' [`BlockService`]s on tokio's blocking pool.
//! Chain events are streamed to subscribers as server-sent events.

use axum::{routing::get, Router};
use chain::{BlockService, ChainError, ChainPayload, MegablockService, Node};
use chain_types::{event::EventTx, AnyBlock, ChainType, Hash, MainPayload, SpinePayload};
use std::{io, net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use tower_http::cors::CorsLayer;

pub mod endpoint;

/// State shared by all endpoints.
#[derive(Clone)]
pub struct State {
    pub main: Arc<BlockService<MainPayload>>,
    pub spine: Arc<BlockService<SpinePayload>>,
    pub megablocks: MegablockService,
    /// Source of chain events, if subscriptions are enabled.
    pub events: Option<EventTx>,
}

/// Read access to the blocks of either chain.
pub trait BlockReader: Send + Sync {
    fn last_block(&self) -> Result<AnyBlock, ChainError>;
    fn genesis_block(&self) -> Result<AnyBlock, ChainError>;
    fn block_by_height(&self, height: u32) -> Result<AnyBlock, ChainError>;
    fn block_by_id(&self, id: i64) -> Result<AnyBlock, ChainError>;
    fn block_by_hash(&self, hash: &Hash) -> Result<AnyBlock, ChainError>;
    fn blocks_from_height(&self, height: u32, limit: u32) -> Result<Vec<AnyBlock>, ChainError>;
}

/// An error occurred while attempting to serve a new connection.
#[derive(Debug, Error)]
pub enum ServeNextConnError {
    /// Failed to acquire the next connection.
    #[error("failed to acquire next connection: {0}")]
    Next(#[from] io::Error),
    /// Failed to serve the connection.
    #[error("{0}")]
    Serve(#[from] ServeConnError),
}

/// An error occurred while attempting to serve a connection.
#[derive(Debug, Error)]
#[error("Serve connection error: {0}")]
pub struct ServeConnError(#[from] Box<dyn std::error::Error + Send + Sync>);

/// The default maximum number of connections served at once.
pub const DEFAULT_CONNECTION_LIMIT: usize = 2_000;

/// The most blocks returned by a single listing.
pub const MAX_LIST_BLOCKS: u32 = 500;

impl State {
    /// State over the chains of `node`, with event subscriptions enabled.
    pub fn from_node(node: &Node) -> Self {
        Self {
            main: node.main().clone(),
            spine: node.spine().clone(),
            megablocks: node.megablocks().clone(),
            events: Some(node.events().clone()),
        }
    }

    /// The block reader of the given chain.
    pub fn reader(&self, chain: ChainType) -> Arc<dyn BlockReader> {
        match chain {
            ChainType::Main => self.main.clone() as Arc<dyn BlockReader>,
            ChainType::Spine => self.spine.clone() as Arc<dyn BlockReader>,
        }
    }
}

impl<P: ChainPayload> BlockReader for BlockService<P> {
    fn last_block(&self) -> Result<AnyBlock, ChainError> {
        BlockService::last_block(self).map(any)
    }

    fn genesis_block(&self) -> Result<AnyBlock, ChainError> {
        BlockService::genesis_block(self).map(any)
    }

    fn block_by_height(&self, height: u32) -> Result<AnyBlock, ChainError> {
        BlockService::block_by_height(self, height).map(any)
    }

    fn block_by_id(&self, id: i64) -> Result<AnyBlock, ChainError> {
        BlockService::block_by_id(self, id).map(any)
    }

    fn block_by_hash(&self, hash: &Hash) -> Result<AnyBlock, ChainError> {
        BlockService::block_by_hash(self, hash).map(any)
    }

    fn blocks_from_height(&self, height: u32, limit: u32) -> Result<Vec<AnyBlock>, ChainError> {
        let blocks = BlockService::blocks_from_height(self, height, limit)?;
        Ok(blocks.into_iter().map(any).collect())
    }
}

fn any<P: ChainPayload>(block: chain_types::Block<P>) -> AnyBlock {
    P::into_any(Arc::new(block))
}

/// Accept and serve connections until the listener fails irrecoverably.
///
/// At most `conn_limit` connections are served concurrently.
///
/// ```no_run
/// # #[tokio::main]
/// # async fn main() {
/// # use chain::Node;
/// let node = Node::new(&chain::Config::default()).unwrap();
/// let router = chain_api::router(chain_api::State::from_node(&node));
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:3553").await.unwrap();
/// chain_api::serve(&router, &listener, chain_api::DEFAULT_CONNECTION_LIMIT).await;
/// # }
/// ```
pub async fn serve(router: &Router, listener: &TcpListener, conn_limit: usize) {
    let mut conn_set = JoinSet::new();
    loop {
        serve_next_conn(router, listener, conn_limit, &mut conn_set).await;
    }
}

/// Accept the next connection and spawn a task serving it.
///
/// If we're at the connection limit, this first awaits for a connection task to
/// become available.
pub async fn serve_next_conn(
    router: &Router,
    listener: &TcpListener,
    conn_limit: usize,
    conn_set: &mut JoinSet<()>,
) {
    let stream = match next_conn(listener, conn_limit, conn_set).await {
        Ok((stream, _remote_addr)) => {
            #[cfg(feature = "tracing")]
            tracing::trace!("Accepted new connection from: {_remote_addr}");
            stream
        }
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::trace!("Failed to accept connection {_err}");
            return;
        }
    };

    let router = router.clone();
    conn_set.spawn(async move {
        if let Err(_err) = serve_conn(&router, stream).await {
            #[cfg(feature = "tracing")]
            tracing::trace!("Serve connection error: {_err}");
        }
    });
}

/// Accept and return the next TCP stream connection.
///
/// If we're at the connection limit, this first awaits for a connection task to
/// become available.
pub async fn next_conn(
    listener: &TcpListener,
    conn_limit: usize,
    conn_set: &mut JoinSet<()>,
) -> io::Result<(TcpStream, SocketAddr)> {
    if conn_set.len() >= conn_limit {
        #[cfg(feature = "tracing")]
        tracing::info!("Connection limit reached: {conn_limit}");
        if let Some(Err(_err)) = conn_set.join_next().await {
            #[cfg(feature = "tracing")]
            tracing::warn!("Connection task failed: {_err}");
        }
    }
    listener.accept().await
}

/// Serve a newly accepted TCP stream over HTTP/2.
pub async fn serve_conn(router: &Router, stream: TcpStream) -> Result<(), ServeConnError> {
    // Hyper has its own IO and service traits, `TokioIo` and `service_fn`
    // bridge them to tokio and tower.
    let stream = hyper_util::rt::TokioIo::new(stream);
    let hyper_service = hyper::service::service_fn(
        move |request: axum::extract::Request<hyper::body::Incoming>| {
            tower::Service::call(&mut router.clone(), request)
        },
    );

    let executor = hyper_util::rt::TokioExecutor::new();
    let conn = hyper_util::server::conn::auto::Builder::new(executor).http2_only();
    conn.serve_connection(stream, hyper_service)
        .await
        .map_err(ServeConnError)
}

/// Construct the endpoint router.
pub fn router(state: State) -> Router {
    use endpoint::*;
    Router::new()
        .route(health_check::PATH, get(health_check::handler))
        .route(last_block::PATH, get(last_block::handler))
        .route(genesis_block::PATH, get(genesis_block::handler))
        .route(block_by_height::PATH, get(block_by_height::handler))
        .route(block_by_id::PATH, get(block_by_id::handler))
        .route(block_by_hash::PATH, get(block_by_hash::handler))
        .route(list_blocks::PATH, get(list_blocks::handler))
        .route(megablock::PATH, get(megablock::handler))
        .route(subscribe_events::PATH, get(subscribe_events::handler))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([http::Method::GET, http::Method::OPTIONS])
        .allow_headers([http::header::CONTENT_TYPE])
}
