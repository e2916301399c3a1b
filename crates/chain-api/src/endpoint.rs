//! Provides a small module for each endpoint with associated `PATH` and `handler`.
//!
//! Block endpoints are prefixed with the chain they read, either `main` or
//! `spine`.

use crate::BlockReader;
use axum::{
    extract::{Path, Query, State},
    response::{
        sse::{self, Sse},
        IntoResponse,
    },
    Json,
};
use chain::ChainError;
use chain_types::{AnyBlock, ChainType, Hash, Megablock, UnknownChainType};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

/// Query parameters of the `blocks` endpoint.
#[derive(Deserialize)]
pub struct BlocksQuery {
    /// The first height to list.
    #[serde(default)]
    pub from: u32,
    /// At most this many blocks, capped at [`crate::MAX_LIST_BLOCKS`].
    pub limit: Option<u32>,
}

/// Any endpoint error that might occur.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    UnknownChain(#[from] UnknownChainType),
    #[error("failed to decode from hex string: {0}")]
    HexDecode(#[from] hex::FromHexError),
    #[error("expected a 32 byte hash, found {0} bytes")]
    HashLength(usize),
    #[error("chain query failed: {0}")]
    Chain(#[from] ChainError),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("event subscriptions are disabled")]
    SubscriptionsDisabled,
}

/// An error produced by a subscription endpoint stream.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// An axum error occurred.
    #[error("an axum error occurred: {0}")]
    Axum(#[from] axum::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Error::UnknownChain(_) | Error::HexDecode(_) | Error::HashLength(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Chain(ChainError::BlockNotFound { .. } | ChainError::GenesisNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Error::SubscriptionsDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Error::Chain(_) | Error::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Run `f` against the reader of `chain` on the blocking pool.
async fn read<T, F>(state: &crate::State, chain: &str, f: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce(&dyn BlockReader) -> Result<T, ChainError> + Send + 'static,
{
    let chain: ChainType = chain.parse()?;
    let reader = state.reader(chain);
    let res = tokio::task::spawn_blocking(move || f(&*reader)).await?;
    Ok(res?)
}

/// The return a health check response.
pub mod health_check {
    pub const PATH: &str = "/";
    pub async fn handler() {}
}

/// The current tip of a chain.
pub mod last_block {
    use super::*;
    pub const PATH: &str = "/:chain/last-block";
    pub async fn handler(
        State(state): State<crate::State>,
        Path(chain): Path<String>,
    ) -> Result<Json<AnyBlock>, Error> {
        let block = read(&state, &chain, |r| r.last_block()).await?;
        Ok(Json(block))
    }
}

/// The genesis block of a chain.
pub mod genesis_block {
    use super::*;
    pub const PATH: &str = "/:chain/genesis";
    pub async fn handler(
        State(state): State<crate::State>,
        Path(chain): Path<String>,
    ) -> Result<Json<AnyBlock>, Error> {
        let block = read(&state, &chain, |r| r.genesis_block()).await?;
        Ok(Json(block))
    }
}

pub mod block_by_height {
    use super::*;
    pub const PATH: &str = "/:chain/block/:height";
    pub async fn handler(
        State(state): State<crate::State>,
        Path((chain, height)): Path<(String, u32)>,
    ) -> Result<Json<AnyBlock>, Error> {
        let block = read(&state, &chain, move |r| r.block_by_height(height)).await?;
        Ok(Json(block))
    }
}

pub mod block_by_id {
    use super::*;
    pub const PATH: &str = "/:chain/block-id/:id";
    pub async fn handler(
        State(state): State<crate::State>,
        Path((chain, id)): Path<(String, i64)>,
    ) -> Result<Json<AnyBlock>, Error> {
        let block = read(&state, &chain, move |r| r.block_by_id(id)).await?;
        Ok(Json(block))
    }
}

/// Takes the block hash as a hex encoded path parameter.
pub mod block_by_hash {
    use super::*;
    pub const PATH: &str = "/:chain/block-hash/:hash";
    pub async fn handler(
        State(state): State<crate::State>,
        Path((chain, hash)): Path<(String, String)>,
    ) -> Result<Json<AnyBlock>, Error> {
        let bytes = hex::decode(hash)?;
        let hash: Hash = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::HashLength(bytes.len()))?;
        let block = read(&state, &chain, move |r| r.block_by_hash(&hash)).await?;
        Ok(Json(block))
    }
}

/// Blocks in ascending height order starting at `from`.
pub mod list_blocks {
    use super::*;
    pub const PATH: &str = "/:chain/blocks";
    pub async fn handler(
        State(state): State<crate::State>,
        Path(chain): Path<String>,
        Query(query): Query<BlocksQuery>,
    ) -> Result<Json<Vec<AnyBlock>>, Error> {
        let limit = query
            .limit
            .unwrap_or(crate::MAX_LIST_BLOCKS)
            .min(crate::MAX_LIST_BLOCKS);
        let blocks = read(&state, &chain, move |r| r.blocks_from_height(query.from, limit)).await?;
        Ok(Json(blocks))
    }
}

/// The megablock anchored at the given spine height, if any.
pub mod megablock {
    use super::*;
    pub const PATH: &str = "/megablock/:spine_height";
    pub async fn handler(
        State(state): State<crate::State>,
        Path(spine_height): Path<u32>,
    ) -> Result<Json<Option<Megablock>>, Error> {
        let megablocks = state.megablocks.clone();
        let megablock = tokio::task::spawn_blocking(move || {
            megablocks.megablock_by_spine_height(spine_height)
        })
        .await??;
        Ok(Json(megablock))
    }
}

/// Streams every chain event from the time of subscription.
///
/// A subscriber that falls behind receives a `lagged` event carrying the
/// number of missed events.
pub mod subscribe_events {
    use super::*;
    pub const PATH: &str = "/subscribe-events";
    pub async fn handler(
        State(state): State<crate::State>,
    ) -> Result<Sse<impl Stream<Item = Result<sse::Event, SubscriptionError>>>, Error> {
        let events = state.events.ok_or(Error::SubscriptionsDisabled)?;
        let rx = events.new_listener().into_inner();
        let sse_events = BroadcastStream::new(rx).map(|res| match res {
            Ok(event) => Ok(sse::Event::default().json_data(event)?),
            Err(BroadcastStreamRecvError::Lagged(missed)) => Ok(sse::Event::default()
                .event("lagged")
                .data(missed.to_string())),
        });
        Ok(Sse::new(sse_events).keep_alive(sse::KeepAlive::default()))
    }
}
