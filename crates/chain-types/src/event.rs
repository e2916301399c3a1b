//! Notifications emitted by the chain after a write completes.

use crate::{AnyBlock, ChainType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(feature = "event-notify")]
use tokio::sync::broadcast::{self, error::RecvError, Receiver, Sender};

/// Capacity of the broadcast channel behind [`EventTx`].
#[cfg(feature = "event-notify")]
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A change to one of the chains.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ChainEvent {
    /// A locally accepted block that should be gossiped to peers.
    BroadcastBlock {
        /// The block to gossip.
        block: AnyBlock,
    },
    /// A block became the new tip.
    BlockPushed {
        /// The new tip.
        block: AnyBlock,
    },
    /// Blocks above `common_height` were removed, newest first.
    BlocksPoppedOff {
        /// The chain that was rolled back.
        chain: ChainType,
        /// The height of the new tip.
        common_height: u32,
        /// The removed blocks.
        popped: Vec<AnyBlock>,
    },
}

/// Receives chain events. Implementations must not block.
pub trait EventSink: Send + Sync {
    /// A block should be broadcast to peers.
    fn broadcast_block(&self, block: AnyBlock);
    /// A block was pushed onto its chain.
    fn block_pushed(&self, block: AnyBlock);
    /// Blocks were popped off a chain.
    fn blocks_popped_off(&self, chain: ChainType, common_height: u32, popped: Vec<AnyBlock>);
}

/// Discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEvents;

/// Wrapper around a `broadcast::Sender` to notify listeners of chain events.
#[cfg(feature = "event-notify")]
#[derive(Clone, Debug)]
pub struct EventTx(Sender<ChainEvent>);

/// Wrapper around a `broadcast::Receiver` to listen for chain events.
#[cfg(feature = "event-notify")]
#[derive(Debug)]
pub struct EventRx(Receiver<ChainEvent>);

impl EventSink for NoopEvents {
    fn broadcast_block(&self, _block: AnyBlock) {}
    fn block_pushed(&self, _block: AnyBlock) {}
    fn blocks_popped_off(&self, _chain: ChainType, _common_height: u32, _popped: Vec<AnyBlock>) {}
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn broadcast_block(&self, block: AnyBlock) {
        (**self).broadcast_block(block)
    }
    fn block_pushed(&self, block: AnyBlock) {
        (**self).block_pushed(block)
    }
    fn blocks_popped_off(&self, chain: ChainType, common_height: u32, popped: Vec<AnyBlock>) {
        (**self).blocks_popped_off(chain, common_height, popped)
    }
}

#[cfg(feature = "event-notify")]
impl EventTx {
    /// Create a new [`EventTx`] to notify listeners of chain events.
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self(tx)
    }

    /// Send an event to all current listeners.
    ///
    /// Best effort. Events sent while nobody listens are dropped.
    pub fn notify(&self, event: ChainEvent) {
        let _ = self.0.send(event);
    }

    /// Create a new [`EventRx`] that sees events sent from now on.
    pub fn new_listener(&self) -> EventRx {
        EventRx(self.0.subscribe())
    }

    /// The number of listeners.
    pub fn receiver_count(&self) -> usize {
        self.0.receiver_count()
    }
}

#[cfg(feature = "event-notify")]
impl Default for EventTx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "event-notify")]
impl EventSink for EventTx {
    fn broadcast_block(&self, block: AnyBlock) {
        self.notify(ChainEvent::BroadcastBlock { block });
    }
    fn block_pushed(&self, block: AnyBlock) {
        self.notify(ChainEvent::BlockPushed { block });
    }
    fn blocks_popped_off(&self, chain: ChainType, common_height: u32, popped: Vec<AnyBlock>) {
        self.notify(ChainEvent::BlocksPoppedOff {
            chain,
            common_height,
            popped,
        });
    }
}

#[cfg(feature = "event-notify")]
impl EventRx {
    /// Wait for the next event.
    ///
    /// Returns [`RecvError::Lagged`] if this listener fell behind.
    pub async fn recv(&mut self) -> Result<ChainEvent, RecvError> {
        self.0.recv().await
    }

    /// Unwrap the inner receiver, e.g. to adapt it into a stream.
    pub fn into_inner(self) -> Receiver<ChainEvent> {
        self.0
    }
}
