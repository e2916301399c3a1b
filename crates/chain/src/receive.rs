//! Handling of blocks relayed by peers.
//!
//! A received block either extends the local tip, or competes with it for the
//! same parent. A competing block with an earlier timestamp replaces the tip.
//! Anything else is rejected, except that a peer relaying our own tip gets a
//! courtesy receipt.

use crate::{
    block_service::BlockService,
    error::ReceiveError,
    payload::ChainPayload,
    receipt::ReceiptService,
};
use chain_types::{BatchReceipt, Block, DatumType, Hash};
use secp256k1::SecretKey;
use std::sync::Arc;


/// Accepts relayed blocks onto a [`BlockService`] and issues receipts for them.
pub struct BlockReceiver<P: ChainPayload> {
    service: Arc<BlockService<P>>,
    receipts: Arc<dyn ReceiptService>,
    clock: fn() -> i64,
}

enum Attempt<P> {
    /// `pushed` is canonical and built on `previous`.
    Accepted { previous: Block<P>, pushed: Block<P> },
    /// The tip changed before the write lock was taken.
    TipMoved(Block<P>),
}

impl<P: ChainPayload> BlockReceiver<P> {
    pub fn new(service: Arc<BlockService<P>>, receipts: Arc<dyn ReceiptService>) -> Self {
        Self {
            service,
            receipts,
            clock: crate::unix_now,
        }
    }

    /// Use `clock` as the observed time when validating timestamps.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn service(&self) -> &Arc<BlockService<P>> {
        &self.service
    }

    /// Try to make `candidate`, relayed by `sender_public_key`, canonical.
    ///
    /// Returns the receipt issued to the sender, if any. The receipt
    /// references the block the candidate was pushed onto.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(chain = %P::CHAIN)))]
    pub fn receive_block(
        &self,
        sender_public_key: &[u8],
        local_tip: &Block<P>,
        candidate: Block<P>,
        local_secret: &SecretKey,
    ) -> Result<Option<BatchReceipt>, ReceiveError> {
        let Some(previous_hash) = candidate.previous_block_hash else {
            return Err(ReceiveError::MissingPreviousBlockHash);
        };

        let mut tip = local_tip.clone();
        loop {
            let attempt = if tip.block_hash == previous_hash {
                self.extend(&tip, &candidate)?
            } else if competes(&tip, &candidate) {
                self.replace(&tip, &candidate, &previous_hash)?
            } else {
                return self.courtesy(sender_public_key, &tip, &candidate, local_secret);
            };
            match attempt {
                Attempt::Accepted { previous, pushed } => {
                    let receipt = self.receipts.generate_receipt(
                        DatumType::Block,
                        &pushed.block_hash,
                        (previous.height, previous.block_hash),
                        sender_public_key,
                        local_secret,
                    )?;
                    return Ok(Some(receipt));
                }
                Attempt::TipMoved(fresh) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("tip moved to {} while receiving, re-evaluating", fresh.height);
                    tip = fresh;
                }
            }
        }
    }

    fn extend(&self, tip: &Block<P>, candidate: &Block<P>) -> Result<Attempt<P>, ReceiveError> {
        let guard = self.service.lock()?;
        let current = self.service.last_block()?;
        if current.block_hash != tip.block_hash {
            return Ok(Attempt::TipMoved(current));
        }
        self.service.validate(candidate, &current, (self.clock)())?;
        let pushed = self.service.push_locked(&current, candidate.clone())?;
        drop(guard);
        self.service.emit_pushed(&pushed, true);
        Ok(Attempt::Accepted {
            previous: current,
            pushed,
        })
    }

    fn replace(
        &self,
        tip: &Block<P>,
        candidate: &Block<P>,
        parent_hash: &Hash,
    ) -> Result<Attempt<P>, ReceiveError> {
        let guard = self.service.lock()?;
        let current = self.service.last_block()?;
        if current.block_hash != tip.block_hash {
            return Ok(Attempt::TipMoved(current));
        }
        let parent = self.service.block_by_hash(parent_hash)?;
        let popped = self.service.pop_off_locked(&parent)?;
        if popped.is_empty() {
            return Err(ReceiveError::InvalidBranch);
        }

        let pushed = self
            .service
            .validate(candidate, &parent, (self.clock)())
            .and_then(|()| self.service.push_locked(&parent, candidate.clone()));
        match pushed {
            Ok(pushed) => {
                drop(guard);
                self.service.emit_popped(parent.height, &popped);
                self.service.emit_pushed(&pushed, true);
                Ok(Attempt::Accepted {
                    previous: parent,
                    pushed,
                })
            }
            Err(err) => {
                self.restore(&parent, popped);
                Err(err.into())
            }
        }
    }

    /// Re-push blocks popped off `parent`, given newest first.
    fn restore(&self, parent: &Block<P>, popped: Vec<Block<P>>) {
        let mut previous = parent.clone();
        for block in popped.into_iter().rev() {
            match self.service.push_locked(&previous, block) {
                Ok(block) => previous = block,
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(
                        "failed to restore popped block above height {}: {_err}",
                        previous.height
                    );
                    break;
                }
            }
        }
    }

    fn courtesy(
        &self,
        sender_public_key: &[u8],
        tip: &Block<P>,
        candidate: &Block<P>,
        local_secret: &SecretKey,
    ) -> Result<Option<BatchReceipt>, ReceiveError> {
        if self
            .receipts
            .has_receipt(&candidate.block_hash, sender_public_key)?
        {
            return Err(ReceiveError::BlockAlreadyReceipted);
        }
        if candidate.block_hash != tip.block_hash {
            return Err(ReceiveError::InvalidBranch);
        }
        let previous = match tip.previous_block_hash {
            Some(hash) => self.service.block_by_hash(&hash)?,
            None => tip.clone(),
        };
        let receipt = self.receipts.generate_receipt(
            DatumType::Block,
            &tip.block_hash,
            (previous.height, previous.block_hash),
            sender_public_key,
            local_secret,
        )?;
        Ok(Some(receipt))
    }
}

/// Same parent as the tip, and an earlier timestamp.
fn competes<P>(tip: &Block<P>, candidate: &Block<P>) -> bool {
    candidate.block_hash != tip.block_hash
        && candidate.previous_block_hash == tip.previous_block_hash
        && candidate.timestamp < tip.timestamp
}
