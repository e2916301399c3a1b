//! Pending main chain transactions.

use crate::error::MempoolError;
use chain_types::Transaction;
use std::{collections::HashMap, sync::Mutex};

/// A store of transactions not yet included in a canonical block.
pub trait Mempool: Send + Sync {
    /// Up to `limit` transactions for a new block, highest fee first.
    fn select_transactions(&self, limit: usize) -> Result<Vec<Transaction>, MempoolError>;

    /// Forget transactions included in a pushed block.
    fn remove_transactions(&self, txs: &[Transaction]) -> Result<(), MempoolError>;

    /// Restore transactions from popped blocks.
    fn backup_transactions(&self, txs: Vec<Transaction>) -> Result<(), MempoolError>;
}

/// A [`Mempool`] held in memory, keyed by transaction ID.
#[derive(Debug, Default)]
pub struct InMemoryMempool {
    txs: Mutex<HashMap<i64, Transaction>>,
}

impl InMemoryMempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transaction. Returns `false` if it was already pending.
    pub fn add_transaction(&self, tx: Transaction) -> Result<bool, MempoolError> {
        let mut txs = self.txs.lock().map_err(|_| MempoolError::LockPoisoned)?;
        Ok(txs.insert(tx.id, tx).is_none())
    }

    pub fn contains(&self, id: i64) -> Result<bool, MempoolError> {
        let txs = self.txs.lock().map_err(|_| MempoolError::LockPoisoned)?;
        Ok(txs.contains_key(&id))
    }

    pub fn len(&self) -> Result<usize, MempoolError> {
        let txs = self.txs.lock().map_err(|_| MempoolError::LockPoisoned)?;
        Ok(txs.len())
    }
}

impl Mempool for InMemoryMempool {
    fn select_transactions(&self, limit: usize) -> Result<Vec<Transaction>, MempoolError> {
        let txs = self.txs.lock().map_err(|_| MempoolError::LockPoisoned)?;
        let mut selected: Vec<_> = txs.values().cloned().collect();
        selected.sort_by(|a, b| b.fee.cmp(&a.fee).then(a.id.cmp(&b.id)));
        selected.truncate(limit);
        Ok(selected)
    }

    fn remove_transactions(&self, txs: &[Transaction]) -> Result<(), MempoolError> {
        let mut pending = self.txs.lock().map_err(|_| MempoolError::LockPoisoned)?;
        for tx in txs {
            pending.remove(&tx.id);
        }
        Ok(())
    }

    fn backup_transactions(&self, txs: Vec<Transaction>) -> Result<(), MempoolError> {
        let mut pending = self.txs.lock().map_err(|_| MempoolError::LockPoisoned)?;
        pending.extend(txs.into_iter().map(|tx| (tx.id, tx)));
        Ok(())
    }
}
