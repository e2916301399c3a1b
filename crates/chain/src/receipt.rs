//! Signed receipts for data relayed to this node.

use crate::error::ReceiptError;
use chain_db::pool::ConnectionPool;
use chain_types::{crypto, BatchReceipt, DatumType, Hash};
use secp256k1::SecretKey;

/// Issues receipts and remembers to whom.
pub trait ReceiptService: Send + Sync {
    /// Whether a receipt for `datum_hash` was already issued to `sender_public_key`.
    fn has_receipt(&self, datum_hash: &Hash, sender_public_key: &[u8]) -> Result<bool, ReceiptError>;

    /// Sign a receipt for a datum received from `sender_public_key` while the
    /// local tip was the reference block.
    ///
    /// Fails with [`ReceiptError::AlreadyIssued`] on a second request for the
    /// same datum and sender.
    fn generate_receipt(
        &self,
        datum_type: DatumType,
        datum_hash: &Hash,
        reference: (u32, Hash),
        sender_public_key: &[u8],
        secret_key: &SecretKey,
    ) -> Result<BatchReceipt, ReceiptError>;
}

/// A [`ReceiptService`] recording issued receipts in the `receipt_marker` table.
#[derive(Clone)]
pub struct DbReceiptService {
    pool: ConnectionPool,
}

impl DbReceiptService {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

impl ReceiptService for DbReceiptService {
    fn has_receipt(&self, datum_hash: &Hash, sender_public_key: &[u8]) -> Result<bool, ReceiptError> {
        let conn = self.pool.acquire();
        Ok(chain_db::get_receipt_marker(&conn, datum_hash, sender_public_key)?.is_some())
    }

    fn generate_receipt(
        &self,
        datum_type: DatumType,
        datum_hash: &Hash,
        (reference_block_height, reference_block_hash): (u32, Hash),
        sender_public_key: &[u8],
        secret_key: &SecretKey,
    ) -> Result<BatchReceipt, ReceiptError> {
        let conn = self.pool.acquire();
        if !chain_db::insert_receipt_marker(&conn, datum_hash, sender_public_key, reference_block_height)? {
            return Err(ReceiptError::AlreadyIssued);
        }
        let mut receipt = BatchReceipt {
            sender_public_key: sender_public_key.to_vec(),
            recipient_public_key: crypto::public_key(secret_key),
            datum_type,
            datum_hash: *datum_hash,
            reference_block_height,
            reference_block_hash,
            rmr_linked: None,
            recipient_signature: vec![],
        };
        receipt.recipient_signature = crypto::sign(&receipt.unsigned_bytes(), secret_key);
        Ok(receipt)
    }
}
