use crate::Hash;
use serde::{Deserialize, Serialize};

/// The kind of datum a receipt attests to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatumType {
    /// A block relayed by the sender.
    Block,
    /// A transaction relayed by the sender.
    Transaction,
}

/// A signed attestation that the recipient received a datum from the sender.
///
/// Receipts are later published in main blocks and feed participation scoring.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct BatchReceipt {
    /// The node that relayed the datum.
    pub sender_public_key: Vec<u8>,
    /// The node that received the datum and signed this receipt.
    pub recipient_public_key: Vec<u8>,
    /// The kind of datum received.
    pub datum_type: DatumType,
    /// The hash of the received datum.
    pub datum_hash: Hash,
    /// The height of the recipient's tip at the time of receipt.
    pub reference_block_height: u32,
    /// The hash of the recipient's tip at the time of receipt.
    pub reference_block_hash: Hash,
    /// The receipt merkle root this receipt links to, if any.
    pub rmr_linked: Option<Hash>,
    /// The recipient's signature over [`BatchReceipt::unsigned_bytes`].
    pub recipient_signature: Vec<u8>,
}

impl DatumType {
    /// The numeric code used in byte encodings.
    pub fn code(&self) -> u32 {
        match self {
            DatumType::Block => 1,
            DatumType::Transaction => 2,
        }
    }
}

impl BatchReceipt {
    /// The bytes covered by the recipient's signature.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(200);
        buf.extend_from_slice(&self.sender_public_key);
        buf.extend_from_slice(&self.recipient_public_key);
        buf.extend_from_slice(&self.datum_type.code().to_le_bytes());
        buf.extend_from_slice(&self.datum_hash);
        buf.extend_from_slice(&self.reference_block_height.to_le_bytes());
        buf.extend_from_slice(&self.reference_block_hash);
        buf.extend_from_slice(&self.rmr_linked.unwrap_or_default());
        buf
    }

    /// The full byte encoding including the recipient's signature.
    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = self.unsigned_bytes();
        buf.extend_from_slice(&self.recipient_signature);
        buf
    }
}
