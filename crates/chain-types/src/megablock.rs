use crate::Hash;
use serde::{Deserialize, Serialize};

/// A snapshot manifest anchored on the spine chain.
///
/// Once the spine chain reaches `spine_block_height`, main chain blocks at or
/// below `main_block_height` can no longer be popped off.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Megablock {
    /// Row identifier, zero until persisted.
    pub id: i64,
    /// Hash of the complete snapshot.
    pub full_snapshot_hash: Hash,
    /// The main chain height the snapshot was taken at.
    pub main_block_height: u32,
    /// The spine chain height the snapshot is anchored at.
    pub spine_block_height: u32,
    /// Until when the snapshot may be generated.
    pub expiration_timestamp: i64,
    /// Ordered hashes of the snapshot's file chunks.
    pub chunk_hashes: Vec<Hash>,
}
