use serde::{Deserialize, Serialize};

/// A node eligible to smith the next block, with its derived ordering values.
///
/// Computed fresh for each reference block and never persisted.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Blocksmith {
    /// The node's numeric identifier.
    pub node_id: i64,
    /// The node's compressed public key.
    pub node_public_key: Vec<u8>,
    /// The participation score the node held at the reference height.
    pub score: u64,
    /// Pseudo-random value derived from the reference block seed and node ID.
    pub block_seed: u64,
    /// `(block_seed << 32) / max(score, 1)`.
    pub node_order: u128,
}

/// A node registered to smith main chain blocks.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct NodeRegistration {
    /// The node's numeric identifier.
    pub node_id: i64,
    /// The node's compressed public key.
    pub node_public_key: Vec<u8>,
    /// Only nodes with a positive score are eligible.
    pub participation_score: u64,
    /// The main chain height at which the registration took effect.
    pub registration_height: u32,
}

impl Blocksmith {
    /// A blocksmith with its seed and order still to be computed.
    pub fn new(node_id: i64, node_public_key: Vec<u8>, score: u64) -> Self {
        Self {
            node_id,
            node_public_key,
            score,
            block_seed: 0,
            node_order: 0,
        }
    }
}

impl From<NodeRegistration> for Blocksmith {
    fn from(reg: NodeRegistration) -> Self {
        Self::new(reg.node_id, reg.node_public_key, reg.participation_score)
    }
}
