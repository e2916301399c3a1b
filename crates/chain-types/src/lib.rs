//! Core types shared by the main and spine chains.
//!
//! Both chains move the same [`Block`] shape through the same state machine.
//! They differ only in their [`Payload`]: the main chain carries
//! [`Transaction`]s and [`PublishedReceipt`]s, the spine chain carries
//! [`SpinePublicKey`]s for the nodes allowed to smith spine blocks.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub use block::{AnyBlock, Block};
pub use blocksmith::{Blocksmith, NodeRegistration};
pub use chain_type::{ChainType, UnknownChainType};
pub use difficulty::CumulativeDifficulty;
pub use genesis::{Genesis, GenesisBlock, GenesisNode, GenesisTransaction, DEFAULT_GENESIS};
pub use megablock::Megablock;
pub use params::ChainParams;
pub use payload::{
    MainPayload, Payload, PublicKeyAction, PublishedReceipt, SpinePayload, SpinePublicKey,
    Transaction,
};
pub use receipt::{BatchReceipt, DatumType};

pub mod block;
mod blocksmith;
mod chain_type;
pub mod crypto;
mod difficulty;
pub mod event;
mod genesis;
mod megablock;
mod params;
mod payload;
mod receipt;

/// A SHA-256 digest.
pub type Hash = [u8; 32];

/// Serde helpers for representing byte vectors as hex strings in configuration files.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
