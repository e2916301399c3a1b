use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Identifies one of the two chains managed by a node.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    /// The chain carrying transactions and economic state.
    Main,
    /// The checkpoint chain carrying spine public keys and megablock anchors.
    Spine,
}

/// The given string does not name a chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownChainType(pub String);

impl ChainType {
    /// Both chains, main first.
    pub const ALL: [ChainType; 2] = [ChainType::Main, ChainType::Spine];

    /// The lowercase name of the chain.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainType::Main => "main",
            ChainType::Spine => "spine",
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainType {
    type Err = UnknownChainType;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(ChainType::Main),
            "spine" => Ok(ChainType::Spine),
            other => Err(UnknownChainType(other.to_string())),
        }
    }
}

impl fmt::Display for UnknownChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown chain type `{}`, expected `main` or `spine`", self.0)
    }
}

impl std::error::Error for UnknownChainType {}
