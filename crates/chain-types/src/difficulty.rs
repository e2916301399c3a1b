use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, num::ParseIntError, str::FromStr};

/// The running score used to compare competing chains of equal height.
///
/// Serialized as a decimal string so that configuration files and JSON
/// consumers never lose precision.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct CumulativeDifficulty(pub u128);

impl CumulativeDifficulty {
    /// The difficulty of an empty chain.
    pub const ZERO: Self = Self(0);

    /// The increment contributed by a blocksmith of the given rank.
    ///
    /// Rank `0` contributes the full `base`, every following rank contributes
    /// strictly less while remaining positive for `rank < base`.
    pub fn increment_for_rank(base: u128, rank: usize) -> u128 {
        let divisor = u128::try_from(rank).unwrap_or(u128::MAX).saturating_add(1);
        base / divisor
    }

    /// The difficulty after a block by a blocksmith of the given rank.
    ///
    /// Returns `None` on overflow.
    pub fn next(self, base: u128, rank: usize) -> Option<Self> {
        self.0
            .checked_add(Self::increment_for_rank(base, rank))
            .map(Self)
    }
}

impl fmt::Display for CumulativeDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for CumulativeDifficulty {
    type Err = ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for CumulativeDifficulty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CumulativeDifficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn better_rank_grows_faster() {
        let base = 1_000_000;
        let increments: Vec<_> = (0..5)
            .map(|rank| CumulativeDifficulty::increment_for_rank(base, rank))
            .collect();
        assert!(increments.windows(2).all(|w| w[0] > w[1]));
        assert!(increments.iter().all(|&inc| inc > 0));
    }

    #[test]
    fn next_detects_overflow() {
        let cd = CumulativeDifficulty(u128::MAX);
        assert_eq!(cd.next(10, 0), None);
        assert_eq!(CumulativeDifficulty(5).next(10, 1), Some(CumulativeDifficulty(10)));
    }

    #[test]
    fn serializes_as_string() {
        let cd = CumulativeDifficulty(340_282_366_920_938_463_463_374_607_431_768_211_455);
        let json = serde_json::to_string(&cd).unwrap();
        assert_eq!(json, "\"340282366920938463463374607431768211455\"");
        let back: CumulativeDifficulty = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cd);
    }
}
