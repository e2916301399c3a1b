//! Per-node chain progress flags.

use chain_types::ChainType;
use std::sync::atomic::{AtomicBool, Ordering};

/// Download and smithing state of both chains.
///
/// One instance is shared by everything running on a node.
#[derive(Debug, Default)]
pub struct ChainStatus {
    main: Flags,
    spine: Flags,
}

#[derive(Debug, Default)]
struct Flags {
    first_download_finished: AtomicBool,
    downloading: AtomicBool,
    smithing: AtomicBool,
}

impl ChainStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self, chain: ChainType) -> &Flags {
        match chain {
            ChainType::Main => &self.main,
            ChainType::Spine => &self.spine,
        }
    }

    /// Whether the initial sync of the chain has completed.
    pub fn is_first_download_finished(&self, chain: ChainType) -> bool {
        self.flags(chain)
            .first_download_finished
            .load(Ordering::Acquire)
    }

    pub fn set_first_download_finished(&self, chain: ChainType, value: bool) {
        self.flags(chain)
            .first_download_finished
            .store(value, Ordering::Release);
    }

    pub fn is_downloading(&self, chain: ChainType) -> bool {
        self.flags(chain).downloading.load(Ordering::Acquire)
    }

    pub fn set_downloading(&self, chain: ChainType, value: bool) {
        self.flags(chain).downloading.store(value, Ordering::Release);
    }

    pub fn is_smithing(&self, chain: ChainType) -> bool {
        self.flags(chain).smithing.load(Ordering::Acquire)
    }

    pub fn set_smithing(&self, chain: ChainType, value: bool) {
        self.flags(chain).smithing.store(value, Ordering::Release);
    }

    /// Mark the chain as smithing unless it already is.
    ///
    /// Returns `false` if another caller holds the flag. The winner clears it
    /// with `set_smithing(chain, false)`.
    pub fn try_begin_smithing(&self, chain: ChainType) -> bool {
        self.flags(chain)
            .smithing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_are_independent() {
        let status = ChainStatus::new();
        status.set_downloading(ChainType::Main, true);
        status.set_smithing(ChainType::Spine, true);
        assert!(status.is_downloading(ChainType::Main));
        assert!(!status.is_downloading(ChainType::Spine));
        assert!(status.is_smithing(ChainType::Spine));
        assert!(!status.is_smithing(ChainType::Main));
        assert!(!status.is_first_download_finished(ChainType::Main));
        status.set_first_download_finished(ChainType::Main, true);
        assert!(status.is_first_download_finished(ChainType::Main));
    }

    #[test]
    fn only_one_caller_begins_smithing() {
        let status = ChainStatus::new();
        let winners = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| status.try_begin_smithing(ChainType::Main)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join())
                .filter(|r| matches!(r, Ok(true)))
                .count()
        });
        assert_eq!(winners, 1);
        assert!(status.is_smithing(ChainType::Main));
        assert!(!status.try_begin_smithing(ChainType::Main));
        assert!(status.try_begin_smithing(ChainType::Spine));

        status.set_smithing(ChainType::Main, false);
        assert!(status.try_begin_smithing(ChainType::Main));
    }
}
