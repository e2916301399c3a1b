use super::*;
use chain_types::{Genesis, MainPayload, SpinePayload};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

#[derive(Default)]
struct FakeSource {
    nodes: Mutex<Vec<Blocksmith>>,
    fail: AtomicBool,
    queries: AtomicUsize,
}

impl FakeSource {
    fn with_nodes(nodes: Vec<Blocksmith>) -> Arc<Self> {
        Arc::new(Self {
            nodes: Mutex::new(nodes),
            ..Default::default()
        })
    }

    fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl BlocksmithSource for FakeSource {
    fn blocksmiths_at(&self, _height: u32) -> Result<Vec<Blocksmith>, QueryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(rusqlite::Error::InvalidQuery.into());
        }
        Ok(self.nodes.lock().unwrap().clone())
    }
}

fn nodes(n: i64) -> Vec<Blocksmith> {
    (1..=n)
        .map(|id| Blocksmith::new(id, vec![id as u8; 33], 100 * id as u64))
        .collect()
}

fn main_ref(height: u32, seed: &[u8]) -> Block<MainPayload> {
    let mut block = Genesis::default().block::<MainPayload>();
    block.height = height;
    block.block_seed = seed.to_vec();
    block
}

#[test]
fn order_is_sorted_by_seed_then_node_id() {
    let sorted = SortedBlocksmiths::new(0, b"seed", nodes(8));
    let seeds: Vec<_> = sorted.blocksmiths().iter().map(|b| b.block_seed).collect();
    let mut expected = seeds.clone();
    expected.sort();
    assert_eq!(seeds, expected);
    for (rank, b) in sorted.blocksmiths().iter().enumerate() {
        assert_eq!(sorted.rank_of(&b.node_public_key), Some(rank));
        assert_eq!(b.block_seed, blocksmith_seed(b"seed", b.node_id));
        assert_eq!(b.node_order, node_order(b.block_seed, b.score));
    }
}

#[test]
fn order_is_deterministic() {
    let a = SortedBlocksmiths::new(7, b"reference", nodes(5));
    let mut reversed = nodes(5);
    reversed.reverse();
    let b = SortedBlocksmiths::new(7, b"reference", reversed);
    assert_eq!(a, b);

    let c = SortedBlocksmiths::new(7, b"other reference", nodes(5));
    assert_eq!(c.len(), 5);
}

#[test]
fn seed_reads_big_endian_hash_prefix() {
    let hash = chain_types::crypto::hash_bytes(&[b"abc".as_slice(), &5i64.to_be_bytes()].concat());
    let expected = u64::from_be_bytes(hash[..8].try_into().unwrap());
    assert_eq!(blocksmith_seed(b"abc", 5), expected);
}

#[test]
fn higher_score_gives_smaller_order() {
    let seed = 1 << 40;
    assert!(node_order(seed, 1_000) < node_order(seed, 10));
    assert_eq!(node_order(seed, 0), node_order(seed, 1));
    assert_eq!(node_order(3, 1), 3u128 << 32);
}

#[test]
fn smith_time_grows_with_rank() {
    let params = ChainParams::main();
    assert_eq!(smith_time(&params, 1_000, 0), 1_015);
    assert_eq!(smith_time(&params, 1_000, 3), 1_045);
    let params = ChainParams::spine();
    assert_eq!(smith_time(&params, 1_000, 1), 1_360);
}

#[test]
fn main_cache_is_keyed_by_height() {
    let source = FakeSource::with_nodes(nodes(3));
    let strategy = MainBlocksmithStrategy::new(source.clone(), ChainParams::main());

    let first = strategy.sorted(&main_ref(4, b"a"));
    let again = strategy.sorted(&main_ref(4, b"a"));
    assert_eq!(first, again);
    assert_eq!(source.queries(), 1);

    strategy.sorted(&main_ref(5, b"b"));
    assert_eq!(source.queries(), 2);
}

#[test]
fn spine_cache_is_keyed_by_id() {
    let source = FakeSource::with_nodes(nodes(3));
    let strategy = SpineBlocksmithStrategy::new(source.clone(), ChainParams::spine());

    let mut reference = Genesis::default().block::<SpinePayload>();
    strategy.sorted(&reference);
    strategy.sorted(&reference);
    assert_eq!(source.queries(), 1);

    // Same height, different block.
    reference.id += 1;
    reference.block_seed = b"reset".to_vec();
    let reset = strategy.sorted(&reference);
    assert_eq!(source.queries(), 2);
    assert_eq!(reset.key(), reference.id);
}

#[test]
fn invalidate_forces_requery() {
    let source = FakeSource::with_nodes(nodes(2));
    let strategy = MainBlocksmithStrategy::new(source.clone(), ChainParams::main());
    let reference = main_ref(1, b"x");

    assert_eq!(strategy.sorted_blocksmiths(&reference).len(), 2);
    source.nodes.lock().unwrap().extend(nodes(4).into_iter().skip(2));
    assert_eq!(strategy.sorted_blocksmiths(&reference).len(), 2);

    strategy.invalidate();
    assert_eq!(strategy.sorted_blocksmiths(&reference).len(), 4);
    assert_eq!(source.queries(), 2);
}

#[test]
fn sort_blocksmiths_recomputes_even_when_cached() {
    let source = FakeSource::with_nodes(nodes(2));
    let strategy = MainBlocksmithStrategy::new(source.clone(), ChainParams::main());
    let reference = main_ref(1, b"x");
    strategy.sorted(&reference);
    strategy.sort_blocksmiths(&reference);
    assert_eq!(source.queries(), 2);
}

#[test]
fn query_failure_returns_stale_order() {
    let source = FakeSource::with_nodes(nodes(3));
    let strategy = MainBlocksmithStrategy::new(source.clone(), ChainParams::main());
    let stale = strategy.sorted(&main_ref(1, b"one"));

    source.fail.store(true, Ordering::SeqCst);
    let next = strategy.sorted(&main_ref(2, b"two"));
    assert_eq!(next, stale);
    assert_eq!(strategy.sorted_blocksmiths_map(&main_ref(2, b"two")), *stale.ranks());
}

#[test]
fn query_failure_without_cache_is_empty() {
    let source = FakeSource::with_nodes(nodes(3));
    source.fail.store(true, Ordering::SeqCst);
    let strategy = MainBlocksmithStrategy::new(source, ChainParams::main());
    assert!(strategy.sorted(&main_ref(1, b"one")).is_empty());
}

#[test]
fn lottery_is_independent_of_smithing_order() {
    let sorted = SortedBlocksmiths::new(0, b"lottery", nodes(6));
    let winners = coinbase_lottery_winners(sorted.blocksmiths(), 3);
    assert_eq!(winners.len(), 3);

    let mut shuffled = sorted.blocksmiths().to_vec();
    shuffled.reverse();
    assert_eq!(coinbase_lottery_winners(&shuffled, 3), winners);

    let orders: Vec<_> = winners.iter().map(|w| w.node_order).collect();
    assert!(orders.windows(2).all(|w| w[0] <= w[1]));
    let max_winner = orders[2];
    for b in sorted.blocksmiths() {
        if !winners.contains(b) {
            assert!(b.node_order >= max_winner);
        }
    }
}

#[test]
fn lottery_ties_break_by_node_id() {
    let mut a = Blocksmith::new(9, vec![9], 1);
    let mut b = Blocksmith::new(2, vec![2], 1);
    a.node_order = 5;
    b.node_order = 5;
    let winners = coinbase_lottery_winners(&[a, b], 1);
    assert_eq!(winners[0].node_id, 2);
}

#[test]
fn coinbase_remainder_goes_to_first_winner() {
    let winners = nodes(3);
    let shares = coinbase_shares(100, &winners);
    assert_eq!(shares, vec![(1, 34), (2, 33), (3, 33)]);
    assert!(coinbase_shares(100, &[]).is_empty());
    assert!(coinbase_shares(0, &winners).is_empty());
}
