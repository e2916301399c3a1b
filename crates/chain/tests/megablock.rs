#![cfg(feature = "test-utils")]

use chain::{test_utils, Node};

fn node() -> Node {
    Node::new(&test_utils::test_node_conf()).unwrap()
}

#[test]
fn megablock_is_anchored_after_expiry() {
    let node = node();
    let spine_tip = node.spine().last_block().unwrap();
    let timeout = node.spine().params().snapshot_generation_timeout;

    // Expires 1300s after the spine tip, which takes 5 spine blocks.
    let snapshot_timestamp = spine_tip.timestamp + 1_300 - timeout;
    let megablock = node
        .megablocks()
        .create_megablock([1; 32], 10, snapshot_timestamp, vec![[2; 32], [3; 32]])
        .unwrap();

    assert!(megablock.id > 0);
    assert_eq!(megablock.main_block_height, 10);
    assert_eq!(megablock.expiration_timestamp, snapshot_timestamp + timeout);
    assert_eq!(megablock.spine_block_height, spine_tip.height + 5);

    let stored = node.megablocks().megablock_by_spine_height(5).unwrap();
    assert_eq!(stored, Some(megablock));
}

#[test]
fn expired_snapshot_anchors_on_next_spine_block() {
    let node = node();
    test_utils::extend_chain(node.spine(), 2);
    let spine_tip = node.spine().last_block().unwrap();
    let timeout = node.spine().params().snapshot_generation_timeout;

    let megablock = node
        .megablocks()
        .create_megablock([9; 32], 3, spine_tip.timestamp - 2 * timeout, vec![])
        .unwrap();
    assert_eq!(megablock.spine_block_height, spine_tip.height + 1);
    assert!(megablock.chunk_hashes.is_empty());
}

#[test]
fn latest_anchored_megablock_by_spine_height() {
    let node = node();
    let spine_tip = node.spine().last_block().unwrap();
    let period = node.spine().params().smithing_period;
    let timeout = node.spine().params().snapshot_generation_timeout;

    let at = |spine_height: i64| spine_tip.timestamp + spine_height * period - timeout;
    let first = node
        .megablocks()
        .create_megablock([1; 32], 4, at(2), vec![])
        .unwrap();
    let second = node
        .megablocks()
        .create_megablock([2; 32], 8, at(6), vec![])
        .unwrap();
    assert_eq!(first.spine_block_height, 2);
    assert_eq!(second.spine_block_height, 6);

    let latest = |h| node.megablocks().latest_anchored_megablock(h).unwrap();
    assert_eq!(latest(1), None);
    assert_eq!(latest(2), Some(first.clone()));
    assert_eq!(latest(5), Some(first));
    assert_eq!(latest(6), Some(second.clone()));
    assert_eq!(latest(100), Some(second));
    assert_eq!(node.megablocks().megablock_by_spine_height(3).unwrap(), None);
}

#[test]
fn spine_rollback_drops_megablocks_above() {
    let node = node();
    let spine = test_utils::extend_chain(node.spine(), 2);
    let megablock = node
        .megablocks()
        .create_megablock([4; 32], 1, spine[1].timestamp - 10_000, vec![[5; 32]])
        .unwrap();
    assert_eq!(megablock.spine_block_height, 3);
    test_utils::extend_chain(node.spine(), 2);

    let popped = node.spine().pop_off_to_block(&spine[0]).unwrap();
    assert_eq!(popped.len(), 3);
    assert_eq!(node.megablocks().megablock_by_spine_height(3).unwrap(), None);
    assert_eq!(node.megablocks().latest_anchored_megablock(100).unwrap(), None);
}
