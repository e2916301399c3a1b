use chain_types::{
    event::{ChainEvent, EventSink, EventTx, NoopEvents},
    AnyBlock, Block, ChainType, Genesis, MainPayload,
};

fn main_genesis() -> AnyBlock {
    Genesis::default().block::<MainPayload>().into()
}

#[tokio::test]
async fn listeners_receive_events_in_order() {
    let tx = EventTx::new();
    let mut rx = tx.new_listener();
    assert_eq!(tx.receiver_count(), 1);

    let block = main_genesis();
    tx.block_pushed(block.clone());
    tx.blocks_popped_off(ChainType::Main, 0, vec![block.clone()]);

    assert_eq!(
        rx.recv().await.unwrap(),
        ChainEvent::BlockPushed {
            block: block.clone()
        }
    );
    match rx.recv().await.unwrap() {
        ChainEvent::BlocksPoppedOff {
            chain,
            common_height,
            popped,
        } => {
            assert_eq!(chain, ChainType::Main);
            assert_eq!(common_height, 0);
            assert_eq!(popped, vec![block]);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn sending_without_listeners_is_fine() {
    let tx = EventTx::new();
    tx.broadcast_block(main_genesis());
    NoopEvents.block_pushed(main_genesis());
}

#[test]
fn events_serialize_with_tag() {
    let block: Block<MainPayload> = Genesis::default().block();
    let event = ChainEvent::BlockPushed {
        block: block.into(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "block-pushed");
    assert_eq!(json["block"]["chain"], "main");
}
