#![cfg(feature = "test-utils")]

use chain::test_utils;
use chain_api::endpoint;
use chain_types::{AnyBlock, MainPayload, Megablock, SpinePayload};
use futures::StreamExt;
use std::sync::Arc;
use util::{reqwest_get, state_without_events, test_node, with_test_server};

mod util;

fn main_block(block: chain_types::Block<MainPayload>) -> AnyBlock {
    AnyBlock::Main(Arc::new(block))
}

#[tokio::test]
async fn test_health_check() {
    #[cfg(feature = "tracing")]
    util::init_tracing_subscriber();

    let node = test_node();
    with_test_server(state_without_events(&node), |port| async move {
        let response = reqwest_get(port, endpoint::health_check::PATH).await;
        assert!(response.status().is_success());
    })
    .await;
}

#[tokio::test]
async fn test_last_block() {
    #[cfg(feature = "tracing")]
    util::init_tracing_subscriber();

    let node = test_node();
    let pushed = test_utils::extend_chain(node.main(), 2);
    let tip = with_test_server(state_without_events(&node), |port| async move {
        let response = reqwest_get(port, "/main/last-block").await;
        assert!(response.status().is_success());
        response.json::<AnyBlock>().await.unwrap()
    })
    .await;
    assert_eq!(tip, main_block(pushed[1].clone()));
}

#[tokio::test]
async fn test_genesis_block() {
    let node = test_node();
    let genesis = with_test_server(state_without_events(&node), |port| async move {
        let response = reqwest_get(port, "/spine/genesis").await;
        assert!(response.status().is_success());
        response.json::<AnyBlock>().await.unwrap()
    })
    .await;
    let AnyBlock::Spine(block) = genesis else {
        panic!("expected a spine block");
    };
    assert_eq!(block.id, 3067771018820380645);
    assert_eq!(block.height, 0);
}

#[tokio::test]
async fn test_block_lookups() {
    let node = test_node();
    let pushed = test_utils::extend_chain(node.main(), 3);
    let expected = main_block(pushed[1].clone());
    let id = pushed[1].id;
    let hash = hex::encode(pushed[1].block_hash);

    with_test_server(state_without_events(&node), |port| async move {
        for path in [
            "/main/block/2".to_string(),
            format!("/main/block-id/{id}"),
            format!("/main/block-hash/{hash}"),
        ] {
            let response = reqwest_get(port, &path).await;
            assert!(response.status().is_success(), "{path}");
            assert_eq!(response.json::<AnyBlock>().await.unwrap(), expected);
        }
    })
    .await;
}

#[tokio::test]
async fn test_lookup_errors() {
    let node = test_node();
    with_test_server(state_without_events(&node), |port| async move {
        let response = reqwest_get(port, "/main/block/99").await;
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        let response = reqwest_get(port, "/side/last-block").await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let response = reqwest_get(port, "/main/block-hash/not-hex").await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let response = reqwest_get(port, "/main/block-hash/abcd").await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    })
    .await;
}

#[tokio::test]
async fn test_list_blocks() {
    let node = test_node();
    let pushed = test_utils::extend_chain(node.spine(), 4);
    let blocks = with_test_server(state_without_events(&node), |port| async move {
        let response = reqwest_get(port, "/spine/blocks?from=2&limit=2").await;
        assert!(response.status().is_success());
        response.json::<Vec<AnyBlock>>().await.unwrap()
    })
    .await;
    let expected: Vec<_> = pushed[1..3]
        .iter()
        .cloned()
        .map(|b| <SpinePayload as chain_types::Payload>::into_any(Arc::new(b)))
        .collect();
    assert_eq!(blocks, expected);
}

#[tokio::test]
async fn test_megablock() {
    let node = test_node();
    let spine_tip = node.spine().last_block().unwrap();
    let created = node
        .megablocks()
        .create_megablock([7; 32], 1, spine_tip.timestamp, vec![[8; 32]])
        .unwrap();
    let height = created.spine_block_height;

    with_test_server(state_without_events(&node), |port| async move {
        let response = reqwest_get(port, &format!("/megablock/{height}")).await;
        assert!(response.status().is_success());
        let megablock = response.json::<Option<Megablock>>().await.unwrap();
        assert_eq!(megablock, Some(created));

        let response = reqwest_get(port, &format!("/megablock/{}", height + 1)).await;
        let megablock = response.json::<Option<Megablock>>().await.unwrap();
        assert_eq!(megablock, None);
    })
    .await;
}

#[tokio::test]
async fn test_subscribe_events_disabled() {
    let node = test_node();
    with_test_server(state_without_events(&node), |port| async move {
        let response = reqwest_get(port, endpoint::subscribe_events::PATH).await;
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    })
    .await;
}

#[tokio::test]
async fn test_subscribe_events() {
    #[cfg(feature = "tracing")]
    util::init_tracing_subscriber();

    let node = test_node();
    let main = node.main().clone();
    let state = chain_api::State::from_node(&node);
    let pushed = with_test_server(state, |port| async move {
        let response = reqwest_get(port, endpoint::subscribe_events::PATH).await;
        assert!(response.status().is_success());

        let pushed = tokio::task::spawn_blocking(move || test_utils::extend_chain(&main, 1))
            .await
            .unwrap();

        let mut body = String::new();
        let mut stream = response.bytes_stream();
        let read = async {
            while let Some(chunk) = stream.next().await {
                body.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
                if body.contains("\"event\":\"block-pushed\"") {
                    break;
                }
            }
        };
        tokio::time::timeout(std::time::Duration::from_secs(3), read)
            .await
            .unwrap();

        let data = body
            .lines()
            .find_map(|line| line.strip_prefix("data:"))
            .unwrap();
        let event: chain_types::event::ChainEvent = serde_json::from_str(data.trim()).unwrap();
        (event, pushed)
    })
    .await;

    let (event, pushed) = pushed;
    assert_eq!(
        event,
        chain_types::event::ChainEvent::BlockPushed {
            block: main_block(pushed[0].clone())
        }
    );
}
