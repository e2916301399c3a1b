#![allow(dead_code)]

use chain::{test_utils, Node};
use std::future::Future;

const LOCALHOST: &str = "127.0.0.1";

#[cfg(feature = "tracing")]
pub fn init_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init();
}

pub fn test_node() -> Node {
    Node::new(&test_utils::test_node_conf()).unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .http2_prior_knowledge() // Enforce HTTP/2
        .build()
        .unwrap()
}

async fn test_listener() -> tokio::net::TcpListener {
    tokio::net::TcpListener::bind(format!("{LOCALHOST}:0"))
        .await
        .unwrap()
}

/// Waits until the server at the given port is ready to receive requests.
async fn await_server_online(port: u16, timeout_duration: std::time::Duration) {
    let server_ready = async {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(100));
        let client = client();
        let url = format!("http://{LOCALHOST}:{port}/");
        loop {
            interval.tick().await;
            if client.get(&url).send().await.is_ok() {
                return;
            }
        }
    };
    tokio::time::timeout(timeout_duration, server_ready)
        .await
        .unwrap()
}

/// Spawns a test server, then calls the given asynchronous function. Upon
/// completion, closes the server, panicking if any errors occurred.
pub async fn with_test_server<Fut>(
    state: chain_api::State,
    f: impl FnOnce(u16) -> Fut,
) -> Fut::Output
where
    Fut: Future,
{
    let router = chain_api::router(state);
    let listener = test_listener().await;
    let port = listener.local_addr().unwrap().port();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let api_jh = tokio::spawn(async move {
        tokio::select! {
            _ = chain_api::serve(&router, &listener, chain_api::DEFAULT_CONNECTION_LIMIT) => {},
            _ = shutdown_rx => {},
        }
    });
    await_server_online(port, std::time::Duration::from_secs(3)).await;
    let output = f(port).await;
    shutdown_tx.send(()).unwrap();
    api_jh.await.unwrap();
    output
}

pub fn get_url(port: u16, endpoint_path: &str) -> String {
    format!("http://{LOCALHOST}:{port}{endpoint_path}")
}

/// Shorthand for a get request to the test server at `port`.
pub async fn reqwest_get(port: u16, endpoint_path: &str) -> reqwest::Response {
    client()
        .get(get_url(port, endpoint_path))
        .send()
        .await
        .unwrap()
}

/// State without an event source, for non-subscription tests.
pub fn state_without_events(node: &Node) -> chain_api::State {
    chain_api::State {
        events: None,
        ..chain_api::State::from_node(node)
    }
}
