use anyhow::Context;
use chain::{Node, Smither};
use chain_types::{crypto, Genesis, MainPayload, SpinePayload};
use clap::{Parser, ValueEnum};
use secp256k1::SecretKey;
use std::{
    net::{SocketAddr, SocketAddrV4},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::watch;


/// Runs the main and spine chains of a node and serves them over HTTP.
#[derive(Parser, Clone)]
#[command(version, about)]
pub struct Args {
    /// The address to bind to for the TCP listener that will be used to serve the API.
    #[arg(long, default_value_t = SocketAddrV4::new([0; 4].into(), 0).into())]
    bind_address: SocketAddr,
    /// The type of DB storage to use.
    ///
    /// In the case that "persistent" is specified, assumes the default path.
    #[arg(long, default_value_t = Db::Memory, value_enum)]
    db: Db,
    /// The path to the node's sqlite database.
    ///
    /// Specifying this overrides the `db` type as `persistent`.
    ///
    /// By default, this path will be within the user's data directory.
    #[arg(long)]
    db_path: Option<PathBuf>,
    /// The number of simultaneous sqlite DB connections to maintain.
    ///
    /// By default, this is the number of available CPUs multiplied by 4.
    #[arg(long, default_value_t = chain::db::pool::Config::default_conn_limit())]
    db_conn_limit: usize,
    /// Disable the tracing subscriber.
    #[arg(long)]
    disable_tracing: bool,
    /// The maximum number of TCP streams to be served simultaneously.
    #[arg(long, default_value_t = chain_api::DEFAULT_CONNECTION_LIMIT)]
    tcp_conn_limit: usize,
    /// Specify a path to a `genesis.yml` configuration.
    ///
    /// This specifies both genesis blocks, the nodes registered at genesis
    /// and the protocol constants of each chain.
    ///
    /// If no configuration is specified, defaults to `Genesis::default()`.
    #[arg(long)]
    genesis: Option<PathBuf>,
    /// The node's hex encoded secp256k1 secret key.
    #[arg(long, conflicts_with = "node_secret_seed")]
    node_secret: Option<SecretKey>,
    /// Derive the node's secret key from a seed phrase. Meant for test networks.
    #[arg(long)]
    node_secret_seed: Option<String>,
    /// Smith blocks on both chains whenever this node's turn comes.
    ///
    /// Requires a node secret.
    #[arg(long)]
    smith: bool,
    /// How often to check whether it is this node's turn to smith, in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    smith_interval_ms: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Db {
    /// Temporary, in-memory storage that lasts for the duration of the process.
    Memory,
    /// Persistent storage on the local HDD or SSD.
    ///
    /// The DB path may be specified with `--db-path`.
    Persistent,
}

fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|mut path| {
        path.extend(["chain", "node", "db.sqlite"]);
        path
    })
}

/// Construct the node's DB config from the parsed args.
fn db_conf_from_args(args: &Args) -> anyhow::Result<chain::db::pool::Config> {
    let source = match (&args.db, &args.db_path) {
        (Db::Memory, None) => chain::db::pool::Source::default_memory(),
        (_, Some(path)) => chain::db::pool::Source::Path(path.clone()),
        (Db::Persistent, None) => {
            let Some(path) = default_db_path() else {
                anyhow::bail!("unable to detect user's data directory for default DB path")
            };
            chain::db::pool::Source::Path(path)
        }
    };
    Ok(chain::db::pool::Config::new(source, args.db_conn_limit))
}

fn node_secret_from_args(args: &Args) -> anyhow::Result<Option<SecretKey>> {
    match (&args.node_secret, &args.node_secret_seed) {
        (Some(secret), _) => Ok(Some(*secret)),
        (None, Some(seed)) => {
            let secret = crypto::secret_key_from_seed(seed)
                .context("seed does not derive a valid secret key")?;
            Ok(Some(secret))
        }
        (None, None) => Ok(None),
    }
}

/// Construct the node's config from the parsed args.
fn conf_from_args(args: &Args) -> anyhow::Result<chain::Config> {
    Ok(chain::Config {
        db: db_conf_from_args(args)?,
        genesis: load_genesis_or_default(args.genesis.as_deref())?,
        node_secret: node_secret_from_args(args)?,
    })
}

#[cfg(feature = "tracing")]
fn init_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init();
}

/// Load the genesis configuration from the yml file at the given path, or
/// produce the default if no path is given.
fn load_genesis_or_default(path: Option<&Path>) -> anyhow::Result<Genesis> {
    match path {
        None => Ok(Genesis::default()),
        Some(path) => {
            let genesis_str = std::fs::read_to_string(path)
                .context("failed to read genesis configuration from path")?;
            serde_yaml::from_str(&genesis_str)
                .context("failed to deserialize genesis configuration from YAML string")
        }
    }
}

/// Try to smith on both chains every `period` until `close` fires or a
/// smithing task panics.
///
/// A smithing attempt in progress always runs to completion.
async fn smith_loop(
    main: Smither<MainPayload>,
    spine: Smither<SpinePayload>,
    period: Duration,
    mut close: watch::Receiver<()>,
) -> anyhow::Result<()> {
    let main = Arc::new(main);
    let spine = Arc::new(spine);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = interval.tick() => (),
            _ = close.changed() => return Ok(()),
        }
        let (main, spine) = (main.clone(), spine.clone());
        tokio::task::spawn_blocking(move || {
            let now = chain::unix_now();
            if let Err(_err) = main.try_smith(now) {
                #[cfg(feature = "tracing")]
                tracing::warn!("failed to smith main block: {_err}");
            }
            if let Err(_err) = spine.try_smith(now) {
                #[cfg(feature = "tracing")]
                tracing::warn!("failed to smith spine block: {_err}");
            }
        })
        .await
        .context("smithing task failed")?;
    }
}

/// Flatten the result of the smithing task's join handle.
fn flatten_smithing(res: Result<anyhow::Result<()>, tokio::task::JoinError>) -> anyhow::Result<()> {
    res.context("smithing task panicked")?
}

/// Run the chain node.
pub async fn run(args: Args) -> anyhow::Result<()> {
    // Initialise tracing.
    if !args.disable_tracing {
        #[cfg(feature = "tracing")]
        init_tracing_subscriber()
    }

    let conf = conf_from_args(&args)?;
    #[cfg(feature = "tracing")]
    {
        tracing::debug!("Node DB config:\n{:#?}", conf.db);
        tracing::info!("Starting node");
    }
    let node = Node::new(&conf).context("failed to start node")?;

    let smithers = if args.smith {
        let (Some(main), Some(spine)) = (node.main_smither(), node.spine_smither()) else {
            anyhow::bail!("smithing requires `--node-secret` or `--node-secret-seed`");
        };
        #[cfg(feature = "tracing")]
        tracing::info!("Smithing every {}ms", args.smith_interval_ms);
        Some((main, spine))
    } else {
        None
    };
    let (close_smithing, mut close_rx) = watch::channel(());
    let period = Duration::from_millis(args.smith_interval_ms);
    let mut smithing = tokio::spawn(async move {
        match smithers {
            Some((main, spine)) => smith_loop(main, spine, period, close_rx).await,
            None => {
                let _ = close_rx.changed().await;
                Ok(())
            }
        }
    });

    // Run the API.
    let router = chain_api::router(chain_api::State::from_node(&node));
    let listener = tokio::net::TcpListener::bind(args.bind_address).await?;
    #[cfg(feature = "tracing")]
    tracing::info!("Starting API server at {}", listener.local_addr()?);
    let api = chain_api::serve(&router, &listener, args.tcp_conn_limit);

    // Select the first future to complete to close.
    let ctrl_c = tokio::signal::ctrl_c();
    let (res, smithing_done) = tokio::select! {
        _ = api => (Ok(()), false),
        _ = ctrl_c => (Ok(()), false),
        r = &mut smithing => (flatten_smithing(r), true),
    };

    // Let an in-flight smithing attempt finish before closing the DB.
    if !smithing_done {
        let _ = close_smithing.send(());
        if let Err(_err) = flatten_smithing(smithing.await) {
            #[cfg(feature = "tracing")]
            tracing::warn!("smithing stopped with an error: {_err}");
        }
    }

    drop(router);
    node.close().map_err(|e| anyhow::anyhow!("{e}"))?;
    res
}
