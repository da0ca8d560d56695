//! RPS Arena Server
//!
//! Runs the tournament behind a WebSocket listener until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rps_arena::{network::ArenaServer, ArenaConfig, VERSION};

#[cfg(feature = "debug-tracing")]
const DEFAULT_FILTER: &str = "debug";
#[cfg(not(feature = "debug-tracing"))]
const DEFAULT_FILTER: &str = "info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("RPS Arena Server v{}", VERSION);

    let config = ArenaConfig::from_env().context("invalid configuration")?;
    info!(
        "Min players: {}, tally: {:?}, variants: {}",
        config.min_players,
        config.tally_policy,
        config.variants.len()
    );

    let server = Arc::new(ArenaServer::from_config(&config));

    let runner = server.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutting down");
    server.shutdown();

    handle.await.context("server task panicked")??;
    Ok(())
}
