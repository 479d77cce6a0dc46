//! # wiki-bus
//!
//! Starts the wiki system and, on request, the peer socket roles.
//!
//! ```bash
//! wiki-bus [CONFIG.toml] [--server] [--client]
//! ```
//!
//! Without a config path every setting takes its default. The process runs
//! until Ctrl-C.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Instrument};
use wiki_bus::config::WikiConfig;
use wiki_bus::lifecycle::{setup_tracing, WikiSystem};
use wiki_bus::socket::{PeerServer, ReconnectingClient};
use wiki_bus::store::MemoryStore;

#[derive(Debug, Parser)]
#[command(name = "wiki-bus")]
#[command(about = "Wiki over an in-process message bus, with peer socket roles")]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    config: Option<PathBuf>,

    /// Accept peer channels on the configured socket server address
    #[arg(long)]
    server: bool,

    /// Keep a reconnecting channel to the configured peer
    #[arg(long)]
    client: bool,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();
    setup_tracing();

    let config = match &args.config {
        Some(path) => WikiConfig::load(path).map_err(|e| e.to_string())?,
        None => WikiConfig::default(),
    };

    info!(?args, "Starting wiki");

    let store = MemoryStore::new(
        config.database.max_pool_size,
        config.database.acquire_timeout(),
    );
    let system = WikiSystem::start(&config, store)
        .instrument(tracing::info_span!("startup"))
        .await
        .map_err(|e| e.to_string())?;

    let server = if args.server {
        let server = PeerServer::bind(config.socket_server.clone())
            .await
            .map_err(|e| e.to_string())?;
        Some(server.spawn())
    } else {
        None
    };

    let client = args
        .client
        .then(|| ReconnectingClient::new(config.socket_client.clone()).spawn());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
    }
    info!("Ctrl-C received");

    if let Some(client) = client {
        client.shutdown().await;
    }
    if let Some(server) = server {
        server.shutdown().await;
    }
    system.shutdown().await
}
