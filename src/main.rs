//! GitHub edge proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌────────────────────────────────────────────────┐
//!                         │                  EDGE PROXY                    │
//!   Client Request        │  ┌─────────┐    ┌──────────┐                   │
//!   ──────────────────────┼─▶│  http   │───▶│ routing  │── ?q= ──▶ 301     │
//!                         │  │ server  │    │ router + │                   │
//!                         │  └─────────┘    │ matcher  │── other ─▶ assets ─┼──▶ Static origin
//!                         │                 └────┬─────┘                   │
//!                         │                      │ allow-listed            │
//!                         │                      ▼                         │
//!   Client Response       │  ┌─────────┐    ┌──────────┐                   │
//!   ◀─────────────────────┼──│  cache  │◀───│  proxy   │◀──────────────────┼─── GitHub
//!                         │  │  tee    │    │  engine  │  manual redirects │
//!                         │  └─────────┘    └──────────┘                   │
//!                         └────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use gh_edge_proxy::config::{load_config, watcher::ConfigWatcher, ProxyConfig};
use gh_edge_proxy::lifecycle::{signals, Shutdown};
use gh_edge_proxy::observability::{logging, metrics};
use gh_edge_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "gh-edge-proxy")]
#[command(about = "Edge proxy for GitHub raw files, releases, archives and gists", long_about = None)]
struct Cli {
    /// TOML configuration file; watched for changes.
    #[arg(short, long, env = "GH_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;

    tracing::info!("gh-edge-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        prefix = %config.server.prefix,
        asset_origin = %config.assets.origin,
        patterns = config.upstream.patterns.len(),
        whitelist = config.upstream.whitelist.len(),
        max_redirects = config.upstream.max_redirects,
        cache_enabled = config.cache.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    // Without a config file the sender is dropped and reloads never arrive.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let bind_address: SocketAddr = config.listener.bind_address.parse()?;
    let tls_enabled = config.listener.tls.is_some();
    let server = HttpServer::new(config)?;

    if tls_enabled {
        server
            .run_tls(bind_address, config_updates, shutdown.subscribe())
            .await?;
    } else {
        let listener = TcpListener::bind(bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Listening for connections");
        server
            .run(listener, config_updates, shutdown.subscribe())
            .await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
