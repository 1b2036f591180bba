//! freshd: Freshcache daemon.
//!
//! Serves freshness checks over HTTP, reading project records from the
//! cache cluster advertised by the discovery endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use freshcache::server::config::Config;
use freshcache::server::{self, AppState};
use freshcache::{DiscoveryConfig, Freshcache, FreshnessError, RetryConfig};

/// Freshcache daemon: workspace freshness checks over HTTP.
#[derive(Parser)]
#[command(name = "freshd")]
#[command(version = freshcache::PKG_VERSION)]
#[command(about = "Freshcache freshness-check daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Override the bind address from the config file.
    #[arg(long, env = "FRESHCACHE_ADDRESS")]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;

    let evaluator = Freshcache::builder()
        .discovery(DiscoveryConfig::from(&config.discovery))
        .decoder(config.discovery.build_decoder()?)
        .retry(RetryConfig::from(&config.retry))
        .fetch_timeout(config.cache.fetch_timeout())
        .build()?;

    // Connect eagerly; a failure here is retried by the first request.
    if let Err(e) = evaluator.connections().initialize().await {
        warn!(error = %e, "initial cache connection failed");
    }

    // Parse address
    let address = args.address.unwrap_or(config.server.address.clone());
    let addr: SocketAddr = address
        .parse()
        .map_err(|e| FreshnessError::Configuration(format!("Invalid address: {e}")))?;

    info!(version = freshcache::version_string(), %addr, "freshd starting");

    let state = AppState::new(Arc::new(evaluator), config.server.session_cookie.as_str());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, server::router(state)).await?;

    Ok(())
}
