//! Strata JSON-RPC Server
//!
//! Serves the catalog engine to a frontend over HTTP.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{Catalog, CatalogConfig, InMemoryStore};
use strata_rpc::AppState;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "strata-rpc")]
#[command(about = "JSON-RPC server for the StrataUI catalog")]
struct Args {
    /// Port to listen on (0 for random available port)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// JSON config file (defaults plus STRATA_* environment variables when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve toolkit rows from a JSON file instead of the remote store
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Drop sessions after this many seconds without a request
    #[arg(long, default_value_t = strata_rpc::SESSION_IDLE_TIMEOUT.as_secs())]
    session_idle_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Strata RPC server");

    let config = match &args.config {
        Some(path) => CatalogConfig::load(path)?,
        None => CatalogConfig::from_env(),
    };

    let catalog = match &args.fixture {
        Some(path) => {
            info!("Serving fixture rows from {}", path.display());
            let store = InMemoryStore::from_json_file(path)?;
            Catalog::new(Arc::new(store), config)
        }
        None => Catalog::connect(config)?,
    };

    let idle = Duration::from_secs(args.session_idle_secs);
    let state = Arc::new(AppState::with_session_idle(catalog, idle));
    let addr = strata_rpc::serve(state, &args.host, args.port).await?;

    // Print the port for the parent process to read
    println!("RPC_PORT={}", addr.port());

    info!("Server running on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
