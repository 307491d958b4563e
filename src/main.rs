//! chainwatch - chain health and smart contract monitor
//!
//! Polls an Ethereum node (and optionally a block explorer) and reports
//! decoded contract activity, policy alerts and chain metrics.

use chainwatch::cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
