//! hftpd - A Line-Framed File Access Server
//!
//! This is the main entry point for the server. It parses the command line,
//! sets up logging, binds the listener and runs until Ctrl+C.

use clap::Parser;
use hftpd::{Config, Server};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::parse();

    // Set up logging; RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let server = Server::bind(&config).await?;
    info!(
        "Serving {} on {}",
        config.datadir.display(),
        server.local_addr()?
    );
    info!(version = hftpd::VERSION, workers = config.workers, "Ready to accept connections");

    if !server.directory().exists().await {
        error!(
            root = %config.datadir.display(),
            "Served directory does not exist; clients will get INTERNAL SERVER ERROR"
        );
    }

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    server.run_until(shutdown).await;
    Ok(())
}
