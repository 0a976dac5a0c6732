//! murmur-relay binary entry point.
//!
//! Usage:
//! ```bash
//! murmur-relay --config relay.toml
//! murmur-relay --bind 127.0.0.1:3000
//! RUST_LOG=debug murmur-relay
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use murmur_chat_relay::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sanitizing WebSocket broadcast relay for Murmur chat.
#[derive(Parser, Debug)]
#[command(name = "murmur-relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when it does not exist.
    #[arg(long, short, default_value = "relay.toml")]
    config: PathBuf,

    /// Override `server.bind_address`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        Config::from_file(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config.display()))?
    } else {
        tracing::info!("{} not found, using defaults", cli.config.display());
        Config::default()
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    let handle = murmur_chat_relay::server::start(config)
        .await
        .context("Failed to start relay")?;
    tracing::info!(
        "murmur-relay v{} ready on {}",
        env!("CARGO_PKG_VERSION"),
        handle.local_addr()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    handle.shutdown().await;

    Ok(())
}
