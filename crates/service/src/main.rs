//! huedeck daemon (huedeckd): drives Hue lights from a macropad's knobs.

mod adapters;
mod config;
mod daemon;

use anyhow::Result;
use config::Config;
use daemon::Daemon;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,huedeckd=debug,huedeck_engine=debug")),
        )
        .init();

    info!("starting huedeckd v{}", env!("CARGO_PKG_VERSION"));

    // An explicit config path may be given as the only argument.
    let config_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)?;

    let daemon = Daemon::new(config, config_path);
    if let Err(e) = daemon.run().await {
        error!("daemon failed: {e:#}");
        return Err(e);
    }

    info!("huedeckd stopped");
    Ok(())
}
