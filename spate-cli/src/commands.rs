//! CLI command implementations

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use spate_core::config::SpateConfig;
use spate_core::engine::simulation::SimulatedEngine;
use spate_core::tracing_setup::{CliLogLevel, init_tracing};
use tracing::info;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
        /// Directory for cached torrent descriptors
        #[arg(long, default_value = "torrents")]
        cache_dir: PathBuf,
        /// Seconds an idle torrent stays joined after its last request;
        /// negative disables auto-drop entirely
        #[arg(long, default_value = "60")]
        grace: i64,
        /// Streaming read-ahead window in bytes
        #[arg(long, default_value_t = 48 << 20)]
        read_ahead: u64,
        /// Console log level
        #[arg(long, default_value = "info")]
        log_level: CliLogLevel,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns an error when the selected command fails to start or run.
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            bind,
            cache_dir,
            grace,
            read_ahead,
            log_level,
        } => serve(bind, cache_dir, grace, read_ahead, log_level).await,
    }
}

async fn serve(
    bind: SocketAddr,
    cache_dir: PathBuf,
    grace: i64,
    read_ahead: u64,
    log_level: CliLogLevel,
) -> anyhow::Result<()> {
    init_tracing(log_level.as_tracing_level())
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let mut config = SpateConfig::default();
    config.http.listen_addr = bind;
    config.cache.torrents_dir = cache_dir;
    config.serve.read_ahead = read_ahead;
    config.serve.torrent_grace = u64::try_from(grace).ok().map(Duration::from_secs);

    // The swarm engine is pluggable behind spate_core::TorrentEngine; the
    // bundled simulated engine serves development setups.
    let engine = Arc::new(SimulatedEngine::new());
    info!("starting gateway with the in-process simulated engine");

    spate_web::run_server(config, engine)
        .await
        .map_err(|e| anyhow::anyhow!("gateway exited: {e}"))
}
