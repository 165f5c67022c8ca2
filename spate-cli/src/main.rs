//! Spate CLI - Command-line interface
//!
//! Provides command-line access to the torrent gateway.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "spate")]
#[command(about = "An HTTP gateway to BitTorrent swarms")]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::handle_command(cli.command).await
}
