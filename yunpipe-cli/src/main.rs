//! Yunpipe CLI
//!
//! Provisions and tears down algorithm pipelines.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "yunpipe")]
#[command(about = "Provision cloud pipelines of containerized algorithms", long_about = None)]
struct Cli {
    /// Root directory of descriptors, manifests and provider state
    #[arg(long, env = "YUNPIPE_HOME", global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yunpipe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.home)?;

    handle_command(cli.command, &config).await
}
