//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod algorithm;
mod pipeline;
mod role;

pub use algorithm::AlgorithmCommands;
pub use pipeline::PipelineCommands;
pub use role::RoleCommands;

use anyhow::Result;
use clap::Subcommand;
use yunpipe_engine::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Provision and tear down pipelines
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Inspect published algorithm descriptors
    Algorithm {
        #[command(subcommand)]
        command: AlgorithmCommands,
    },
    /// Manage the trigger function execution role
    Role {
        #[command(subcommand)]
        command: RoleCommands,
    },
}

/// Routes the command to its handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Algorithm { command } => {
            algorithm::handle_algorithm_command(command, config).await
        }
        Commands::Role { command } => role::handle_role_command(command, config).await,
    }
}
