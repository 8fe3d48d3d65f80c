//! Role command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use yunpipe_engine::{Config, bootstrap_execution_role};
use yunpipe_provider::LocalProvider;

/// Role subcommands
#[derive(Subcommand)]
pub enum RoleCommands {
    /// Create or update the execution role trigger functions run as
    Bootstrap {
        /// Account the role belongs to
        #[arg(long, env = "YUNPIPE_ACCOUNT_ID")]
        account_id: String,

        /// Region of the provider state
        #[arg(long, env = "AWS_DEFAULT_REGION")]
        region: String,
    },
}

/// Handle role commands
pub async fn handle_role_command(command: RoleCommands, config: &Config) -> Result<()> {
    match command {
        RoleCommands::Bootstrap { account_id, region } => {
            let provider = LocalProvider::open(&config.state_file, account_id, region)
                .with_context(|| {
                    format!("Failed to open provider state {}", config.state_file.display())
                })?;

            let role = bootstrap_execution_role(&provider, config)
                .await
                .context("Failed to bootstrap execution role")?;

            println!("{}", "✓ Execution role ready".green().bold());
            println!("  Name: {}", role.name.bold());
            println!("  ARN:  {}", role.arn.cyan());
            Ok(())
        }
    }
}
