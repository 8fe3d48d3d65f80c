//! Algorithm command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use yunpipe_core::domain::descriptor::AlgorithmDescriptor;
use yunpipe_engine::{Config, DescriptorStore, FsDescriptorStore};

/// Algorithm subcommands
#[derive(Subcommand)]
pub enum AlgorithmCommands {
    /// List published algorithms
    List,
    /// Show an algorithm's descriptor
    Show {
        /// Algorithm name
        name: String,

        /// Print the raw descriptor document
        #[arg(long)]
        json: bool,
    },
}

/// Handle algorithm commands
pub async fn handle_algorithm_command(command: AlgorithmCommands, config: &Config) -> Result<()> {
    let store = FsDescriptorStore::new(&config.algorithm_dir);

    match command {
        AlgorithmCommands::List => list_algorithms(&store, config).await,
        AlgorithmCommands::Show { name, json } => show_algorithm(&store, &name, json).await,
    }
}

async fn list_algorithms(store: &FsDescriptorStore, config: &Config) -> Result<()> {
    let names = store.list().await.context("Failed to list algorithms")?;

    if names.is_empty() {
        println!(
            "{}",
            format!("No algorithms published in {}", config.algorithm_dir.display()).yellow()
        );
        return Ok(());
    }

    println!("{}", format!("Algorithms ({})", names.len()).bold());
    for name in names {
        match store.resolve(&name).await {
            Ok(descriptor) => println!(
                "  {} {}",
                name.cyan(),
                descriptor.container_name.dimmed()
            ),
            Err(e) => println!("  {} {}", name.cyan(), e.to_string().red()),
        }
    }

    Ok(())
}

async fn show_algorithm(store: &FsDescriptorStore, name: &str, json: bool) -> Result<()> {
    let descriptor = store
        .resolve(name)
        .await
        .with_context(|| format!("Failed to resolve algorithm {}", name))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptor)?);
        return Ok(());
    }

    print_descriptor(&descriptor);
    Ok(())
}

fn print_descriptor(descriptor: &AlgorithmDescriptor) {
    println!("{}", descriptor.name.bold());
    println!("  Image:    {}", descriptor.container_name.cyan());
    println!("  Command:  {}", descriptor.run_command);
    println!(
        "  Sizing:   {} CPU, {} MB, {}",
        descriptor.cpu,
        descriptor.memory_mb(),
        descriptor.instance_type.dimmed()
    );

    if !descriptor.environment.is_empty() {
        println!("  Variables:");
        for variable in &descriptor.environment {
            let required = if variable.required { "*" } else { "" };
            println!("    - {}{}", variable.name.cyan(), required.red());
        }
    }

    if !descriptor.ports.is_empty() {
        let ports: Vec<String> = descriptor
            .ports
            .iter()
            .map(|p| format!("{}/{}", p.port, p.protocol))
            .collect();
        println!("  Ports:    {}", ports.join(", ").dimmed());
    }
}
