//! Pipeline command handlers
//!
//! `up` compiles pipeline request documents into live resources; `down`
//! tears them down again from the cleanup manifest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use tracing::info;
use yunpipe_core::domain::pipeline::PipelineRequest;
use yunpipe_core::domain::system::SystemInfo;
use yunpipe_core::names::HaikuNames;
use yunpipe_engine::{
    CompiledPipeline, Config, CredentialResolver, EnvCredentialResolver, FsDescriptorStore,
    FsManifestStore, ManifestStore, PipelineCompiler, ProvisionContext, TeardownOptions,
    TeardownReport, teardown,
};
use yunpipe_provider::{LocalProvider, parse_queue_url};

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Provision the pipelines described by request documents
    Up {
        /// Pipeline request JSON files
        #[arg(short, long = "file", required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },
    /// Delete every resource recorded in a cleanup manifest
    Down {
        /// Cleanup manifest written by `pipeline up`
        #[arg(short, long)]
        manifest: PathBuf,

        /// Keep the input, output and intermediate buckets
        #[arg(long)]
        retain_buckets: bool,

        /// Keep the alarm queue shared with other pipelines
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        retain_alarm_queue: bool,
    },
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    match command {
        PipelineCommands::Up { files } => {
            let credentials = EnvCredentialResolver::new();
            for file in files {
                pipeline_up(config, &file, &credentials).await?;
            }
            Ok(())
        }
        PipelineCommands::Down {
            manifest,
            retain_buckets,
            retain_alarm_queue,
        } => {
            let options = TeardownOptions {
                retain_buckets,
                retain_alarm_queue,
            };
            pipeline_down(config, &manifest, &options).await
        }
    }
}

/// Reads and parses one pipeline request document
fn read_request(path: &Path) -> Result<PipelineRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline request: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse pipeline request: {}", path.display()))
}

fn context(config: &Config, account_id: &str, region: &str) -> Result<ProvisionContext> {
    let provider = LocalProvider::open(&config.state_file, account_id, region)
        .with_context(|| format!("Failed to open provider state {}", config.state_file.display()))?;

    Ok(ProvisionContext::new(
        Arc::new(provider),
        Arc::new(FsDescriptorStore::new(&config.algorithm_dir)),
        Arc::new(FsManifestStore::new(&config.manifest_dir)),
        Arc::new(HaikuNames::new()),
        config.clone(),
    ))
}

async fn pipeline_up(
    config: &Config,
    file: &Path,
    resolver: &dyn CredentialResolver,
) -> Result<()> {
    let request = read_request(file)?;
    let credentials = resolver
        .resolve_credentials()
        .await
        .context("Failed to resolve execution credentials")?;

    let ctx = context(config, &request.account_id, &request.region)?;
    let system = SystemInfo::new(&config.placement, &request);

    match PipelineCompiler::new(&ctx)
        .compile(&request, &system, &credentials)
        .await
    {
        Ok(compiled) => {
            print_compiled(&compiled);
            Ok(())
        }
        Err(failure) => {
            println!("{}", "✗ Pipeline provisioning failed".red().bold());
            if let Some(stage) = &failure.stage {
                println!("  Failed stage: {}", stage.bold());
            }
            match &failure.manifest_location {
                Some(location) => println!(
                    "  {} resource(s) recorded in {}",
                    failure.manifest.len(),
                    location.cyan()
                ),
                None if failure.manifest.is_empty() => {}
                None => println!(
                    "  {}",
                    "The cleanup manifest could not be written; resources may be orphaned"
                        .yellow()
                ),
            }
            let stage = failure.stage.clone();
            Err(failure.error).with_context(|| match stage {
                Some(stage) => format!("Failed to provision {} at stage {}", file.display(), stage),
                None => format!("Failed to provision {}", file.display()),
            })
        }
    }
}

fn print_compiled(compiled: &CompiledPipeline) {
    println!("{}", "✓ Pipeline provisioned successfully!".green().bold());
    println!("  Run:      {}", compiled.run_name.cyan());
    println!("  Shape:    {}", compiled.shape.to_string().dimmed());
    println!("  Storage:  {}", compiled.storage_chain.join(" → ").dimmed());
    println!(
        "  Manifest: {} ({} entries)",
        compiled.manifest_location.cyan(),
        compiled.manifest.len()
    );
    println!();
    println!("  Upload files to   {}", compiled.input_bucket().bold());
    println!("  Results appear in {}", compiled.output_bucket().bold());
}

async fn pipeline_down(config: &Config, manifest_path: &Path, options: &TeardownOptions) -> Result<()> {
    let location = manifest_path.display().to_string();
    let manifest = FsManifestStore::new(&config.manifest_dir)
        .load(&location)
        .await
        .with_context(|| format!("Failed to load cleanup manifest {}", location))?;

    // The run stopped before its alarm queue existed
    if manifest.is_empty() {
        info!("Cleanup manifest {} records no resources", location);
        println!("{}", "✓ Nothing to tear down".green().bold());
        return Ok(());
    }

    // The queues recorded in the manifest carry the account and region
    let (region, account_id, _) = manifest
        .alarm_queue
        .iter()
        .chain(&manifest.queues)
        .find_map(|url| parse_queue_url(url))
        .context("Cleanup manifest records no queue to derive the account from")?;

    let provider = LocalProvider::open(&config.state_file, account_id, region)
        .with_context(|| format!("Failed to open provider state {}", config.state_file.display()))?;

    info!(
        "Tearing down {} resource(s) in account {} ({})",
        manifest.len(),
        provider.account_id(),
        provider.region()
    );
    let report = teardown(&provider, &manifest, options).await;
    print_report(&report);

    if report.is_clean() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} resource(s) could not be deleted; rerun `yunpipe pipeline down` to retry",
            report.failed.len()
        )
    }
}

fn print_report(report: &TeardownReport) {
    if report.is_clean() {
        println!("{}", "✓ Pipeline torn down".green().bold());
    } else {
        println!("{}", "✗ Pipeline partially torn down".yellow().bold());
    }
    for entry in &report.deleted {
        println!("  {} {}", "deleted".green(), entry);
    }
    for entry in &report.already_gone {
        println!("  {} {}", "gone".dimmed(), entry);
    }
    for entry in &report.retained {
        println!("  {} {}", "kept".cyan(), entry);
    }
    for failure in &report.failed {
        println!("  {} {}: {}", "failed".red(), failure.entry, failure.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yunpipe_core::domain::manifest::CleanupManifest;
    use yunpipe_core::domain::system::ExecutionCredentials;
    use yunpipe_engine::{StaticCredentials, bootstrap_execution_role};

    fn demo(path: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos").join(path)
    }

    fn demo_config(home: &Path) -> Config {
        let mut config = Config::with_home(home);
        config.algorithm_dir = demo("algorithms");
        config
    }

    fn credentials() -> StaticCredentials {
        StaticCredentials(ExecutionCredentials {
            region: "us-east-1".to_string(),
            output_format: "json".to_string(),
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
        })
    }

    fn manifests(config: &Config) -> Vec<PathBuf> {
        std::fs::read_dir(&config.manifest_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn test_up_then_down_with_static_credentials() {
        let home = tempfile::tempdir().unwrap();
        let config = demo_config(home.path());
        let provider = LocalProvider::open(&config.state_file, "123456789012", "us-east-1").unwrap();
        bootstrap_execution_role(&provider, &config).await.unwrap();

        pipeline_up(&config, &demo("single_run.json"), &credentials())
            .await
            .unwrap();

        let written = manifests(&config);
        assert_eq!(written.len(), 1);
        let state = LocalProvider::open(&config.state_file, "123456789012", "us-east-1")
            .unwrap()
            .snapshot()
            .unwrap();
        assert_eq!(state.buckets.len(), 2);
        assert_eq!(state.functions.len(), 1);

        pipeline_down(&config, &written[0], &TeardownOptions::default())
            .await
            .unwrap();
        let state = LocalProvider::open(&config.state_file, "123456789012", "us-east-1")
            .unwrap()
            .snapshot()
            .unwrap();
        assert!(state.buckets.is_empty());
        assert!(state.functions.is_empty());
    }

    #[tokio::test]
    async fn test_up_without_role_reports_manifest() {
        let home = tempfile::tempdir().unwrap();
        let config = demo_config(home.path());

        let err = pipeline_up(&config, &demo("single_run.json"), &credentials())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("at stage blur"));
        // alarm and work queues were created before deploy failed
        assert_eq!(manifests(&config).len(), 1);
    }

    #[tokio::test]
    async fn test_down_with_empty_manifest_is_noop() {
        let home = tempfile::tempdir().unwrap();
        let config = Config::with_home(home.path());
        let path = home.path().join("clean_up-empty.json");
        std::fs::write(&path, serde_json::to_string(&CleanupManifest::new()).unwrap()).unwrap();

        pipeline_down(&config, &path, &TeardownOptions::default())
            .await
            .unwrap();
        assert!(!config.state_file.exists());
    }

    #[test]
    fn test_read_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(
            &path,
            r#"{
                "process": {"type": "sequence_run", "algorithms": [{"name": "a"}, {"name": "b"}]},
                "input_s3_name": "raw",
                "output_s3_name": "final",
                "key_pair": "my-key",
                "account_id": "123456789012",
                "region": "us-east-1"
            }"#,
        )
        .unwrap();

        let request = read_request(&path).unwrap();
        assert_eq!(request.process.algorithms.len(), 2);
        assert!(request.process.algorithms[0].variables.is_empty());
    }

    #[test]
    fn test_read_request_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();

        let err = read_request(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
