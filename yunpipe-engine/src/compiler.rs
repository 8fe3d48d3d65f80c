//! Pipeline compilation
//!
//! Expands a [`PipelineRequest`] into per-stage requests joined by a chain
//! of storage buckets, materializes them strictly in order, and persists
//! the cleanup manifest whatever the outcome.

use thiserror::Error;
use tracing::{error, info};
use yunpipe_core::ProvisionError;
use yunpipe_core::domain::manifest::CleanupManifest;
use yunpipe_core::domain::pipeline::{PipelineRequest, PipelineShape};
use yunpipe_core::domain::stage::StageRequest;
use yunpipe_core::domain::system::{ExecutionCredentials, SystemInfo};
use yunpipe_core::names::NameSource;

use crate::context::ProvisionContext;
use crate::materializer::StageMaterializer;

/// Outcome of a successful compilation
#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    /// Generated name identifying this compilation
    pub run_name: String,
    pub shape: PipelineShape,
    pub manifest: CleanupManifest,
    /// Bucket names from the global input to the global output
    pub storage_chain: Vec<String>,
    /// Where the manifest was persisted
    pub manifest_location: String,
}

impl CompiledPipeline {
    pub fn input_bucket(&self) -> &str {
        self.storage_chain.first().map(String::as_str).unwrap_or_default()
    }

    pub fn output_bucket(&self) -> &str {
        self.storage_chain.last().map(String::as_str).unwrap_or_default()
    }
}

/// A compilation that stopped early
///
/// `manifest` holds everything created before the failure. It has been
/// persisted at `manifest_location` unless the request was rejected before
/// any resource was touched, or persisting itself failed.
#[derive(Debug, Error)]
#[error("{}{error}", stage_prefix(.stage))]
pub struct CompileFailure {
    pub error: ProvisionError,
    /// Algorithm of the stage that failed, if the failure happened inside one
    pub stage: Option<String>,
    pub manifest: CleanupManifest,
    pub manifest_location: Option<String>,
}

impl CompileFailure {
    fn rejected(error: ProvisionError) -> Self {
        Self {
            error,
            stage: None,
            manifest: CleanupManifest::new(),
            manifest_location: None,
        }
    }
}

fn stage_prefix(stage: &Option<String>) -> String {
    stage
        .as_ref()
        .map(|name| format!("stage '{}': ", name))
        .unwrap_or_default()
}

/// Where provisioning stopped
struct Halt {
    stage: Option<String>,
    error: ProvisionError,
}

impl From<ProvisionError> for Halt {
    fn from(error: ProvisionError) -> Self {
        Self { stage: None, error }
    }
}

/// Storage locations of an `n`-stage chain
///
/// Stage `i` reads from entry `i` and writes to entry `i + 1`. The first and
/// last entries are the caller's buckets; the `n - 1` in between are
/// generated.
pub fn storage_chain(input: &str, output: &str, n: usize, names: &dyn NameSource) -> Vec<String> {
    let mut chain = Vec::with_capacity(n + 1);
    chain.push(input.to_string());
    chain.extend((1..n).map(|_| names.next_name()));
    chain.push(output.to_string());
    chain
}

/// Compiles pipeline requests into provisioned stages
pub struct PipelineCompiler<'a> {
    ctx: &'a ProvisionContext,
}

impl<'a> PipelineCompiler<'a> {
    pub fn new(ctx: &'a ProvisionContext) -> Self {
        Self { ctx }
    }

    /// Provisions every stage of `request`
    ///
    /// The request is validated before anything is created. Once the first
    /// resource exists, the manifest is persisted on every exit path and a
    /// stage failure is returned only after that write.
    pub async fn compile(
        &self,
        request: &PipelineRequest,
        system: &SystemInfo,
        credentials: &ExecutionCredentials,
    ) -> Result<CompiledPipeline, CompileFailure> {
        let shape = request.validate().map_err(CompileFailure::rejected)?;
        let run_name = self.ctx.names.next_name();
        let stages = request.process.algorithms.len();
        info!(
            "Compiling {} pipeline {} with {} stage(s)",
            shape, run_name, stages
        );

        let mut manifest = CleanupManifest::new();
        let mut storage = Vec::new();
        let outcome = self
            .provision(request, system, credentials, &mut manifest, &mut storage)
            .await;

        let saved = self.ctx.manifests.save(&run_name, &manifest).await;

        match (outcome, saved) {
            (Ok(()), Ok(location)) => {
                info!(
                    "Pipeline {} ready: upload to {}, results in {}",
                    run_name, request.input_s3_name, request.output_s3_name
                );
                Ok(CompiledPipeline {
                    run_name,
                    shape,
                    manifest,
                    storage_chain: storage,
                    manifest_location: location,
                })
            }
            (Ok(()), Err(save_error)) => {
                error!("Pipeline {} provisioned but its manifest was not saved", run_name);
                Err(CompileFailure {
                    error: save_error,
                    stage: None,
                    manifest,
                    manifest_location: None,
                })
            }
            (Err(Halt { stage, error }), Ok(location)) => {
                error!(
                    "Pipeline {} failed, partial manifest written to {}",
                    run_name, location
                );
                Err(CompileFailure {
                    error,
                    stage,
                    manifest,
                    manifest_location: Some(location),
                })
            }
            (Err(Halt { stage, error }), Err(save_error)) => {
                error!(
                    "Pipeline {} failed and its manifest could not be saved: {}",
                    run_name, save_error
                );
                Err(CompileFailure {
                    error,
                    stage,
                    manifest,
                    manifest_location: None,
                })
            }
        }
    }

    async fn provision(
        &self,
        request: &PipelineRequest,
        system: &SystemInfo,
        credentials: &ExecutionCredentials,
        manifest: &mut CleanupManifest,
        storage: &mut Vec<String>,
    ) -> Result<(), Halt> {
        let alarm = self
            .ctx
            .provider
            .get_or_create_queue(&self.ctx.config.alarm_queue)
            .await?;
        manifest.record_alarm_queue(&alarm);

        let algorithms = &request.process.algorithms;
        *storage = storage_chain(
            &request.input_s3_name,
            &request.output_s3_name,
            algorithms.len(),
            self.ctx.names.as_ref(),
        );

        let stages: Vec<StageRequest> = algorithms
            .iter()
            .zip(storage.windows(2))
            .map(|(algorithm, buckets)| StageRequest {
                name: algorithm.name.clone(),
                input_bucket: buckets[0].clone(),
                output_bucket: buckets[1].clone(),
                queue_name: self.ctx.names.next_name(),
                ports: algorithm.port.clone(),
                variables: algorithm.variables.clone(),
                alarm_queue: alarm.url.clone(),
            })
            .collect();

        let materializer = StageMaterializer::new(self.ctx);
        for (index, stage) in stages.iter().enumerate() {
            info!("Stage {}/{}: {}", index + 1, stages.len(), stage.name);
            match materializer.materialize(stage, system, credentials).await {
                Ok(resources) => manifest.record_stage(&resources),
                Err(failure) => {
                    manifest.record_stage(&failure.created);
                    return Err(Halt {
                        stage: Some(failure.stage),
                        error: failure.error,
                    });
                }
            }
        }

        Ok(())
    }
}
