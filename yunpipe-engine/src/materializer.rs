//! Stage materialization
//!
//! Turns one [`StageRequest`] into live resources, in dependency order:
//!
//! 1. resolve the algorithm descriptor
//! 2. create or reuse the work queue
//! 3. build the runnable unit's environment
//! 4. register the task definition
//! 5. render and deploy the trigger function
//! 6. create or reuse the input and output buckets
//! 7. route the input bucket's uploads to the function
//!
//! A failing step aborts the stage. Nothing is rolled back; the resources
//! created so far travel with the error so the caller can record them.

use thiserror::Error;
use tracing::{debug, info, warn};
use yunpipe_core::domain::resource::{FunctionPackage, TriggerTarget};
use yunpipe_core::domain::stage::{StageRequest, StageResources};
use yunpipe_core::domain::system::{ExecutionCredentials, SystemInfo};
use yunpipe_core::domain::task::TaskDefinition;
use yunpipe_core::{ProvisionError, Result};

use crate::context::ProvisionContext;
use crate::environment::build_environment;
use crate::template::{TriggerParams, render_trigger};

/// File name of the generated trigger source inside its package
pub const FUNCTION_FILE_NAME: &str = "lambda_function.py";
/// Entry point of the generated trigger source
pub const FUNCTION_HANDLER: &str = "lambda_function.lambda_handler";

/// A stage that stopped part way, with what it had created
#[derive(Debug, Error)]
#[error("stage '{stage}' failed after {} resource(s)", .created.len())]
pub struct StageFailure {
    pub stage: String,
    #[source]
    pub error: ProvisionError,
    /// Resources created or reused before the failure
    pub created: StageResources,
}

/// Materializes stages against the context's provider
pub struct StageMaterializer<'a> {
    ctx: &'a ProvisionContext,
}

impl<'a> StageMaterializer<'a> {
    pub fn new(ctx: &'a ProvisionContext) -> Self {
        Self { ctx }
    }

    /// Creates every resource of one stage
    pub async fn materialize(
        &self,
        request: &StageRequest,
        system: &SystemInfo,
        credentials: &ExecutionCredentials,
    ) -> std::result::Result<StageResources, StageFailure> {
        info!(
            "Materializing stage {} ({} -> {})",
            request.name, request.input_bucket, request.output_bucket
        );

        let mut created = StageResources::default();
        match self.run(request, system, credentials, &mut created).await {
            Ok(()) => {
                info!("Stage {} ready", request.name);
                Ok(created)
            }
            Err(error) => {
                warn!(
                    "Stage {} failed with {} resource(s) created: {}",
                    request.name,
                    created.len(),
                    error
                );
                Err(StageFailure {
                    stage: request.name.clone(),
                    error,
                    created,
                })
            }
        }
    }

    async fn run(
        &self,
        request: &StageRequest,
        system: &SystemInfo,
        credentials: &ExecutionCredentials,
        created: &mut StageResources,
    ) -> Result<()> {
        let provider = &self.ctx.provider;

        let descriptor = self.ctx.descriptors.resolve(&request.name).await?;
        debug!(
            "Resolved {} to image {}",
            request.name, descriptor.container_name
        );

        let queue = provider.get_or_create_queue(&request.queue_name).await?;
        created.queue = Some(queue.clone());

        let environment = build_environment(request, &queue, credentials, &descriptor)?;
        let definition = TaskDefinition::for_stage(&descriptor, &environment, &request.ports)?;
        let task = provider.register_task_definition(&definition).await?;
        created.task = Some(task.clone());

        let params = TriggerParams::new(&descriptor, &task, system, request, &queue);
        let package = self.package(render_trigger(&params)?);
        let function = provider.deploy_function(&package).await?;
        created.function = Some(function.clone());

        let input = provider.get_or_create_bucket(&request.input_bucket).await?;
        created.input_bucket = Some(input.clone());
        let output = provider.get_or_create_bucket(&request.output_bucket).await?;
        created.output_bucket = Some(output);

        provider
            .set_upload_trigger(&input, &TriggerTarget::Function(function.arn.clone()))
            .await?;
        debug!("Uploads to {} now invoke {}", input.name, function.name);

        Ok(())
    }

    fn package(&self, source: String) -> FunctionPackage {
        let config = &self.ctx.config;
        FunctionPackage {
            file_name: FUNCTION_FILE_NAME.to_string(),
            source,
            handler: FUNCTION_HANDLER.to_string(),
            runtime: config.function_runtime.clone(),
            timeout_secs: u32::try_from(config.function_timeout.as_secs()).unwrap_or(u32::MAX),
            memory_mb: config.function_memory_mb,
            role_name: config.execution_role.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, credentials, descriptor, system};
    use std::collections::BTreeMap;
    use yunpipe_provider::ResourceProvider;

    fn stage(name: &str, variables: &[(&str, &str)]) -> StageRequest {
        StageRequest {
            name: name.to_string(),
            input_bucket: "in-bucket".to_string(),
            output_bucket: "out-bucket".to_string(),
            queue_name: "gen-1".to_string(),
            ports: vec![],
            variables: variables
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            alarm_queue: "https://sqs.us-east-1.amazonaws.com/123456789012/shutdown_alarm_sqs"
                .to_string(),
        }
    }

    #[tokio::test]
    async fn test_materialize_creates_all_resources() {
        let (ctx, provider, _) = context(vec![descriptor("blur", &["radius"])]).await.unwrap();
        let resources = StageMaterializer::new(&ctx)
            .materialize(&stage("blur", &[("radius", "3")]), &system(), &credentials())
            .await
            .unwrap();

        assert_eq!(resources.len(), 5);
        let function = resources.function.as_ref().unwrap();
        assert_eq!(
            provider.upload_trigger("in-bucket").await.unwrap(),
            Some(TriggerTarget::Function(function.arn.clone()))
        );
        assert_eq!(provider.upload_trigger("out-bucket").await.unwrap(), None);

        let state = provider.snapshot().unwrap();
        let revision = state.task_revision(&resources.task.as_ref().unwrap().arn).unwrap();
        assert_eq!(revision.definition.environment_value("radius"), Some("3"));
        assert_eq!(revision.definition.environment_value("NAME"), Some("blur"));
        assert_eq!(
            revision.definition.environment_value("sqs"),
            Some(resources.queue.as_ref().unwrap().url.as_str())
        );

        let (_, record) = state.function(&function.arn).unwrap();
        assert_eq!(record.handler, FUNCTION_HANDLER);
        assert_eq!(record.timeout_secs, 300);
        assert!(record.source.contains(r#"TASK_FAMILY = "blur""#));
    }

    #[tokio::test]
    async fn test_unknown_algorithm_creates_nothing() {
        let (ctx, provider, _) = context(vec![]).await.unwrap();
        let failure = StageMaterializer::new(&ctx)
            .materialize(&stage("blur", &[]), &system(), &credentials())
            .await
            .unwrap_err();

        assert!(failure.error.is_not_found());
        assert!(failure.created.is_empty());
        assert!(provider.snapshot().unwrap().queues.is_empty());
    }

    #[tokio::test]
    async fn test_missing_variable_stops_before_task_definition() {
        let (ctx, provider, _) = context(vec![descriptor("blur", &["radius"])]).await.unwrap();
        let failure = StageMaterializer::new(&ctx)
            .materialize(&stage("blur", &[]), &system(), &credentials())
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            ProvisionError::MissingConfiguration { ref variable, .. } if variable == "radius"
        ));
        assert!(failure.created.queue.is_some());
        assert!(failure.created.task.is_none());
        assert!(provider.snapshot().unwrap().task_definitions.is_empty());
    }

    #[tokio::test]
    async fn test_missing_role_reports_partial_resources() {
        let (mut ctx, _, _) = context(vec![descriptor("blur", &[])]).await.unwrap();
        ctx.config.execution_role = "absent_role".to_string();

        let failure = StageMaterializer::new(&ctx)
            .materialize(&stage("blur", &[]), &system(), &credentials())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, ProvisionError::PermissionError(_)));
        assert!(failure.created.queue.is_some());
        assert!(failure.created.task.is_some());
        assert!(failure.created.function.is_none());
        assert_eq!(failure.created.len(), 2);
        assert!(failure.to_string().contains("after 2 resource(s)"));
    }
}
