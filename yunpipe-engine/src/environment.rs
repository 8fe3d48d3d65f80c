//! Runnable-unit environment assembly

use std::collections::BTreeMap;

use yunpipe_core::domain::descriptor::AlgorithmDescriptor;
use yunpipe_core::domain::resource::QueueRef;
use yunpipe_core::domain::stage::StageRequest;
use yunpipe_core::domain::system::ExecutionCredentials;
use yunpipe_core::{ProvisionError, Result};

/// Bucket the stage writes its results to
pub const VAR_OUTPUT_BUCKET: &str = "output_s3_name";
/// URL of the stage's work queue
pub const VAR_QUEUE: &str = "sqs";
/// Stage display name
pub const VAR_NAME: &str = "NAME";

/// Builds the final environment of a stage's runnable unit
///
/// Caller variables come first; the output bucket, queue URL, stage name and
/// execution credentials are layered on top and win on collision. Every
/// variable the descriptor marks as required must be present afterwards,
/// otherwise the stage fails with `MissingConfiguration`.
pub fn build_environment(
    request: &StageRequest,
    queue: &QueueRef,
    credentials: &ExecutionCredentials,
    descriptor: &AlgorithmDescriptor,
) -> Result<BTreeMap<String, String>> {
    let mut env = request.variables.clone();

    let injected = [
        (VAR_OUTPUT_BUCKET, request.output_bucket.as_str()),
        (VAR_QUEUE, queue.url.as_str()),
        (VAR_NAME, request.name.as_str()),
    ];
    for (name, value) in injected.into_iter().chain(credentials.as_environment()) {
        env.insert(name.to_string(), value.to_string());
    }

    if let Some(missing) = descriptor
        .required_variables()
        .find(|name| !env.contains_key(*name))
    {
        return Err(ProvisionError::MissingConfiguration {
            stage: request.name.clone(),
            variable: missing.to_string(),
        });
    }

    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yunpipe_core::domain::descriptor::{DeclaredVariable, MemoryRequirement};

    fn descriptor(required: &[&str]) -> AlgorithmDescriptor {
        AlgorithmDescriptor {
            container_name: "user/blur".to_string(),
            system: "ubuntu".to_string(),
            run_command: "python blur.py".to_string(),
            name: "blur".to_string(),
            instance_type: "t2.micro".to_string(),
            memory: MemoryRequirement {
                minimal: 128,
                suggested: None,
            },
            cpu: 1,
            environment: required
                .iter()
                .map(|n| DeclaredVariable {
                    name: n.to_string(),
                    required: true,
                })
                .chain(std::iter::once(DeclaredVariable {
                    name: "LOG_LVL".to_string(),
                    required: false,
                }))
                .collect(),
            ports: vec![],
        }
    }

    fn request(variables: &[(&str, &str)]) -> StageRequest {
        StageRequest {
            name: "blur".to_string(),
            input_bucket: "in-bucket".to_string(),
            output_bucket: "out-bucket".to_string(),
            queue_name: "misty-river-0001".to_string(),
            ports: vec![],
            variables: variables
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            alarm_queue: "https://sqs.us-east-1.amazonaws.com/1/shutdown_alarm_sqs".to_string(),
        }
    }

    fn queue() -> QueueRef {
        QueueRef {
            name: "misty-river-0001".to_string(),
            url: "https://sqs.us-east-1.amazonaws.com/1/misty-river-0001".to_string(),
            arn: "arn:aws:sqs:us-east-1:1:misty-river-0001".to_string(),
        }
    }

    fn credentials() -> ExecutionCredentials {
        ExecutionCredentials {
            region: "us-east-1".to_string(),
            output_format: "json".to_string(),
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
        }
    }

    #[test]
    fn test_injects_generated_values() {
        let env = build_environment(
            &request(&[("radius", "3")]),
            &queue(),
            &credentials(),
            &descriptor(&["radius"]),
        )
        .unwrap();

        assert_eq!(env["radius"], "3");
        assert_eq!(env[VAR_OUTPUT_BUCKET], "out-bucket");
        assert_eq!(env[VAR_QUEUE], queue().url);
        assert_eq!(env[VAR_NAME], "blur");
        assert_eq!(env["AWS_DEFAULT_REGION"], "us-east-1");
        assert_eq!(env["AWS_SECRET_ACCESS_KEY"], "secret");
        assert!(!env.contains_key("LOG_LVL"));
    }

    #[test]
    fn test_injected_values_override_caller() {
        let env = build_environment(
            &request(&[("output_s3_name", "elsewhere")]),
            &queue(),
            &credentials(),
            &descriptor(&[]),
        )
        .unwrap();
        assert_eq!(env[VAR_OUTPUT_BUCKET], "out-bucket");
    }

    #[test]
    fn test_required_variable_may_be_injected() {
        // A descriptor may require a value the engine supplies itself
        let env = build_environment(
            &request(&[]),
            &queue(),
            &credentials(),
            &descriptor(&["output_s3_name", "AWS_DEFAULT_REGION"]),
        );
        assert!(env.is_ok());
    }

    #[test]
    fn test_missing_required_variable() {
        let err = build_environment(
            &request(&[("radius", "3")]),
            &queue(),
            &credentials(),
            &descriptor(&["radius", "sigma"]),
        )
        .unwrap_err();

        match err {
            ProvisionError::MissingConfiguration { stage, variable } => {
                assert_eq!(stage, "blur");
                assert_eq!(variable, "sigma");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
