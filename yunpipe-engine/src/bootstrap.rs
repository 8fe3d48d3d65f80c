//! Execution role bootstrap
//!
//! Trigger functions run as a role that must exist before any pipeline is
//! compiled. Creating it is a one-time operator action; compilation only
//! ever looks it up.

use serde_json::{Value, json};
use tracing::info;
use yunpipe_core::Result;
use yunpipe_core::domain::resource::{RoleRef, RoleSpec};
use yunpipe_provider::ResourceProvider;

use crate::config::Config;

/// Name of the inline policy attached to the execution role
pub const EXECUTION_POLICY_NAME: &str = "LambdaExec";

fn trust_policy() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "",
                "Effect": "Allow",
                "Principal": {"Service": "lambda.amazonaws.com"},
                "Action": "sts:AssumeRole"
            }
        ]
    })
}

fn execution_policy() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": [
                    "logs:*",
                    "cloudwatch:*",
                    "lambda:InvokeFunction",
                    "sqs:SendMessage",
                    "ec2:Describe*",
                    "ec2:RunInstances",
                    "ec2:StartInstances",
                    "iam:PassRole",
                    "ecs:ListContainerInstances",
                    "ecs:DescribeContainerInstances",
                    "ecs:RunTask",
                    "ecs:StartTask"
                ],
                "Resource": "*"
            }
        ]
    })
}

/// The execution role trigger functions assume
pub fn execution_role_spec(name: &str) -> RoleSpec {
    RoleSpec {
        name: name.to_string(),
        trust_policy: trust_policy(),
        policy_name: EXECUTION_POLICY_NAME.to_string(),
        policy: execution_policy(),
    }
}

/// Creates the configured execution role or brings it up to date
pub async fn bootstrap_execution_role(
    provider: &dyn ResourceProvider,
    config: &Config,
) -> Result<RoleRef> {
    let role = provider
        .ensure_role(&execution_role_spec(&config.execution_role))
        .await?;
    info!("Execution role {} ready ({})", role.name, role.arn);
    Ok(role)
}
