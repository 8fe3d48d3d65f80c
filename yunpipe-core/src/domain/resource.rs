//! References to provisioned cloud resources
//!
//! These are returned by the resource provider and recorded in the cleanup
//! manifest. They carry enough identity to address the resource again
//! (queue URL, task-definition arn, function arn, bucket name).

use serde::{Deserialize, Serialize};

/// A work or alarm queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRef {
    pub name: String,
    pub url: String,
    pub arn: String,
}

/// A storage bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

impl BucketRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Source arn used when granting the storage service invoke rights
    pub fn arn(&self) -> String {
        format!("arn:aws:s3:::{}", self.name)
    }
}

/// A registered task-definition revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub family: String,
    pub revision: u32,
    pub arn: String,
}

/// A deployed trigger function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRef {
    pub name: String,
    pub arn: String,
}

/// An execution role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub name: String,
    pub arn: String,
}

/// What a bucket's object-created events are delivered to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "arn", rename_all = "lowercase")]
pub enum TriggerTarget {
    Function(String),
    Queue(String),
    Topic(String),
}

impl TriggerTarget {
    pub fn arn(&self) -> &str {
        match self {
            TriggerTarget::Function(arn) | TriggerTarget::Queue(arn) | TriggerTarget::Topic(arn) => {
                arn
            }
        }
    }

    /// Short service name of the target (`lambda`, `sqs`, `sns`)
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerTarget::Function(_) => "lambda",
            TriggerTarget::Queue(_) => "sqs",
            TriggerTarget::Topic(_) => "sns",
        }
    }
}

/// A single generated source file packaged as a trigger function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionPackage {
    /// File name inside the deployment package
    pub file_name: String,
    pub source: String,
    pub handler: String,
    pub runtime: String,
    pub timeout_secs: u32,
    pub memory_mb: u32,
    /// Execution role the function runs as; must already exist
    pub role_name: String,
}

/// An IAM role to create once, outside of pipeline compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    pub trust_policy: serde_json::Value,
    pub policy_name: String,
    pub policy: serde_json::Value,
}
