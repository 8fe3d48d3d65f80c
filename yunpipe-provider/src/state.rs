//! Emulated control-plane state
//!
//! Persisted as a single JSON document by [`crate::LocalProvider`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use yunpipe_core::domain::resource::TriggerTarget;
use yunpipe_core::domain::task::TaskDefinition;

/// Every resource the local provider knows about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudState {
    /// Queues keyed by URL
    #[serde(default)]
    pub queues: BTreeMap<String, QueueRecord>,
    /// Buckets keyed by name
    #[serde(default)]
    pub buckets: BTreeMap<String, BucketRecord>,
    /// Task-definition revisions keyed by family
    #[serde(default)]
    pub task_definitions: BTreeMap<String, Vec<TaskRevision>>,
    /// Functions keyed by name
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionRecord>,
    /// Roles keyed by name
    #[serde(default)]
    pub roles: BTreeMap<String, RoleRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub name: String,
    pub arn: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRecord {
    /// Account that owns the bucket
    pub owner: String,
    pub created_at: DateTime<Utc>,
    /// Current notification configuration; replaced wholesale on update
    pub notification: Option<NotificationConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfiguration {
    pub target: TriggerTarget,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRevision {
    pub revision: u32,
    pub arn: String,
    pub active: bool,
    pub definition: TaskDefinition,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub arn: String,
    pub runtime: String,
    pub handler: String,
    pub role_arn: String,
    pub timeout_secs: u32,
    pub memory_mb: u32,
    pub file_name: String,
    pub source: String,
    #[serde(default)]
    pub permissions: Vec<InvokePermission>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokePermission {
    pub statement_id: String,
    pub principal: String,
    pub source_arn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub arn: String,
    pub trust_policy: serde_json::Value,
    #[serde(default)]
    pub inline_policies: BTreeMap<String, serde_json::Value>,
}

impl CloudState {
    /// Finds the active revision with the given arn
    pub fn task_revision(&self, arn: &str) -> Option<&TaskRevision> {
        self.task_definitions
            .values()
            .flatten()
            .find(|rev| rev.arn == arn)
    }

    /// Finds a function by name or arn
    pub fn function(&self, name_or_arn: &str) -> Option<(&String, &FunctionRecord)> {
        self.functions
            .iter()
            .find(|(name, record)| name.as_str() == name_or_arn || record.arn == name_or_arn)
    }
}
