//! Cleanup manifest
//!
//! The append-only record of every resource created during one pipeline
//! compilation. It is the sole input of teardown, so anything created and
//! not recorded here would be orphaned.

use serde::{Deserialize, Serialize};

use super::resource::{BucketRef, QueueRef};
use super::stage::StageResources;

/// Resources created by one compilation, keyed by kind
///
/// Serialized as
/// `{"cloudwatch": url, "lambda": [...], "s3": [...], "sqs": [...], "task": [...]}`;
/// field order matches the sorted key order of the persisted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupManifest {
    /// Shared alarm queue URL
    #[serde(rename = "cloudwatch")]
    pub alarm_queue: Option<String>,
    /// Trigger function arns
    #[serde(rename = "lambda", default)]
    pub functions: Vec<String>,
    /// Bucket names, one entry per stage input and output
    #[serde(rename = "s3", default)]
    pub buckets: Vec<String>,
    /// Work queue URLs
    #[serde(rename = "sqs", default)]
    pub queues: Vec<String>,
    /// Task-definition arns
    #[serde(rename = "task", default)]
    pub task_definitions: Vec<String>,
}

impl CleanupManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_alarm_queue(&mut self, queue: &QueueRef) {
        self.alarm_queue = Some(queue.url.clone());
    }

    /// Appends every resource held by a (possibly partial) stage result
    pub fn record_stage(&mut self, resources: &StageResources) {
        if let Some(queue) = &resources.queue {
            self.queues.push(queue.url.clone());
        }
        if let Some(task) = &resources.task {
            self.task_definitions.push(task.arn.clone());
        }
        if let Some(function) = &resources.function {
            self.functions.push(function.arn.clone());
        }
        for bucket in [&resources.input_bucket, &resources.output_bucket]
            .into_iter()
            .flatten()
        {
            self.record_bucket(bucket);
        }
    }

    pub fn record_bucket(&mut self, bucket: &BucketRef) {
        self.buckets.push(bucket.name.clone());
    }

    /// Total number of entries, counting repeats
    pub fn len(&self) -> usize {
        self.alarm_queue.iter().count()
            + self.functions.len()
            + self.buckets.len()
            + self.queues.len()
            + self.task_definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{FunctionRef, TaskRef};

    fn queue(name: &str) -> QueueRef {
        QueueRef {
            name: name.to_string(),
            url: format!("https://sqs.us-east-1.amazonaws.com/1/{}", name),
            arn: format!("arn:aws:sqs:us-east-1:1:{}", name),
        }
    }

    #[test]
    fn test_record_partial_stage() {
        let mut manifest = CleanupManifest::new();
        manifest.record_stage(&StageResources {
            queue: Some(queue("q1")),
            ..Default::default()
        });
        assert_eq!(manifest.queues.len(), 1);
        assert!(manifest.functions.is_empty());
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_document_keys() {
        let mut manifest = CleanupManifest::new();
        manifest.record_alarm_queue(&queue("alarm"));
        manifest.record_stage(&StageResources {
            queue: Some(queue("q1")),
            task: Some(TaskRef {
                family: "blur".to_string(),
                revision: 1,
                arn: "arn:aws:ecs:us-east-1:1:task-definition/blur:1".to_string(),
            }),
            function: Some(FunctionRef {
                name: "f".to_string(),
                arn: "arn:aws:lambda:us-east-1:1:function:f".to_string(),
            }),
            input_bucket: Some(BucketRef::new("in")),
            output_bucket: Some(BucketRef::new("out")),
        });

        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.starts_with(r#"{"cloudwatch":"https://sqs"#));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["s3"], serde_json::json!(["in", "out"]));
        assert_eq!(value["task"][0], "arn:aws:ecs:us-east-1:1:task-definition/blur:1");

        let back: CleanupManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }
}
