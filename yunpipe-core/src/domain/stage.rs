//! Stage request and result types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::pipeline::PortRequest;
use super::resource::{BucketRef, FunctionRef, QueueRef, TaskRef};

/// One pipeline stage instance, built at compile time and consumed once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRequest {
    /// Algorithm name, also the stage display name
    pub name: String,
    pub input_bucket: String,
    pub output_bucket: String,
    /// Generated, unique per stage
    pub queue_name: String,
    pub ports: Vec<PortRequest>,
    /// Caller-supplied variables; the engine adds generated values on top
    pub variables: BTreeMap<String, String>,
    /// URL of the shared alarm queue
    pub alarm_queue: String,
}

/// Resources created or reused while materializing one stage
///
/// Fields are filled in creation order; on failure the populated prefix is
/// what must still be recorded for cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResources {
    pub queue: Option<QueueRef>,
    pub task: Option<TaskRef>,
    pub function: Option<FunctionRef>,
    pub input_bucket: Option<BucketRef>,
    pub output_bucket: Option<BucketRef>,
}

impl StageResources {
    pub fn is_empty(&self) -> bool {
        self.queue.is_none()
            && self.task.is_none()
            && self.function.is_none()
            && self.input_bucket.is_none()
            && self.output_bucket.is_none()
    }

    /// Number of resource references held
    pub fn len(&self) -> usize {
        [
            self.queue.is_some(),
            self.task.is_some(),
            self.function.is_some(),
            self.input_bucket.is_some(),
            self.output_bucket.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}
