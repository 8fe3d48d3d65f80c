//! Trigger function source generation
//!
//! Rendering is a pure function of the template and a typed parameter
//! record, so a substitution can't be forgotten without the record failing
//! to construct.

use std::error::Error as _;

use serde::Serialize;
use tera::{Context, Tera};
use yunpipe_core::domain::descriptor::AlgorithmDescriptor;
use yunpipe_core::domain::resource::{QueueRef, TaskRef};
use yunpipe_core::domain::stage::StageRequest;
use yunpipe_core::domain::system::SystemInfo;
use yunpipe_core::{ProvisionError, Result};

/// Source of the trigger function deployed for every stage
pub const TRIGGER_TEMPLATE: &str = include_str!("../templates/trigger_function.py.tera");

/// Every value substituted into the trigger template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerParams {
    pub instance_type: String,
    /// Container memory in MB
    pub memory: u32,
    pub task_family: String,
    pub region: String,
    pub account_id: String,
    pub subnet_id: String,
    pub security_group: String,
    pub key_pair: String,
    pub image_id: String,
    pub instance_profile: String,
    pub queue_url: String,
    pub alarm_queue_url: String,
    pub stage: String,
    pub input_bucket: String,
    pub output_bucket: String,
}

impl TriggerParams {
    pub fn new(
        descriptor: &AlgorithmDescriptor,
        task: &TaskRef,
        system: &SystemInfo,
        request: &StageRequest,
        queue: &QueueRef,
    ) -> Self {
        Self {
            instance_type: descriptor.instance_type.clone(),
            memory: descriptor.memory_mb(),
            task_family: task.family.clone(),
            region: system.region.clone(),
            account_id: system.account_id.clone(),
            subnet_id: system.subnet_id.clone(),
            security_group: system.security_group.clone(),
            key_pair: system.key_pair.clone(),
            image_id: system.image_id.clone(),
            instance_profile: system.instance_profile.clone(),
            queue_url: queue.url.clone(),
            alarm_queue_url: request.alarm_queue.clone(),
            stage: request.name.clone(),
            input_bucket: request.input_bucket.clone(),
            output_bucket: request.output_bucket.clone(),
        }
    }
}

/// Renders `template` with `params`
pub fn render(template: &str, params: &TriggerParams) -> Result<String> {
    let context =
        Context::from_serialize(params).map_err(|e| ProvisionError::Template(e.to_string()))?;
    Tera::one_off(template, &context, false).map_err(|e| ProvisionError::Template(describe(&e)))
}

/// Renders the built-in trigger template
pub fn render_trigger(params: &TriggerParams) -> Result<String> {
    render(TRIGGER_TEMPLATE, params)
}

/// Tera hides the useful part of an error in its source chain
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
