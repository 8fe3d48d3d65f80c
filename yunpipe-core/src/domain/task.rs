//! Task definition model
//!
//! A task definition describes the runnable unit for one stage: the
//! algorithm's container, its command and its resolved environment.
//! Serialized with the provider's camelCase field names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::descriptor::{AlgorithmDescriptor, Protocol};
use super::pipeline::PortRequest;
use crate::error::{ProvisionError, Result};

/// CPU units per declared vCPU
const CPU_UNITS_PER_CORE: u32 = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub family: String,
    pub container_definitions: Vec<ContainerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub cpu: u32,
    pub memory: u32,
    pub essential: bool,
    pub environment: Vec<EnvironmentEntry>,
    pub port_mappings: Vec<PortMapping>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: Protocol,
}

impl TaskDefinition {
    /// Builds the task definition for one stage
    ///
    /// `environment` must already be the final, validated mapping. Port
    /// mappings are the descriptor's declared ports followed by any extra
    /// ports the stage requested, without duplicates. Fails with
    /// `InvalidRequest` when the declared CPU count has no unit equivalent.
    pub fn for_stage(
        descriptor: &AlgorithmDescriptor,
        environment: &BTreeMap<String, String>,
        ports: &[PortRequest],
    ) -> Result<Self> {
        let cpu = descriptor
            .cpu
            .max(1)
            .checked_mul(CPU_UNITS_PER_CORE)
            .ok_or_else(|| {
                ProvisionError::InvalidRequest(format!(
                    "descriptor {} declares {} CPUs",
                    descriptor.name, descriptor.cpu
                ))
            })?;

        let mut port_mappings: Vec<PortMapping> = Vec::new();
        let declared = descriptor.ports.iter().map(|p| (p.port, p.protocol));
        let requested = ports.iter().map(|p| (p.port(), p.protocol()));
        for (port, protocol) in declared.chain(requested) {
            let mapping = PortMapping {
                container_port: port,
                host_port: port,
                protocol,
            };
            if !port_mappings.contains(&mapping) {
                port_mappings.push(mapping);
            }
        }

        let container = ContainerDefinition {
            name: descriptor.name.clone(),
            image: descriptor.container_name.clone(),
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                descriptor.run_command.clone(),
            ],
            cpu,
            memory: descriptor.memory_mb(),
            essential: true,
            environment: environment
                .iter()
                .map(|(name, value)| EnvironmentEntry {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            port_mappings,
        };

        Ok(Self {
            family: family_name(&descriptor.name),
            container_definitions: vec![container],
        })
    }

    /// Looks up an environment value in the first container
    pub fn environment_value(&self, name: &str) -> Option<&str> {
        self.container_definitions
            .first()?
            .environment
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }
}

/// Task families allow letters, digits, hyphens and underscores
fn family_name(algorithm: &str) -> String {
    let family: String = algorithm
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .take(255)
        .collect();
    if family.is_empty() {
        "task".to_string()
    } else {
        family
    }
}
