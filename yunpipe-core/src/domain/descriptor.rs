//! Algorithm descriptor types
//!
//! A descriptor is published by the container wrapping workflow as
//! `<container_name>_info.json` and is read-only to the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Immutable metadata about a containerized algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmDescriptor {
    /// Container image reference (e.g. `user/blur`)
    pub container_name: String,
    /// Base system the container was built from
    #[serde(default)]
    pub system: String,
    /// Command template run inside the container
    pub run_command: String,
    pub name: String,
    /// Suggested instance type for the container host
    #[serde(default)]
    pub instance_type: String,
    pub memory: MemoryRequirement,
    #[serde(rename = "CPU", default = "default_cpu")]
    pub cpu: u32,
    #[serde(rename = "user_specified_environment_variables", default)]
    pub environment: Vec<DeclaredVariable>,
    #[serde(rename = "port", default)]
    pub ports: Vec<DeclaredPort>,
}

fn default_cpu() -> u32 {
    1
}

/// Memory requirement in MB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRequirement {
    #[serde(default)]
    pub minimal: u32,
    #[serde(default)]
    pub suggested: Option<u32>,
}

/// An environment variable the algorithm declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredVariable {
    pub name: String,
    #[serde(default)]
    pub required: bool,
}

/// A port the algorithm exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclaredPort {
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

/// Transport protocol of a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AlgorithmDescriptor {
    /// Memory to reserve for the container, preferring the suggested value
    pub fn memory_mb(&self) -> u32 {
        self.memory
            .suggested
            .filter(|m| *m > 0)
            .unwrap_or(self.memory.minimal)
    }

    /// Names of the declared variables marked as required, in declaration order
    pub fn required_variables(&self) -> impl Iterator<Item = &str> {
        self.environment
            .iter()
            .filter(|v| v.required)
            .map(|v| v.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUR_INFO: &str = r#"{
        "container_name": "wangyx2005/blur",
        "system": "ubuntu",
        "run_command": "python blur.py",
        "name": "blur",
        "instance_type": "t2.micro",
        "memory": {"minimal": 4, "suggested": 512},
        "CPU": 1,
        "user_specified_environment_variables": [
            {"name": "radius", "required": true},
            {"name": "LOG_LVL", "required": false}
        ],
        "port": [{"port": 8080, "protocol": "tcp"}]
    }"#;

    #[test]
    fn test_parse_descriptor_document() {
        let descriptor: AlgorithmDescriptor = serde_json::from_str(BLUR_INFO).unwrap();
        assert_eq!(descriptor.container_name, "wangyx2005/blur");
        assert_eq!(descriptor.cpu, 1);
        assert_eq!(descriptor.memory_mb(), 512);
        assert_eq!(descriptor.ports[0].protocol, Protocol::Tcp);
        assert_eq!(descriptor.required_variables().collect::<Vec<_>>(), vec!["radius"]);
    }

    #[test]
    fn test_memory_falls_back_to_minimal() {
        let mut descriptor: AlgorithmDescriptor = serde_json::from_str(BLUR_INFO).unwrap();
        descriptor.memory.suggested = None;
        assert_eq!(descriptor.memory_mb(), 4);
    }
}
