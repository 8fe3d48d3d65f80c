//! Pipeline request types

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::descriptor::{DeclaredPort, Protocol};
use crate::error::{ProvisionError, Result};

/// The full user intent, as read from a pipeline request document
///
/// ```json
/// {
///   "process": {"type": "sequence_run", "algorithms": [{"name": "blur", "port": [], "variables": {}}]},
///   "input_s3_name": "raw",
///   "output_s3_name": "final",
///   "key_pair": "my-key",
///   "account_id": "123456789012",
///   "region": "us-east-1"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub process: ProcessSpec,
    pub input_s3_name: String,
    pub output_s3_name: String,
    pub key_pair: String,
    pub account_id: String,
    pub region: String,
}

/// Pipeline shape and ordered stage specs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Raw shape name; parsed with [`PipelineShape::parse`]
    #[serde(rename = "type")]
    pub kind: String,
    pub algorithms: Vec<AlgorithmSpec>,
}

/// One algorithm stage as requested by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmSpec {
    pub name: String,
    #[serde(default)]
    pub port: Vec<PortRequest>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// A port the user wants exposed, either a bare number or a full mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortRequest {
    Bare(u16),
    Mapping(DeclaredPort),
}

impl PortRequest {
    pub fn port(&self) -> u16 {
        match self {
            PortRequest::Bare(port) => *port,
            PortRequest::Mapping(mapping) => mapping.port,
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            PortRequest::Bare(_) => Protocol::Tcp,
            PortRequest::Mapping(mapping) => mapping.protocol,
        }
    }
}

/// Supported pipeline shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineShape {
    /// Exactly one stage between the global input and output
    Single,
    /// An ordered chain of stages joined by generated buckets
    Sequence,
}

impl PipelineShape {
    /// Parses the document's `process.type` value
    pub fn parse(kind: &str) -> Result<Self> {
        match kind {
            "single_run" => Ok(PipelineShape::Single),
            "sequence_run" => Ok(PipelineShape::Sequence),
            other => Err(ProvisionError::UnsupportedShape(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineShape::Single => "single_run",
            PipelineShape::Sequence => "sequence_run",
        }
    }
}

impl fmt::Display for PipelineShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PipelineRequest {
    /// Parses the shape and checks the request is structurally usable
    ///
    /// Runs before any resource is touched, so a rejected request leaves no
    /// trace in the cloud.
    pub fn validate(&self) -> Result<PipelineShape> {
        let shape = PipelineShape::parse(&self.process.kind)?;

        match (shape, self.process.algorithms.len()) {
            (PipelineShape::Single, 1) => {}
            (PipelineShape::Single, n) => {
                return Err(ProvisionError::InvalidRequest(format!(
                    "single_run expects exactly one algorithm, got {}",
                    n
                )));
            }
            (PipelineShape::Sequence, 0) => {
                return Err(ProvisionError::InvalidRequest(
                    "sequence_run expects at least one algorithm".to_string(),
                ));
            }
            (PipelineShape::Sequence, _) => {}
        }

        if let Some(index) = self
            .process
            .algorithms
            .iter()
            .position(|a| a.name.trim().is_empty())
        {
            return Err(ProvisionError::InvalidRequest(format!(
                "algorithm {} of {} has an empty name",
                index + 1,
                self.process.algorithms.len()
            )));
        }

        if self.input_s3_name.trim().is_empty() || self.output_s3_name.trim().is_empty() {
            return Err(ProvisionError::InvalidRequest(
                "input_s3_name and output_s3_name are required".to_string(),
            ));
        }

        if self.input_s3_name == self.output_s3_name {
            return Err(ProvisionError::InvalidRequest(format!(
                "input and output bucket must differ, both are '{}'",
                self.input_s3_name
            )));
        }

        Ok(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: &str, names: &[&str]) -> PipelineRequest {
        PipelineRequest {
            process: ProcessSpec {
                kind: kind.to_string(),
                algorithms: names
                    .iter()
                    .map(|n| AlgorithmSpec {
                        name: n.to_string(),
                        port: vec![],
                        variables: BTreeMap::new(),
                    })
                    .collect(),
            },
            input_s3_name: "in-bucket".to_string(),
            output_s3_name: "out-bucket".to_string(),
            key_pair: "key".to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
        }
    }

    #[test]
    fn test_parse_request_document() {
        let doc = r#"{
            "process": {
                "type": "single_run",
                "algorithms": [{"name": "blur", "port": [8080, {"port": 53, "protocol": "udp"}], "variables": {"radius": "3"}}]
            },
            "input_s3_name": "in-bucket",
            "output_s3_name": "out-bucket",
            "key_pair": "key",
            "account_id": "123456789012",
            "region": "us-east-1"
        }"#;

        let req: PipelineRequest = serde_json::from_str(doc).unwrap();
        let alg = &req.process.algorithms[0];
        assert_eq!(alg.port[0], PortRequest::Bare(8080));
        assert_eq!(alg.port[1].protocol(), Protocol::Udp);
        assert_eq!(alg.variables.get("radius").map(String::as_str), Some("3"));
        assert_eq!(req.validate().unwrap(), PipelineShape::Single);
    }

    #[test]
    fn test_unknown_shape_is_unsupported() {
        let err = request("fan_out", &["a"]).validate().unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedShape(ref s) if s == "fan_out"));
    }

    #[test]
    fn test_single_run_requires_one_algorithm() {
        let err = request("single_run", &["a", "b"]).validate().unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidRequest(_)));
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let err = request("sequence_run", &[]).validate().unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidRequest(_)));
        assert_eq!(
            request("sequence_run", &["a", "b", "c"]).validate().unwrap(),
            PipelineShape::Sequence
        );
    }

    #[test]
    fn test_same_input_and_output_rejected() {
        let mut req = request("single_run", &["a"]);
        req.output_s3_name = req.input_s3_name.clone();
        assert!(matches!(req.validate(), Err(ProvisionError::InvalidRequest(_))));
    }

    #[test]
    fn test_empty_algorithm_name_names_the_entry() {
        let err = request("sequence_run", &["a", " ", "c"]).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid pipeline request: algorithm 2 of 3 has an empty name"
        );
    }
}
