//! Region-wide facts and execution credentials shared by every stage

use std::fmt;

use serde::{Deserialize, Serialize};

use super::pipeline::PipelineRequest;

/// Pipeline-independent placement facts for the runnable units
///
/// Computed once per compilation and shared read-only by all stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Machine image for container hosts
    pub image_id: String,
    /// Instance identity (profile) name for container hosts
    pub instance_profile: String,
    /// Subnet chosen by an external placement policy
    pub subnet_id: String,
    pub security_group: String,
    pub key_pair: String,
    pub account_id: String,
    pub region: String,
}

/// Placement values that do not come from the pipeline request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub image_id: String,
    pub instance_profile: String,
    pub subnet_id: String,
    pub security_group: String,
}

impl SystemInfo {
    /// Combines externally resolved placement with the request's identity
    pub fn new(placement: &Placement, request: &PipelineRequest) -> Self {
        Self {
            image_id: placement.image_id.clone(),
            instance_profile: placement.instance_profile.clone(),
            subnet_id: placement.subnet_id.clone(),
            security_group: placement.security_group.clone(),
            key_pair: request.key_pair.clone(),
            account_id: request.account_id.clone(),
            region: request.region.clone(),
        }
    }
}

/// Environment variable names carrying the execution credentials
pub const ENV_REGION: &str = "AWS_DEFAULT_REGION";
pub const ENV_OUTPUT: &str = "AWS_DEFAULT_OUTPUT";
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

/// Credentials injected into every runnable unit's environment
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionCredentials {
    pub region: String,
    pub output_format: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl ExecutionCredentials {
    /// The credentials as `(variable, value)` pairs
    pub fn as_environment(&self) -> [(&'static str, &str); 4] {
        [
            (ENV_REGION, self.region.as_str()),
            (ENV_OUTPUT, self.output_format.as_str()),
            (ENV_ACCESS_KEY_ID, self.access_key_id.as_str()),
            (ENV_SECRET_ACCESS_KEY, self.secret_access_key.as_str()),
        ]
    }
}

impl fmt::Debug for ExecutionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionCredentials")
            .field("region", &self.region)
            .field("output_format", &self.output_format)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let creds = ExecutionCredentials {
            region: "us-east-1".to_string(),
            output_format: "json".to_string(),
            access_key_id: "AKIA".to_string(),
            secret_access_key: "super-secret".to_string(),
        };
        let shown = format!("{:?}", creds);
        assert!(shown.contains("AKIA"));
        assert!(!shown.contains("super-secret"));
    }

    #[test]
    fn test_environment_pairs() {
        let creds = ExecutionCredentials {
            region: "eu-west-1".to_string(),
            output_format: "json".to_string(),
            access_key_id: "id".to_string(),
            secret_access_key: "secret".to_string(),
        };
        let env = creds.as_environment();
        assert_eq!(env[0], (ENV_REGION, "eu-west-1"));
        assert_eq!(env[3], (ENV_SECRET_ACCESS_KEY, "secret"));
    }
}
