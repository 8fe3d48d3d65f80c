//! Execution credential resolution
//!
//! The engine never discovers or stores credentials itself. A resolver hands
//! it the set injected into every stage's runnable unit.

use async_trait::async_trait;
use yunpipe_core::domain::system::{
    ENV_ACCESS_KEY_ID, ENV_OUTPUT, ENV_REGION, ENV_SECRET_ACCESS_KEY, ExecutionCredentials,
};
use yunpipe_core::{ProvisionError, Result};

/// Output format used when none is configured
const DEFAULT_OUTPUT_FORMAT: &str = "json";

/// Supplies the credentials injected into runnable units
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve_credentials(&self) -> Result<ExecutionCredentials>;
}

/// Reads credentials from the standard `AWS_*` environment variables
pub struct EnvCredentialResolver {
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl EnvCredentialResolver {
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Resolver reading variables through `lookup` instead of the process environment
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.var(key).ok_or_else(|| {
            ProvisionError::PermissionError(format!(
                "execution credentials incomplete: {} is not set",
                key
            ))
        })
    }
}

impl Default for EnvCredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialResolver for EnvCredentialResolver {
    async fn resolve_credentials(&self) -> Result<ExecutionCredentials> {
        Ok(ExecutionCredentials {
            region: self.required(ENV_REGION)?,
            output_format: self
                .var(ENV_OUTPUT)
                .unwrap_or_else(|| DEFAULT_OUTPUT_FORMAT.to_string()),
            access_key_id: self.required(ENV_ACCESS_KEY_ID)?,
            secret_access_key: self.required(ENV_SECRET_ACCESS_KEY)?,
        })
    }
}

/// A fixed credential set
pub struct StaticCredentials(pub ExecutionCredentials);

#[async_trait]
impl CredentialResolver for StaticCredentials {
    async fn resolve_credentials(&self) -> Result<ExecutionCredentials> {
        Ok(self.0.clone())
    }
}
