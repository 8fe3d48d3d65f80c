//! Fixtures shared by the engine's unit and integration tests
//!
//! Compiled for the crate's own tests and behind the `testing` feature.

use std::collections::BTreeMap;
use std::sync::Arc;

use yunpipe_core::domain::descriptor::{AlgorithmDescriptor, DeclaredVariable, MemoryRequirement};
use yunpipe_core::domain::pipeline::{AlgorithmSpec, PipelineRequest, ProcessSpec};
use yunpipe_core::domain::system::{ExecutionCredentials, SystemInfo};
use yunpipe_core::Result;
use yunpipe_core::names::SequentialNames;
use yunpipe_provider::LocalProvider;

use crate::bootstrap::bootstrap_execution_role;
use crate::config::Config;
use crate::context::ProvisionContext;
use crate::credentials::StaticCredentials;
use crate::descriptor::InMemoryDescriptorStore;
use crate::manifest::InMemoryManifestStore;

pub const ACCOUNT: &str = "123456789012";
pub const REGION: &str = "us-east-1";

pub fn descriptor(name: &str, required: &[&str]) -> AlgorithmDescriptor {
    AlgorithmDescriptor {
        container_name: name.to_string(),
        system: "ubuntu".to_string(),
        run_command: format!("python {}.py", name),
        name: name.to_string(),
        instance_type: "t2.micro".to_string(),
        memory: MemoryRequirement {
            minimal: 128,
            suggested: Some(256),
        },
        cpu: 1,
        environment: required
            .iter()
            .map(|n| DeclaredVariable {
                name: n.to_string(),
                required: true,
            })
            .collect(),
        ports: vec![],
    }
}

pub fn credentials() -> ExecutionCredentials {
    ExecutionCredentials {
        region: REGION.to_string(),
        output_format: "json".to_string(),
        access_key_id: "AKIAEXAMPLE".to_string(),
        secret_access_key: "secret".to_string(),
    }
}

/// Resolver handing out [`credentials`]
pub fn static_credentials() -> StaticCredentials {
    StaticCredentials(credentials())
}

pub fn system() -> SystemInfo {
    SystemInfo {
        image_id: "ami-1234".to_string(),
        instance_profile: "ecsInstanceRole".to_string(),
        subnet_id: "subnet-42".to_string(),
        security_group: "default".to_string(),
        key_pair: "my-key".to_string(),
        account_id: ACCOUNT.to_string(),
        region: REGION.to_string(),
    }
}

pub fn request(kind: &str, names: &[&str], input: &str, output: &str) -> PipelineRequest {
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
        input_s3_name: input.to_string(),
        output_s3_name: output.to_string(),
        key_pair: "my-key".to_string(),
        account_id: ACCOUNT.to_string(),
        region: REGION.to_string(),
    }
}

/// A context over an in-memory provider with the execution role in place
pub async fn context(
    descriptors: Vec<AlgorithmDescriptor>,
) -> Result<(ProvisionContext, Arc<LocalProvider>, Arc<InMemoryManifestStore>)> {
    let config = Config::with_home("/tmp/yunpipe-test");
    let provider = Arc::new(
        LocalProvider::in_memory(ACCOUNT, REGION).with_names(Arc::new(SequentialNames::new("fn"))),
    );
    bootstrap_execution_role(provider.as_ref(), &config).await?;

    let mut store = InMemoryDescriptorStore::new();
    for descriptor in descriptors {
        store.insert(descriptor);
    }
    let manifests = Arc::new(InMemoryManifestStore::new());

    let ctx = ProvisionContext::new(
        provider.clone(),
        Arc::new(store),
        manifests.clone(),
        Arc::new(SequentialNames::new("gen")),
        config,
    );
    Ok((ctx, provider, manifests))
}
