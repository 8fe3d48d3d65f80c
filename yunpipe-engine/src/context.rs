//! Provisioning context
//!
//! Everything a compilation needs access to, built once per process
//! invocation and passed explicitly to the materializer and compiler.

use std::sync::Arc;

use yunpipe_core::names::NameSource;
use yunpipe_provider::ResourceProvider;

use crate::config::Config;
use crate::descriptor::DescriptorStore;
use crate::manifest::ManifestStore;

/// Shared handles for one provisioning session
#[derive(Clone)]
pub struct ProvisionContext {
    pub provider: Arc<dyn ResourceProvider>,
    pub descriptors: Arc<dyn DescriptorStore>,
    pub manifests: Arc<dyn ManifestStore>,
    /// Generates queue, intermediate bucket and run names
    pub names: Arc<dyn NameSource>,
    pub config: Config,
}

impl ProvisionContext {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        descriptors: Arc<dyn DescriptorStore>,
        manifests: Arc<dyn ManifestStore>,
        names: Arc<dyn NameSource>,
        config: Config,
    ) -> Self {
        Self {
            provider,
            descriptors,
            manifests,
            names,
            config,
        }
    }
}
