//! Yunpipe Engine
//!
//! The orchestration engine: turns a pipeline request into queues, task
//! definitions, trigger functions and buckets, wired together stage by
//! stage, and records every resource it creates so the pipeline can be torn
//! down later.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use yunpipe_core::names::HaikuNames;
//! use yunpipe_engine::{
//!     Config, FsDescriptorStore, FsManifestStore, PipelineCompiler, ProvisionContext,
//! };
//! use yunpipe_provider::LocalProvider;
//!
//! # async fn example(
//! #     request: yunpipe_core::domain::pipeline::PipelineRequest,
//! #     credentials: yunpipe_core::domain::system::ExecutionCredentials,
//! # ) -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let provider = LocalProvider::open(&config.state_file, &request.account_id, &request.region)?;
//! let ctx = ProvisionContext::new(
//!     Arc::new(provider),
//!     Arc::new(FsDescriptorStore::new(&config.algorithm_dir)),
//!     Arc::new(FsManifestStore::new(&config.manifest_dir)),
//!     Arc::new(HaikuNames::new()),
//!     config.clone(),
//! );
//!
//! let system = yunpipe_core::domain::system::SystemInfo::new(&config.placement, &request);
//! let compiled = PipelineCompiler::new(&ctx)
//!     .compile(&request, &system, &credentials)
//!     .await?;
//! println!("manifest written to {}", compiled.manifest_location);
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod compiler;
pub mod config;
pub mod context;
pub mod credentials;
pub mod descriptor;
pub mod environment;
pub mod manifest;
pub mod materializer;
pub mod teardown;
pub mod template;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bootstrap::{bootstrap_execution_role, execution_role_spec};
pub use compiler::{CompileFailure, CompiledPipeline, PipelineCompiler, storage_chain};
pub use config::Config;
pub use context::ProvisionContext;
pub use credentials::{CredentialResolver, EnvCredentialResolver, StaticCredentials};
pub use descriptor::{DescriptorStore, FsDescriptorStore, InMemoryDescriptorStore};
pub use manifest::{FsManifestStore, InMemoryManifestStore, ManifestStore};
pub use materializer::{StageFailure, StageMaterializer};
pub use teardown::{TeardownOptions, TeardownReport, teardown};
