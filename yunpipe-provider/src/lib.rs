//! Yunpipe Resource Provider
//!
//! The thin facade the engine provisions through. Every creation call is
//! idempotent per logical name; no call retries, and provider failures are
//! surfaced unchanged.
//!
//! Backends:
//! - [`LocalProvider`]: an emulated control plane kept in memory and
//!   optionally mirrored to a JSON state file, so that compilation and
//!   teardown can run as separate processes
//!
//! # Example
//!
//! ```no_run
//! use yunpipe_provider::{LocalProvider, ResourceProvider};
//!
//! # async fn example() -> yunpipe_core::Result<()> {
//! let provider = LocalProvider::in_memory("123456789012", "us-east-1");
//! let queue = provider.get_or_create_queue("blur-queue").await?;
//! let again = provider.get_or_create_queue("blur-queue").await?;
//! assert_eq!(queue.url, again.url);
//! # Ok(())
//! # }
//! ```

mod local;
pub mod state;

pub use local::{LocalProvider, parse_queue_url, queue_name_from_url};

use async_trait::async_trait;
use yunpipe_core::Result;
use yunpipe_core::domain::resource::{
    BucketRef, FunctionPackage, FunctionRef, QueueRef, RoleRef, RoleSpec, TaskRef, TriggerTarget,
};
use yunpipe_core::domain::task::TaskDefinition;

/// Statement id used for the storage service's invoke grant
pub const STORAGE_INVOKE_STATEMENT: &str = "Allow_s3_invoke";

/// Event delivered to upload-trigger targets
pub const OBJECT_CREATED_EVENT: &str = "s3:ObjectCreated:*";

/// Contract the engine expects from a cloud provider
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Looks up a queue by exact name, creating it if absent
    async fn get_or_create_queue(&self, name: &str) -> Result<QueueRef>;

    /// Looks up a bucket by exact name, creating it if absent
    async fn get_or_create_bucket(&self, name: &str) -> Result<BucketRef>;

    /// Routes the bucket's object-created events to `target`
    ///
    /// Replaces any existing notification configuration of the bucket; the
    /// last call wins. Function targets are first granted permission to be
    /// invoked by the storage service.
    async fn set_upload_trigger(&self, bucket: &BucketRef, target: &TriggerTarget) -> Result<()>;

    /// Registers a new revision of the definition's family
    async fn register_task_definition(&self, definition: &TaskDefinition) -> Result<TaskRef>;

    /// Packages and uploads a trigger function under a fresh random name
    ///
    /// Fails with `PermissionError` when the package's execution role does
    /// not exist.
    async fn deploy_function(&self, package: &FunctionPackage) -> Result<FunctionRef>;

    /// Allows `source_arn` to invoke the function
    async fn grant_invoke_permission(&self, function_arn: &str, source_arn: &str) -> Result<()>;

    /// Current upload-trigger target of a bucket, if any
    async fn upload_trigger(&self, bucket: &str) -> Result<Option<TriggerTarget>>;

    /// Creates the role or brings its trust and inline policy up to date
    async fn ensure_role(&self, spec: &RoleSpec) -> Result<RoleRef>;

    async fn delete_queue(&self, url: &str) -> Result<()>;

    async fn delete_bucket(&self, name: &str) -> Result<()>;

    async fn deregister_task_definition(&self, arn: &str) -> Result<()>;

    async fn delete_function(&self, arn: &str) -> Result<()>;
}
