//! Local provider backend
//!
//! Emulates the queue, bucket, task-definition, function and role APIs of the
//! cloud control plane. Every mutation works on a copy of the state which is
//! written to the state file (when configured) before it becomes visible, so
//! a failed write never leaves a half-applied change behind.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use yunpipe_core::domain::resource::{
    BucketRef, FunctionPackage, FunctionRef, QueueRef, RoleRef, RoleSpec, TaskRef, TriggerTarget,
};
use yunpipe_core::domain::task::TaskDefinition;
use yunpipe_core::names::{HaikuNames, NameSource};
use yunpipe_core::{ProvisionError, ResourceKind, Result};

use crate::state::{
    BucketRecord, CloudState, FunctionRecord, InvokePermission, NotificationConfiguration,
    QueueRecord, RoleRecord, TaskRevision,
};
use crate::{OBJECT_CREATED_EVENT, ResourceProvider, STORAGE_INVOKE_STATEMENT};

const STORAGE_PRINCIPAL: &str = "s3.amazonaws.com";
const MAX_FUNCTION_TIMEOUT_SECS: u32 = 900;

/// Extracts the queue name (last path segment) from a queue URL
pub fn queue_name_from_url(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Splits a queue URL into its `(region, account, name)` parts
pub fn parse_queue_url(url: &str) -> Option<(&str, &str, &str)> {
    let rest = url.strip_prefix("https://sqs.")?;
    let (region, rest) = rest.split_once(".amazonaws.com/")?;
    let (account, name) = rest.split_once('/')?;
    if region.is_empty() || account.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((region, account, name))
}

/// Emulated provider bound to one account and region
pub struct LocalProvider {
    account_id: String,
    region: String,
    state: Mutex<CloudState>,
    state_file: Option<PathBuf>,
    names: Arc<dyn NameSource>,
}

impl LocalProvider {
    /// Creates a provider whose state lives only in memory
    pub fn in_memory(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            state: Mutex::new(CloudState::default()),
            state_file: None,
            names: Arc::new(HaikuNames::new()),
        }
    }

    /// Opens a provider backed by a state file, loading it if it exists
    pub fn open(
        path: impl Into<PathBuf>,
        account_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let raw = std::fs::read(&path)?;
            serde_json::from_slice(&raw)?
        } else {
            CloudState::default()
        };

        debug!("Opened provider state at {}", path.display());

        Ok(Self {
            state: Mutex::new(state),
            state_file: Some(path),
            ..Self::in_memory(account_id, region)
        })
    }

    /// Replaces the generator used for function names
    pub fn with_names(mut self, names: Arc<dyn NameSource>) -> Self {
        self.names = names;
        self
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Result<CloudState> {
        Ok(self.lock()?.clone())
    }

    /// Registers a bucket that already exists, owned by `owner`
    pub fn seed_bucket(&self, name: &str, owner: &str) -> Result<()> {
        self.mutate(|state| {
            state.buckets.insert(
                name.to_string(),
                BucketRecord {
                    owner: owner.to_string(),
                    created_at: Utc::now(),
                    notification: None,
                },
            );
            Ok(())
        })
    }

    fn queue_url(&self, name: &str) -> String {
        format!("{}{}", self.queue_url_prefix(), name)
    }

    fn queue_url_prefix(&self) -> String {
        format!(
            "https://sqs.{}.amazonaws.com/{}/",
            self.region, self.account_id
        )
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CloudState>> {
        self.state
            .lock()
            .map_err(|_| ProvisionError::provider("state", "provider state lock poisoned"))
    }

    /// Applies `f` to a copy of the state and commits it on success
    fn mutate<T>(&self, f: impl FnOnce(&mut CloudState) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        if let Some(path) = &self.state_file {
            write_state(path, &next)?;
        }
        *guard = next;
        Ok(out)
    }
}

fn write_state(path: &Path, state: &CloudState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn validate_queue_name(name: &str) -> Result<()> {
    let base = name.strip_suffix(".fifo").unwrap_or(name);
    let valid = !base.is_empty()
        && name.len() <= 80
        && base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ProvisionError::provider(
            "CreateQueue",
            format!("InvalidParameterValue: invalid queue name '{}'", name),
        ))
    }
}

fn validate_bucket_name(name: &str) -> Result<()> {
    let valid = (3..=63).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(ProvisionError::provider(
            "CreateBucket",
            format!("InvalidBucketName: '{}'", name),
        ))
    }
}

#[async_trait]
impl ResourceProvider for LocalProvider {
    async fn get_or_create_queue(&self, name: &str) -> Result<QueueRef> {
        validate_queue_name(name)?;
        let prefix = self.queue_url_prefix();
        let url = self.queue_url(name);
        let arn = format!("arn:aws:sqs:{}:{}:{}", self.region, self.account_id, name);

        self.mutate(|state| {
            // List, then match the final URL segment exactly: a queue named
            // "blur-2" must not satisfy a lookup for "blur".
            let existing = state
                .queues
                .iter()
                .filter(|(url, _)| url.starts_with(&prefix))
                .find(|(url, _)| queue_name_from_url(url) == Some(name));

            if let Some((url, record)) = existing {
                info!("Found queue {}", name);
                return Ok(QueueRef {
                    name: record.name.clone(),
                    url: url.clone(),
                    arn: record.arn.clone(),
                });
            }

            state.queues.insert(
                url.clone(),
                QueueRecord {
                    name: name.to_string(),
                    arn: arn.clone(),
                    created_at: Utc::now(),
                },
            );
            info!("Created queue {}", name);
            Ok(QueueRef {
                name: name.to_string(),
                url,
                arn,
            })
        })
    }

    async fn get_or_create_bucket(&self, name: &str) -> Result<BucketRef> {
        validate_bucket_name(name)?;

        self.mutate(|state| {
            if let Some(record) = state.buckets.get(name) {
                if record.owner != self.account_id {
                    return Err(ProvisionError::conflict(
                        ResourceKind::Bucket,
                        name,
                        format!("bucket is owned by account {}", record.owner),
                    ));
                }
                info!("Found bucket {}", name);
                return Ok(BucketRef::new(name));
            }

            state.buckets.insert(
                name.to_string(),
                BucketRecord {
                    owner: self.account_id.clone(),
                    created_at: Utc::now(),
                    notification: None,
                },
            );
            info!("Created bucket {}", name);
            Ok(BucketRef::new(name))
        })
    }

    async fn set_upload_trigger(&self, bucket: &BucketRef, target: &TriggerTarget) -> Result<()> {
        {
            let state = self.lock()?;
            if !state.buckets.contains_key(&bucket.name) {
                return Err(ProvisionError::not_found(ResourceKind::Bucket, &bucket.name));
            }
        }

        if let TriggerTarget::Function(arn) = target {
            self.grant_invoke_permission(arn, &bucket.arn()).await?;
        }

        self.mutate(|state| {
            if let TriggerTarget::Queue(arn) = target {
                if !state.queues.values().any(|q| &q.arn == arn) {
                    return Err(ProvisionError::not_found(ResourceKind::Queue, arn));
                }
            }

            let record = state
                .buckets
                .get_mut(&bucket.name)
                .ok_or_else(|| ProvisionError::not_found(ResourceKind::Bucket, &bucket.name))?;

            if let Some(previous) = &record.notification {
                if previous.target != *target {
                    debug!(
                        "Replacing {} notification of bucket {} ({} -> {})",
                        previous.target.kind(),
                        bucket.name,
                        previous.target.arn(),
                        target.arn()
                    );
                }
            }

            record.notification = Some(NotificationConfiguration {
                target: target.clone(),
                events: vec![OBJECT_CREATED_EVENT.to_string()],
            });
            info!(
                "Bucket {} now notifies {} {}",
                bucket.name,
                target.kind(),
                target.arn()
            );
            Ok(())
        })
    }

    async fn register_task_definition(&self, definition: &TaskDefinition) -> Result<TaskRef> {
        if definition.container_definitions.is_empty() {
            return Err(ProvisionError::provider(
                "RegisterTaskDefinition",
                format!(
                    "ClientException: family '{}' has no container definitions",
                    definition.family
                ),
            ));
        }

        self.mutate(|state| {
            let revisions = state
                .task_definitions
                .entry(definition.family.clone())
                .or_default();
            let revision = revisions.last().map(|r| r.revision).unwrap_or(0) + 1;
            let arn = format!(
                "arn:aws:ecs:{}:{}:task-definition/{}:{}",
                self.region, self.account_id, definition.family, revision
            );

            revisions.push(TaskRevision {
                revision,
                arn: arn.clone(),
                active: true,
                definition: definition.clone(),
                registered_at: Utc::now(),
            });
            info!("Registered task definition {}:{}", definition.family, revision);

            Ok(TaskRef {
                family: definition.family.clone(),
                revision,
                arn,
            })
        })
    }

    async fn deploy_function(&self, package: &FunctionPackage) -> Result<FunctionRef> {
        if package.timeout_secs == 0 || package.timeout_secs > MAX_FUNCTION_TIMEOUT_SECS {
            return Err(ProvisionError::provider(
                "CreateFunction",
                format!(
                    "InvalidParameterValueException: timeout {}s outside 1..={}",
                    package.timeout_secs, MAX_FUNCTION_TIMEOUT_SECS
                ),
            ));
        }

        let name = self.names.next_name();
        let arn = format!(
            "arn:aws:lambda:{}:{}:function:{}",
            self.region, self.account_id, name
        );

        self.mutate(|state| {
            let role = state.roles.get(&package.role_name).ok_or_else(|| {
                ProvisionError::PermissionError(format!(
                    "execution role '{}' does not exist; bootstrap it before compiling pipelines",
                    package.role_name
                ))
            })?;

            if state.functions.contains_key(&name) {
                return Err(ProvisionError::conflict(
                    ResourceKind::Function,
                    &name,
                    "function already exists",
                ));
            }

            let record = FunctionRecord {
                arn: arn.clone(),
                runtime: package.runtime.clone(),
                handler: package.handler.clone(),
                role_arn: role.arn.clone(),
                timeout_secs: package.timeout_secs,
                memory_mb: package.memory_mb,
                file_name: package.file_name.clone(),
                source: package.source.clone(),
                permissions: Vec::new(),
                created_at: Utc::now(),
            };
            state.functions.insert(name.clone(), record);
            info!("Deployed function {} ({} bytes)", name, package.source.len());

            Ok(FunctionRef {
                name: name.clone(),
                arn: arn.clone(),
            })
        })
    }

    async fn grant_invoke_permission(&self, function_arn: &str, source_arn: &str) -> Result<()> {
        self.mutate(|state| {
            let record = state
                .functions
                .values_mut()
                .find(|f| f.arn == function_arn)
                .ok_or_else(|| ProvisionError::not_found(ResourceKind::Function, function_arn))?;

            if let Some(existing) = record
                .permissions
                .iter()
                .find(|p| p.statement_id == STORAGE_INVOKE_STATEMENT)
            {
                if existing.source_arn == source_arn {
                    debug!("Invoke permission for {} already granted", source_arn);
                    return Ok(());
                }
                return Err(ProvisionError::conflict(
                    ResourceKind::Function,
                    function_arn,
                    format!(
                        "statement {} already grants {}",
                        STORAGE_INVOKE_STATEMENT, existing.source_arn
                    ),
                ));
            }

            record.permissions.push(InvokePermission {
                statement_id: STORAGE_INVOKE_STATEMENT.to_string(),
                principal: STORAGE_PRINCIPAL.to_string(),
                source_arn: source_arn.to_string(),
            });
            debug!("Granted {} invoke on {}", source_arn, function_arn);
            Ok(())
        })
    }

    async fn upload_trigger(&self, bucket: &str) -> Result<Option<TriggerTarget>> {
        let state = self.lock()?;
        let record = state
            .buckets
            .get(bucket)
            .ok_or_else(|| ProvisionError::not_found(ResourceKind::Bucket, bucket))?;
        Ok(record.notification.as_ref().map(|n| n.target.clone()))
    }

    async fn ensure_role(&self, spec: &RoleSpec) -> Result<RoleRef> {
        let arn = format!("arn:aws:iam::{}:role/{}", self.account_id, spec.name);

        self.mutate(|state| {
            let record = state.roles.entry(spec.name.clone()).or_insert_with(|| {
                info!("Creating role {}", spec.name);
                RoleRecord {
                    arn: arn.clone(),
                    trust_policy: spec.trust_policy.clone(),
                    inline_policies: Default::default(),
                }
            });

            if record.trust_policy != spec.trust_policy {
                info!("Updating trust policy of role {}", spec.name);
                record.trust_policy = spec.trust_policy.clone();
            }

            if record.inline_policies.get(&spec.policy_name) != Some(&spec.policy) {
                info!("Putting policy {} on role {}", spec.policy_name, spec.name);
                record
                    .inline_policies
                    .insert(spec.policy_name.clone(), spec.policy.clone());
            }

            Ok(RoleRef {
                name: spec.name.clone(),
                arn: record.arn.clone(),
            })
        })
    }

    async fn delete_queue(&self, url: &str) -> Result<()> {
        self.mutate(|state| {
            state
                .queues
                .remove(url)
                .ok_or_else(|| ProvisionError::not_found(ResourceKind::Queue, url))?;
            info!("Deleted queue {}", url);
            Ok(())
        })
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        self.mutate(|state| {
            state
                .buckets
                .remove(name)
                .ok_or_else(|| ProvisionError::not_found(ResourceKind::Bucket, name))?;
            info!("Deleted bucket {}", name);
            Ok(())
        })
    }

    async fn deregister_task_definition(&self, arn: &str) -> Result<()> {
        self.mutate(|state| {
            let revision = state
                .task_definitions
                .values_mut()
                .flatten()
                .find(|rev| rev.arn == arn && rev.active)
                .ok_or_else(|| ProvisionError::not_found(ResourceKind::TaskDefinition, arn))?;
            revision.active = false;
            info!("Deregistered task definition {}", arn);
            Ok(())
        })
    }

    async fn delete_function(&self, arn: &str) -> Result<()> {
        self.mutate(|state| {
            let name = state
                .function(arn)
                .map(|(name, _)| name.clone())
                .ok_or_else(|| ProvisionError::not_found(ResourceKind::Function, arn))?;
            state.functions.remove(&name);
            info!("Deleted function {}", name);
            Ok(())
        })
    }
}
