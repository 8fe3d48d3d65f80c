//! Pipeline teardown
//!
//! Deletes what a cleanup manifest lists. Functions go first so no upload
//! can start a task that is about to disappear, then task definitions,
//! buckets, work queues and finally the alarm queue.

use std::collections::HashSet;
use std::fmt;

use tracing::{info, warn};
use yunpipe_core::ResourceKind;
use yunpipe_core::domain::manifest::CleanupManifest;
use yunpipe_provider::ResourceProvider;

/// What teardown should leave in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownOptions {
    /// Keep every bucket, including the caller's input and output
    pub retain_buckets: bool,
    /// Keep the alarm queue shared with other pipelines
    pub retain_alarm_queue: bool,
}

impl Default for TeardownOptions {
    fn default() -> Self {
        Self {
            retain_buckets: false,
            retain_alarm_queue: true,
        }
    }
}

/// One manifest entry and what happened to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownEntry {
    pub kind: ResourceKind,
    pub id: String,
}

impl fmt::Display for TeardownEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownError {
    pub entry: TeardownEntry,
    pub message: String,
}

/// Result of a teardown pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub deleted: Vec<TeardownEntry>,
    /// Entries that no longer existed
    pub already_gone: Vec<TeardownEntry>,
    pub retained: Vec<TeardownEntry>,
    pub failed: Vec<TeardownError>,
}

impl TeardownReport {
    /// True when nothing failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deletes every resource in `manifest`, each distinct identifier once
///
/// Missing resources count as already deleted. Other failures are
/// collected and teardown carries on with the remaining entries.
pub async fn teardown(
    provider: &dyn ResourceProvider,
    manifest: &CleanupManifest,
    options: &TeardownOptions,
) -> TeardownReport {
    let mut report = TeardownReport::default();
    let mut seen = HashSet::new();

    let alarm = manifest.alarm_queue.iter().map(|url| (ResourceKind::Queue, url, true));
    let entries = manifest
        .functions
        .iter()
        .map(|arn| (ResourceKind::Function, arn, false))
        .chain(
            manifest
                .task_definitions
                .iter()
                .map(|arn| (ResourceKind::TaskDefinition, arn, false)),
        )
        .chain(manifest.buckets.iter().map(|name| (ResourceKind::Bucket, name, false)))
        .chain(manifest.queues.iter().map(|url| (ResourceKind::Queue, url, false)))
        .chain(alarm);

    for (kind, id, is_alarm) in entries {
        if !seen.insert((kind, id.as_str())) {
            continue;
        }

        let entry = TeardownEntry {
            kind,
            id: id.clone(),
        };
        let retain = match kind {
            ResourceKind::Bucket => options.retain_buckets,
            ResourceKind::Queue if is_alarm => options.retain_alarm_queue,
            _ => false,
        };
        if retain {
            info!("Keeping {}", entry);
            report.retained.push(entry);
            continue;
        }

        let result = match kind {
            ResourceKind::Function => provider.delete_function(id).await,
            ResourceKind::TaskDefinition => provider.deregister_task_definition(id).await,
            ResourceKind::Bucket => provider.delete_bucket(id).await,
            _ => provider.delete_queue(id).await,
        };

        match result {
            Ok(()) => report.deleted.push(entry),
            Err(e) if e.is_not_found() => {
                info!("{} already gone", entry);
                report.already_gone.push(entry);
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", entry, e);
                report.failed.push(TeardownError {
                    entry,
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        "Teardown finished: {} deleted, {} already gone, {} kept, {} failed",
        report.deleted.len(),
        report.already_gone.len(),
        report.retained.len(),
        report.failed.len()
    );
    report
}
