//! Cleanup manifest persistence
//!
//! One document per compilation, written once when compilation ends
//! (successfully or not) and read back by teardown.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};
use yunpipe_core::domain::manifest::CleanupManifest;
use yunpipe_core::{ProvisionError, ResourceKind, Result};

/// Durable storage for cleanup manifests
#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Persists the manifest of run `run_name`, returning where it was written
    async fn save(&self, run_name: &str, manifest: &CleanupManifest) -> Result<String>;

    /// Reads back a manifest from a location returned by [`ManifestStore::save`]
    async fn load(&self, location: &str) -> Result<CleanupManifest>;
}

/// File name of the manifest for one run
pub fn manifest_file_name(run_name: &str) -> String {
    format!("clean_up-{}.json", run_name)
}

/// Manifests stored as pretty JSON files in one directory
pub struct FsManifestStore {
    dir: PathBuf,
}

impl FsManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ManifestStore for FsManifestStore {
    async fn save(&self, run_name: &str, manifest: &CleanupManifest) -> Result<String> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(manifest_file_name(run_name));
        let mut body = serde_json::to_vec_pretty(manifest)?;
        body.push(b'\n');

        // A repeated run name must not replace an earlier teardown record
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ProvisionError::conflict(
                    ResourceKind::Manifest,
                    path.display().to_string(),
                    "a manifest was already written for this run",
                ));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&body)?;

        info!(
            "Wrote cleanup manifest with {} entries to {}",
            manifest.len(),
            path.display()
        );
        Ok(path.display().to_string())
    }

    async fn load(&self, location: &str) -> Result<CleanupManifest> {
        let path = PathBuf::from(location);
        if !path.is_file() {
            return Err(ProvisionError::not_found(ResourceKind::Manifest, location));
        }
        debug!("Loading cleanup manifest from {}", path.display());
        let raw = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// Manifests kept in memory, addressed as `memory://clean_up-<run>.json`
#[derive(Default)]
pub struct InMemoryManifestStore {
    manifests: Mutex<BTreeMap<String, CleanupManifest>>,
}

impl InMemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locations of every saved manifest, sorted
    pub fn locations(&self) -> Vec<String> {
        self.manifests
            .lock()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ManifestStore for InMemoryManifestStore {
    async fn save(&self, run_name: &str, manifest: &CleanupManifest) -> Result<String> {
        let location = format!("memory://{}", manifest_file_name(run_name));
        let mut manifests = self
            .manifests
            .lock()
            .map_err(|_| ProvisionError::provider("save manifest", "manifest store lock poisoned"))?;
        if manifests.contains_key(&location) {
            return Err(ProvisionError::conflict(
                ResourceKind::Manifest,
                location,
                "a manifest was already written for this run",
            ));
        }
        manifests.insert(location.clone(), manifest.clone());
        Ok(location)
    }

    async fn load(&self, location: &str) -> Result<CleanupManifest> {
        self.manifests
            .lock()
            .map_err(|_| ProvisionError::provider("load manifest", "manifest store lock poisoned"))?
            .get(location)
            .cloned()
            .ok_or_else(|| ProvisionError::not_found(ResourceKind::Manifest, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yunpipe_core::domain::resource::BucketRef;

    fn manifest() -> CleanupManifest {
        let mut manifest = CleanupManifest::new();
        manifest.alarm_queue = Some("https://sqs.us-east-1.amazonaws.com/1/alarm".to_string());
        manifest.queues.push("https://sqs.us-east-1.amazonaws.com/1/q".to_string());
        manifest.record_bucket(&BucketRef::new("in-bucket"));
        manifest
    }

    #[tokio::test]
    async fn test_fs_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsManifestStore::new(dir.path().join("manifests"));

        let location = store.save("quiet-moon-0042", &manifest()).await.unwrap();
        assert!(location.ends_with("clean_up-quiet-moon-0042.json"));

        let raw = std::fs::read_to_string(&location).unwrap();
        let keys: Vec<usize> = ["cloudwatch", "lambda", "s3", "sqs", "task"]
            .iter()
            .map(|k| raw.find(&format!("\"{}\"", k)).unwrap())
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(store.load(&location).await.unwrap(), manifest());
    }

    #[tokio::test]
    async fn test_fs_runs_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsManifestStore::new(dir.path());

        let first = store.save("run-1", &manifest()).await.unwrap();
        let second = store.save("run-2", &CleanupManifest::new()).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.load(&first).await.unwrap(), manifest());
    }

    #[tokio::test]
    async fn test_fs_repeated_run_keeps_first_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsManifestStore::new(dir.path());

        let location = store.save("run-1", &manifest()).await.unwrap();
        let err = store.save("run-1", &CleanupManifest::new()).await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(store.load(&location).await.unwrap(), manifest());
    }

    #[tokio::test]
    async fn test_fs_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsManifestStore::new(dir.path());
        let missing = dir.path().join("clean_up-none.json");

        let err = store.load(&missing.display().to_string()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryManifestStore::new();
        let location = store.save("run-1", &manifest()).await.unwrap();
        assert_eq!(location, "memory://clean_up-run-1.json");
        assert_eq!(store.load(&location).await.unwrap(), manifest());
        assert_eq!(store.locations(), vec![location.clone()]);

        assert!(store.save("run-1", &CleanupManifest::new()).await.unwrap_err().is_conflict());
        assert_eq!(store.load(&location).await.unwrap(), manifest());
    }
}
