//! Algorithm descriptor store
//!
//! Resolves an algorithm name to the descriptor the wrapping workflow
//! published for it. Resolution is read-only.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use yunpipe_core::domain::descriptor::AlgorithmDescriptor;
use yunpipe_core::{ProvisionError, ResourceKind, Result};

/// Suffix of published descriptor files
const DESCRIPTOR_SUFFIX: &str = "_info.json";

/// Read-only lookup of algorithm descriptors by exact name
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    /// Returns the descriptor published under `name`
    ///
    /// Fails with `NotFound` when nothing was published under that name.
    async fn resolve(&self, name: &str) -> Result<AlgorithmDescriptor>;

    /// Names of every published descriptor, sorted
    async fn list(&self) -> Result<Vec<String>>;
}

/// Descriptors stored as `<name>_info.json` files in one directory
pub struct FsDescriptorStore {
    dir: PathBuf,
}

impl FsDescriptorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", name, DESCRIPTOR_SUFFIX))
    }
}

#[async_trait]
impl DescriptorStore for FsDescriptorStore {
    async fn resolve(&self, name: &str) -> Result<AlgorithmDescriptor> {
        // Names that could escape the directory never match a published file
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ProvisionError::not_found(ResourceKind::Descriptor, name));
        }

        // Exact, case-sensitive match against the directory listing; a
        // case-insensitive filesystem must not resolve "Blur" to "blur".
        let file_name = format!("{}{}", name, DESCRIPTOR_SUFFIX);
        let published = self.list().await?;
        if !published.iter().any(|n| n == name) {
            return Err(ProvisionError::not_found(ResourceKind::Descriptor, name));
        }

        let path = self.path_for(name);
        debug!("Reading descriptor {} from {}", name, path.display());
        let raw = std::fs::read(&path)?;
        let descriptor: AlgorithmDescriptor = serde_json::from_slice(&raw).map_err(|e| {
            ProvisionError::InvalidRequest(format!("descriptor {} is malformed: {}", file_name, e))
        })?;
        Ok(descriptor)
    }

    async fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry
                .file_name()
                .to_str()
                .and_then(|f| f.strip_suffix(DESCRIPTOR_SUFFIX))
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Descriptors held in memory
#[derive(Default)]
pub struct InMemoryDescriptorStore {
    descriptors: BTreeMap<String, AlgorithmDescriptor>,
}

impl InMemoryDescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a descriptor under its container name
    pub fn with(mut self, descriptor: AlgorithmDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn insert(&mut self, descriptor: AlgorithmDescriptor) {
        self.descriptors
            .insert(descriptor.container_name.clone(), descriptor);
    }
}

#[async_trait]
impl DescriptorStore for InMemoryDescriptorStore {
    async fn resolve(&self, name: &str) -> Result<AlgorithmDescriptor> {
        self.descriptors
            .get(name)
            .cloned()
            .ok_or_else(|| ProvisionError::not_found(ResourceKind::Descriptor, name))
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.descriptors.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yunpipe_core::domain::descriptor::MemoryRequirement;

    fn descriptor(name: &str) -> AlgorithmDescriptor {
        AlgorithmDescriptor {
            container_name: name.to_string(),
            system: "ubuntu".to_string(),
            run_command: "run".to_string(),
            name: name.to_string(),
            instance_type: "t2.micro".to_string(),
            memory: MemoryRequirement {
                minimal: 128,
                suggested: None,
            },
            cpu: 1,
            environment: vec![],
            ports: vec![],
        }
    }

    fn publish(dir: &std::path::Path, descriptor: &AlgorithmDescriptor) {
        let path = dir.join(format!("{}_info.json", descriptor.container_name));
        std::fs::write(path, serde_json::to_vec(descriptor).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_fs_resolve_and_list() {
        let dir = tempfile::tempdir().unwrap();
        publish(dir.path(), &descriptor("blur"));
        publish(dir.path(), &descriptor("edges"));
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = FsDescriptorStore::new(dir.path());
        assert_eq!(store.resolve("blur").await.unwrap().name, "blur");
        assert_eq!(store.list().await.unwrap(), vec!["blur", "edges"]);
    }

    #[tokio::test]
    async fn test_fs_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        publish(dir.path(), &descriptor("blur"));
        let store = FsDescriptorStore::new(dir.path());

        assert!(store.resolve("Blur").await.unwrap_err().is_not_found());
        assert!(store.resolve("blu").await.unwrap_err().is_not_found());
        assert!(store.resolve("../blur").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_fs_missing_dir_lists_nothing() {
        let store = FsDescriptorStore::new("/nonexistent/yunpipe/algorithms");
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.resolve("blur").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_fs_malformed_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken_info.json"), "{").unwrap();
        let store = FsDescriptorStore::new(dir.path());

        let err = store.resolve("broken").await.unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_demo_descriptors_resolve() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/algorithms");
        let store = FsDescriptorStore::new(dir);

        assert_eq!(store.list().await.unwrap(), vec!["blur", "edges"]);
        let blur = store.resolve("blur").await.unwrap();
        assert_eq!(blur.required_variables().collect::<Vec<_>>(), vec!["radius"]);
        let edges = store.resolve("edges").await.unwrap();
        assert_eq!(edges.memory_mb(), 256);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryDescriptorStore::new().with(descriptor("blur"));
        assert!(store.resolve("blur").await.is_ok());
        assert!(store.resolve("sharpen").await.unwrap_err().is_not_found());
    }
}
