//! Error types shared across yunpipe crates

use std::fmt;

use thiserror::Error;

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Kind of resource an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Queue,
    Bucket,
    Function,
    TaskDefinition,
    Role,
    Descriptor,
    Manifest,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::Queue => "queue",
            ResourceKind::Bucket => "bucket",
            ResourceKind::Function => "function",
            ResourceKind::TaskDefinition => "task definition",
            ResourceKind::Role => "role",
            ResourceKind::Descriptor => "algorithm descriptor",
            ResourceKind::Manifest => "manifest",
        };
        f.write_str(label)
    }
}

/// Errors that can occur while provisioning or tearing down a pipeline
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A descriptor or named resource does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },

    /// A same-named resource exists with an incompatible configuration
    #[error("{kind} '{name}' conflicts with an existing resource: {reason}")]
    ResourceConflict {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    /// A required environment variable is unresolved for a stage
    #[error("stage '{stage}' is missing required variable '{variable}'")]
    MissingConfiguration { stage: String, variable: String },

    /// Missing execution role or invocation grant
    #[error("permission error: {0}")]
    PermissionError(String),

    /// Pipeline type is neither `single_run` nor `sequence_run`
    #[error("unsupported pipeline shape '{0}', expected 'single_run' or 'sequence_run'")]
    UnsupportedShape(String),

    /// Opaque failure reported by the resource provider
    #[error("provider error during {operation}: {message}")]
    ProviderError { operation: String, message: String },

    /// The pipeline request is malformed
    #[error("invalid pipeline request: {0}")]
    InvalidRequest(String),

    /// Trigger function source could not be rendered
    #[error("failed to render trigger function: {0}")]
    Template(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProvisionError {
    /// Create a not-found error
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(kind: ResourceKind, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceConflict {
            kind,
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a provider error for the named operation
    pub fn provider(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a name collision
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ResourceConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = ProvisionError::not_found(ResourceKind::Descriptor, "blur");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "algorithm descriptor not found: blur");
    }

    #[test]
    fn test_conflict_predicate() {
        let err = ProvisionError::conflict(ResourceKind::Bucket, "raw", "owned by 222");
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }
}
