//! Run-scoped staging area.

use async_trait::async_trait;

/// Workspace errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkspaceError {
    #[error("No file {path} in container {container}")]
    NotFound { container: String, path: String },
    #[error("Workspace I/O failed: {reason}")]
    Io { reason: String },
}

impl WorkspaceError {
    pub fn not_found(container: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotFound {
            container: container.into(),
            path: path.into(),
        }
    }

    pub fn io(reason: impl Into<String>) -> Self {
        Self::Io {
            reason: reason.into(),
        }
    }
}

/// Small-file storage keyed by container (one per run) and relative path.
#[async_trait]
pub trait WorkspaceEffects: Send + Sync {
    /// Write a file, replacing any previous content.
    async fn put(&self, container: &str, path: &str, bytes: Vec<u8>)
        -> Result<(), WorkspaceError>;

    async fn get(&self, container: &str, path: &str) -> Result<Vec<u8>, WorkspaceError>;

    /// Paths under `prefix`, sorted.
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, WorkspaceError>;

    async fn delete_container(&self, container: &str) -> Result<(), WorkspaceError>;
}
