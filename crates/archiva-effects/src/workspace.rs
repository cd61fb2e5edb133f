//! Layer 3: Workspace Effect Handler - Production Only
//!
//! Filesystem implementation of `WorkspaceEffects`. Each container is a
//! directory under the base path and each workspace path a file below it.

use archiva_core::effects::{WorkspaceEffects, WorkspaceError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Filesystem-backed staging area.
#[derive(Debug, Clone)]
pub struct FilesystemWorkspaceHandler {
    base_path: PathBuf,
}

impl FilesystemWorkspaceHandler {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf, WorkspaceError> {
        Ok(self.base_path.join(relative(container)?))
    }

    fn file_path(&self, container: &str, path: &str) -> Result<PathBuf, WorkspaceError> {
        Ok(self.container_dir(container)?.join(relative(path)?))
    }
}

/// Reject anything that could resolve outside its parent directory.
fn relative(path: &str) -> Result<&Path, WorkspaceError> {
    let candidate = Path::new(path);
    let escapes = path.is_empty()
        || candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(WorkspaceError::io(format!("Invalid workspace path '{path}'")));
    }
    Ok(candidate)
}

#[async_trait]
impl WorkspaceEffects for FilesystemWorkspaceHandler {
    async fn put(
        &self,
        container: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<(), WorkspaceError> {
        let file_path = self.file_path(container, path)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                WorkspaceError::io(format!("Failed to create directory: {e}"))
            })?;
        }
        fs::write(&file_path, bytes)
            .await
            .map_err(|e| WorkspaceError::io(format!("Failed to write {path}: {e}")))
    }

    async fn get(&self, container: &str, path: &str) -> Result<Vec<u8>, WorkspaceError> {
        let file_path = self.file_path(container, path)?;
        match fs::read(&file_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(WorkspaceError::not_found(container, path))
            }
            Err(e) => Err(WorkspaceError::io(format!("Failed to read {path}: {e}"))),
        }
    }

    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, WorkspaceError> {
        let root = self.container_dir(container)?;
        let mut paths = Vec::new();
        let mut stack = vec![root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(WorkspaceError::io(format!(
                        "Failed to read directory: {e}"
                    )))
                }
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| WorkspaceError::io(format!("Failed to read directory entry: {e}")))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| WorkspaceError::io(format!("Failed to stat entry: {e}")))?;
                let entry_path = entry.path();
                if file_type.is_dir() {
                    stack.push(entry_path);
                    continue;
                }
                let Ok(rel) = entry_path.strip_prefix(&root) else {
                    continue;
                };
                // Workspace paths always use '/', whatever the platform.
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    paths.push(key);
                }
            }
        }

        paths.sort();
        Ok(paths)
    }

    async fn delete_container(&self, container: &str) -> Result<(), WorkspaceError> {
        let dir = self.container_dir(container)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WorkspaceError::io(format!(
                "Failed to delete container {container}: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_is_rejected() {
        assert!(relative("objects/UNIT_u1.json").is_ok());
        assert!(relative("../escape").is_err());
        assert!(relative("/etc/passwd").is_err());
        assert!(relative("").is_err());
    }
}
