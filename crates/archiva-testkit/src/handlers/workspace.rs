use archiva_core::effects::{WorkspaceEffects, WorkspaceError};
use async_lock::RwLock;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Memory staging area.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkspaceHandler {
    containers: Arc<RwLock<BTreeMap<String, BTreeMap<String, Vec<u8>>>>>,
    failing_prefixes: Arc<RwLock<Vec<String>>>,
}

impl MemoryWorkspaceHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn container_exists(&self, container: &str) -> bool {
        self.containers.read().await.contains_key(container)
    }

    /// Make every write to a path starting with `prefix` fail.
    pub async fn fail_writes_to(&self, prefix: &str) {
        self.failing_prefixes.write().await.push(prefix.to_string());
    }
}

#[async_trait]
impl WorkspaceEffects for MemoryWorkspaceHandler {
    async fn put(
        &self,
        container: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<(), WorkspaceError> {
        if self
            .failing_prefixes
            .read()
            .await
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return Err(WorkspaceError::io(format!("disk full writing {path}")));
        }
        self.containers
            .write()
            .await
            .entry(container.to_string())
            .or_default()
            .insert(path.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, container: &str, path: &str) -> Result<Vec<u8>, WorkspaceError> {
        self.containers
            .read()
            .await
            .get(container)
            .and_then(|files| files.get(path))
            .cloned()
            .ok_or_else(|| WorkspaceError::not_found(container, path))
    }

    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, WorkspaceError> {
        Ok(self
            .containers
            .read()
            .await
            .get(container)
            .map(|files| {
                files
                    .keys()
                    .filter(|path| path.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_container(&self, container: &str) -> Result<(), WorkspaceError> {
        self.containers.write().await.remove(container);
        Ok(())
    }
}
