//! Run-scoped staging area.
//!
//! Layout of a run container:
//!
//! ```text
//! context.json          selection query or source audit run id
//! objects/<TYPE>_<id>   descriptors produced by the audit Prepare stage
//! data/<TYPE>_<id>      parameters of objects that passed DatabaseCheck
//! exports/<file>        secure exports referenced by data/
//! reports/<TYPE>_<id>   one audit report line per object
//! alter/<TYPE>_<id>     KO lines selected for correction
//! corrections/<...>     one correction entry per repaired replica set
//! summary.json          report summary written by Finalize
//! ```

use archiva_core::effects::{WorkspaceEffects, WorkspaceError};
use archiva_core::ArchivalObjectRef;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub const CONTEXT: &str = "context.json";
pub const SUMMARY: &str = "summary.json";
pub const OBJECTS_DIR: &str = "objects";
pub const DATA_DIR: &str = "data";
pub const EXPORTS_DIR: &str = "exports";
pub const REPORTS_DIR: &str = "reports";
pub const ALTER_DIR: &str = "alter";
pub const CORRECTIONS_DIR: &str = "corrections";

/// Escape `name` into one path segment. Bytes outside `[A-Za-z0-9._-]` become
/// `%XX`, so distinct names never collide and never nest.
pub fn path_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Path of an object's file inside `dir`.
pub fn object_path(dir: &str, object: &ArchivalObjectRef) -> String {
    format!("{dir}/{}_{}.json", object.object_type, path_segment(&object.id))
}

/// Same object file moved to another directory.
pub fn rebase(path: &str, dir: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    format!("{dir}/{file}")
}

/// Staging files of one run.
#[derive(Clone)]
pub struct RunWorkspace {
    effects: Arc<dyn WorkspaceEffects>,
    run_id: String,
}

impl RunWorkspace {
    pub fn new(effects: Arc<dyn WorkspaceEffects>, run_id: impl Into<String>) -> Self {
        Self {
            effects,
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub async fn put_json<T: Serialize + Sync>(
        &self,
        path: &str,
        value: &T,
    ) -> Result<(), WorkspaceError> {
        let bytes = serde_json::to_vec(value).map_err(|e| WorkspaceError::io(e.to_string()))?;
        self.effects.put(&self.run_id, path, bytes).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, WorkspaceError> {
        let bytes = self.effects.get(&self.run_id, path).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| WorkspaceError::io(format!("Invalid JSON in {path}: {e}")))
    }

    /// Files under `dir`, sorted.
    pub async fn list(&self, dir: &str) -> Result<Vec<String>, WorkspaceError> {
        self.effects.list(&self.run_id, &format!("{dir}/")).await
    }

    /// Every file under `dir`, deserialized.
    pub async fn read_all<T: DeserializeOwned>(&self, dir: &str) -> Result<Vec<T>, WorkspaceError> {
        let mut values = Vec::new();
        for path in self.list(dir).await? {
            values.push(self.get_json(&path).await?);
        }
        Ok(values)
    }

    /// Remove the whole run container.
    pub async fn cleanup(&self) -> Result<(), WorkspaceError> {
        self.effects.delete_container(&self.run_id).await
    }
}

impl std::fmt::Debug for RunWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunWorkspace")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}
