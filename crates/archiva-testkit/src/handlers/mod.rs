//! Memory handlers for collaborator effects.
//!
//! All handlers share state through `Arc<RwLock<..>>`, so clones observe the
//! same archive: a test keeps one clone to seed and inspect, the code under
//! test receives another through `Collaborators`.

mod clock;
mod lifecycle;
mod logbook;
mod metadata;
mod storage;
mod workspace;

pub use clock::FixedClock;
pub use lifecycle::MemoryLifecycleHandler;
pub use logbook::MemoryLogbookHandler;
pub use metadata::MemoryMetadataHandler;
pub use storage::{MemoryStorageHandler, RecordedAccessRequest, RecordedCopy};
pub use workspace::MemoryWorkspaceHandler;

use archiva_core::effects::LookupError;
use async_lock::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Documents keyed by id, with per-id failure injection.
#[derive(Debug, Clone, Default)]
pub(crate) struct DocumentTable {
    documents: Arc<RwLock<BTreeMap<String, Value>>>,
    failures: Arc<RwLock<HashMap<String, LookupError>>>,
}

impl DocumentTable {
    pub(crate) async fn insert(&self, id: &str, document: Value) {
        self.documents.write().await.insert(id.to_string(), document);
    }

    pub(crate) async fn snapshot(&self, id: &str) -> Option<Value> {
        self.documents.read().await.get(id).cloned()
    }

    pub(crate) async fn update(&self, id: &str, change: impl FnOnce(&mut Value)) -> bool {
        match self.documents.write().await.get_mut(id) {
            Some(document) => {
                change(document);
                true
            }
            None => false,
        }
    }

    pub(crate) async fn fail(&self, id: &str, error: LookupError) {
        self.failures.write().await.insert(id.to_string(), error);
    }

    pub(crate) async fn get(&self, kind: &str, id: &str) -> Result<Value, LookupError> {
        if let Some(error) = self.failures.read().await.get(id) {
            return Err(error.clone());
        }
        self.documents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| LookupError::not_found(format!("{kind} {id}")))
    }

    pub(crate) async fn page(
        &self,
        filter: impl Fn(&Value) -> bool,
        cursor: Option<String>,
        limit: usize,
    ) -> (Vec<Value>, Option<String>) {
        let documents = self.documents.read().await;
        let mut matching = documents
            .iter()
            .filter(|(id, _)| cursor.as_ref().map_or(true, |c| id.as_str() > c.as_str()))
            .filter(|(_, doc)| filter(*doc));
        let page: Vec<(&String, &Value)> = matching.by_ref().take(limit).collect();
        let next = if matching.next().is_some() {
            page.last().map(|(id, _)| (*id).clone())
        } else {
            None
        };
        (page.into_iter().map(|(_, doc)| doc.clone()).collect(), next)
    }
}
