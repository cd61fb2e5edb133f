use super::DocumentTable;
use archiva_core::effects::{LifecycleEffects, LookupError};
use async_trait::async_trait;
use serde_json::Value;

/// Memory lifecycle store, keyed by object id.
#[derive(Debug, Clone, Default)]
pub struct MemoryLifecycleHandler {
    units: DocumentTable,
    object_groups: DocumentTable,
}

impl MemoryLifecycleHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_unit_lifecycle(&self, id: &str, document: Value) {
        self.units.insert(id, document).await;
    }

    pub async fn insert_object_group_lifecycle(&self, id: &str, document: Value) {
        self.object_groups.insert(id, document).await;
    }

    pub async fn unit_lifecycle(&self, id: &str) -> Option<Value> {
        self.units.snapshot(id).await
    }

    pub async fn object_group_lifecycle(&self, id: &str) -> Option<Value> {
        self.object_groups.snapshot(id).await
    }

    pub async fn update_unit_lifecycle(&self, id: &str, change: impl FnOnce(&mut Value)) -> bool {
        self.units.update(id, change).await
    }

    pub async fn update_object_group_lifecycle(
        &self,
        id: &str,
        change: impl FnOnce(&mut Value),
    ) -> bool {
        self.object_groups.update(id, change).await
    }

    pub async fn fail_lookup(&self, id: &str, error: LookupError) {
        self.units.fail(id, error.clone()).await;
        self.object_groups.fail(id, error).await;
    }
}

#[async_trait]
impl LifecycleEffects for MemoryLifecycleHandler {
    async fn get_raw_unit_lifecycle(&self, id: &str) -> Result<Value, LookupError> {
        self.units.get("Unit lifecycle", id).await
    }

    async fn get_raw_object_group_lifecycle(&self, id: &str) -> Result<Value, LookupError> {
        self.object_groups.get("Object group lifecycle", id).await
    }
}
