use super::DocumentTable;
use archiva_core::effects::{LookupError, MetadataEffects, UnitPage};
use archiva_core::types::fields;
use async_trait::async_trait;
use serde_json::Value;

/// Memory metadata store.
///
/// Unit selection queries are JSON objects matched by top-level field
/// equality; `{}` selects every unit.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataHandler {
    units: DocumentTable,
    object_groups: DocumentTable,
}

impl MemoryMetadataHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_unit(&self, document: Value) {
        let id = document_id(&document);
        self.units.insert(&id, document).await;
    }

    pub async fn insert_object_group(&self, document: Value) {
        let id = document_id(&document);
        self.object_groups.insert(&id, document).await;
    }

    pub async fn unit(&self, id: &str) -> Option<Value> {
        self.units.snapshot(id).await
    }

    pub async fn object_group(&self, id: &str) -> Option<Value> {
        self.object_groups.snapshot(id).await
    }

    pub async fn update_unit(&self, id: &str, change: impl FnOnce(&mut Value)) -> bool {
        self.units.update(id, change).await
    }

    pub async fn update_object_group(&self, id: &str, change: impl FnOnce(&mut Value)) -> bool {
        self.object_groups.update(id, change).await
    }

    /// Make every lookup of `id` (unit or object group) fail with `error`.
    pub async fn fail_lookup(&self, id: &str, error: LookupError) {
        self.units.fail(id, error.clone()).await;
        self.object_groups.fail(id, error).await;
    }
}

fn document_id(document: &Value) -> String {
    document
        .get(fields::ID)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn matches_query(query: &Value, document: &Value) -> bool {
    query.as_object().map_or(true, |criteria| {
        criteria
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    })
}

#[async_trait]
impl MetadataEffects for MemoryMetadataHandler {
    async fn get_raw_unit(&self, id: &str) -> Result<Value, LookupError> {
        self.units.get("Unit", id).await
    }

    async fn get_raw_object_group(&self, id: &str) -> Result<Value, LookupError> {
        self.object_groups.get("Object group", id).await
    }

    async fn select_units(
        &self,
        query: &Value,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<UnitPage, LookupError> {
        let (results, next_cursor) = self
            .units
            .page(|doc| matches_query(query, doc), cursor, limit)
            .await;
        Ok(UnitPage {
            results,
            next_cursor,
        })
    }
}
