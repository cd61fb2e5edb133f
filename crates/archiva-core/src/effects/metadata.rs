//! Raw metadata documents.

use super::LookupError;
use async_trait::async_trait;
use serde_json::Value;

/// One page of a scrolling unit selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitPage {
    /// Raw unit documents
    pub results: Vec<Value>,
    /// Cursor for the next page; `None` once the selection is exhausted
    pub next_cursor: Option<String>,
}

/// Metadata store access.
///
/// Raw documents are returned as stored, internal fields included
/// (`_storage`, `_og`, `_qualifiers`, computed fields).
#[async_trait]
pub trait MetadataEffects: Send + Sync {
    async fn get_raw_unit(&self, id: &str) -> Result<Value, LookupError>;

    async fn get_raw_object_group(&self, id: &str) -> Result<Value, LookupError>;

    /// Scroll the units matching `query`, `limit` at a time.
    async fn select_units(
        &self,
        query: &Value,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<UnitPage, LookupError>;
}
