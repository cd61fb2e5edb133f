//! Raw lifecycle documents.

use super::LookupError;
use async_trait::async_trait;
use serde_json::Value;

/// Lifecycle store access.
///
/// Documents expose the version counter `_v` and `_lastPersistedDate`.
#[async_trait]
pub trait LifecycleEffects: Send + Sync {
    async fn get_raw_unit_lifecycle(&self, id: &str) -> Result<Value, LookupError>;

    async fn get_raw_object_group_lifecycle(&self, id: &str) -> Result<Value, LookupError>;
}
