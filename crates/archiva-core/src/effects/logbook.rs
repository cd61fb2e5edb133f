//! Logbook operations.

use super::LookupError;
use crate::types::{LogbookEvent, LogbookOperation, OperationQuery};
use async_trait::async_trait;

/// Logbook access.
#[async_trait]
pub trait LogbookEffects: Send + Sync {
    /// Operations matching `query`, most recent first, at most `query.limit`.
    async fn select_operations(
        &self,
        query: &OperationQuery,
    ) -> Result<Vec<LogbookOperation>, LookupError>;

    async fn select_operation_by_id(&self, id: &str) -> Result<LogbookOperation, LookupError>;

    async fn create_operation(&self, operation: LogbookOperation) -> Result<(), LookupError>;

    async fn append_event(&self, operation_id: &str, event: LogbookEvent)
        -> Result<(), LookupError>;
}
