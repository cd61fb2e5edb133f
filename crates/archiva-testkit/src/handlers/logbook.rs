use archiva_core::effects::{LogbookEffects, LookupError};
use archiva_core::{LogbookEvent, LogbookOperation, OperationQuery};
use async_lock::RwLock;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Memory logbook.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogbookHandler {
    operations: Arc<RwLock<Vec<LogbookOperation>>>,
    unavailable: Arc<RwLock<bool>>,
    failing_reads: Arc<RwLock<HashMap<String, LookupError>>>,
}

impl MemoryLogbookHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, operation: LogbookOperation) {
        self.operations.write().await.push(operation);
    }

    pub async fn operation(&self, id: &str) -> Option<LogbookOperation> {
        self.operations
            .read()
            .await
            .iter()
            .find(|op| op.event_id == id)
            .cloned()
    }

    pub async fn operations_of_type(&self, event_type: &str) -> Vec<LogbookOperation> {
        self.operations
            .read()
            .await
            .iter()
            .filter(|op| op.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Make every call fail as if the logbook were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Make by-id reads of operation `id` fail with `error`.
    pub async fn fail_operation_lookup(&self, id: &str, error: LookupError) {
        self.failing_reads.write().await.insert(id.to_string(), error);
    }

    async fn check_available(&self) -> Result<(), LookupError> {
        if *self.unavailable.read().await {
            return Err(LookupError::unavailable("logbook is unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl LogbookEffects for MemoryLogbookHandler {
    async fn select_operations(
        &self,
        query: &OperationQuery,
    ) -> Result<Vec<LogbookOperation>, LookupError> {
        self.check_available().await?;
        let mut selected: Vec<LogbookOperation> = self
            .operations
            .read()
            .await
            .iter()
            .filter(|op| query.matches(op))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.event_date_time.cmp(&a.event_date_time));
        selected.truncate(query.limit);
        Ok(selected)
    }

    async fn select_operation_by_id(&self, id: &str) -> Result<LogbookOperation, LookupError> {
        self.check_available().await?;
        if let Some(error) = self.failing_reads.read().await.get(id) {
            return Err(error.clone());
        }
        self.operation(id)
            .await
            .ok_or_else(|| LookupError::not_found(format!("Logbook operation {id}")))
    }

    async fn create_operation(&self, operation: LogbookOperation) -> Result<(), LookupError> {
        self.check_available().await?;
        self.insert(operation).await;
        Ok(())
    }

    async fn append_event(
        &self,
        operation_id: &str,
        event: LogbookEvent,
    ) -> Result<(), LookupError> {
        self.check_available().await?;
        let mut operations = self.operations.write().await;
        let operation = operations
            .iter_mut()
            .find(|op| op.event_id == operation_id)
            .ok_or_else(|| LookupError::not_found(format!("Logbook operation {operation_id}")))?;
        operation.outcome = event.outcome;
        operation.outcome_detail = event.outcome_detail.clone();
        operation.events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archiva_core::{MetadataType, StatusCode};
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn traceability(id: &str, at: i64) -> LogbookOperation {
        let event = LogbookEvent::new(
            id,
            "LOGBOOK_UNIT_LFC_TRACEABILITY",
            DateTime::<Utc>::from_timestamp(at, 0).unwrap(),
            StatusCode::Ok,
        )
        .with_detail(json!({"FileName": format!("{id}.zip"), "DigestAlgorithm": "SHA-512", "Hash": "h"}));
        LogbookOperation::from_event(event)
    }

    #[tokio::test]
    async fn selection_is_most_recent_first() {
        let logbook = MemoryLogbookHandler::new();
        logbook.insert(traceability("old", 1_000)).await;
        logbook.insert(traceability("new", 2_000)).await;
        let query = OperationQuery::lfc_traceability(MetadataType::Unit);
        let selected = logbook.select_operations(&query).await.unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].event_id, "new");
    }

    #[tokio::test]
    async fn appended_events_update_the_outcome() {
        let logbook = MemoryLogbookHandler::new();
        logbook.insert(traceability("op", 1_000)).await;
        let event = LogbookEvent::new(
            "e1",
            "LOGBOOK_UNIT_LFC_TRACEABILITY",
            DateTime::<Utc>::from_timestamp(1_100, 0).unwrap(),
            StatusCode::Ko,
        );
        logbook.append_event("op", event).await.unwrap();
        let operation = logbook.operation("op").await.unwrap();
        assert_eq!(operation.outcome, StatusCode::Ko);
        assert_eq!(operation.events.len(), 1);
    }
}
