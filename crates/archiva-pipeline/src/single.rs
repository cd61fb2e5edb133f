//! Single-object evidence audit, journaled in its own logbook operation.
//!
//! The operation opens with `EVIDENCEAUDIT` (STARTED), records the database
//! phase (`EVIDENCEAUDIT_DATABASE`) and, when that phase passed, the
//! comparison with the secured record (`EVIDENCEAUDIT_STORAGE`), then closes
//! with the final `EVIDENCEAUDIT` outcome.

use crate::error::Result;
use archiva_core::{
    ArchivalObjectRef, Collaborators, EvidenceConfig, EvidenceStatus, LogbookEvent,
    LogbookOperation, StatusCode,
};
use archiva_evidence::{handle, EvidenceAuditReportLine, EvidenceAuditor};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const EVIDENCE_AUDIT_EVENT: &str = "EVIDENCEAUDIT";
pub const DATABASE_EVENT: &str = "EVIDENCEAUDIT_DATABASE";
pub const STORAGE_EVENT: &str = "EVIDENCEAUDIT_STORAGE";

/// Audits one object on demand.
#[derive(Debug, Clone)]
pub struct EvidenceAuditService {
    collaborators: Collaborators,
    auditor: EvidenceAuditor,
}

impl EvidenceAuditService {
    pub fn new(collaborators: Collaborators, config: Arc<EvidenceConfig>) -> Self {
        let auditor = EvidenceAuditor::new(collaborators.clone(), config);
        Self {
            collaborators,
            auditor,
        }
    }

    /// Audit `object` and return its report line with the operation id.
    pub async fn launch(
        &self,
        object: &ArchivalObjectRef,
    ) -> Result<(String, EvidenceAuditReportLine)> {
        let operation_id = Uuid::new_v4().to_string();
        let started = self.collaborators.clock.now().await;
        self.collaborators
            .logbook
            .create_operation(LogbookOperation::from_event(
                LogbookEvent::new(
                    &operation_id,
                    EVIDENCE_AUDIT_EVENT,
                    started,
                    StatusCode::Started,
                )
                .with_detail(json!({ "objectId": object.id, "objectType": object.object_type })),
            ))
            .await?;

        let mut parameters = self.auditor.check_database(object).await;
        self.journal(
            &operation_id,
            DATABASE_EVENT,
            parameters.evidence_status,
            json!({
                "hashMdFromDatabase": parameters.hash_md_from_database,
                "hashLfcFromDatabase": parameters.hash_lfc_from_database,
                "offersHashes": parameters.offer_digests,
                "message": parameters.audit_message,
            }),
        )
        .await?;

        let line = if parameters.is_ok() {
            let line = self.auditor.verify_with_export(&mut parameters).await;
            self.journal(
                &operation_id,
                STORAGE_EVENT,
                line.evidence_status,
                json!({
                    "securedHash": line.secured_hash,
                    "offersHashes": line.offers_hashes,
                    "message": line.message,
                }),
            )
            .await?;
            line
        } else {
            handle(object.object_type).report_line(&parameters)
        };

        self.journal(
            &operation_id,
            EVIDENCE_AUDIT_EVENT,
            line.evidence_status,
            serde_json::to_value(&line)?,
        )
        .await?;
        info!(object = %object, status = %line.evidence_status, operation_id = %operation_id, "Evidence audit done");
        Ok((operation_id, line))
    }

    async fn journal(
        &self,
        operation_id: &str,
        event_type: &str,
        status: EvidenceStatus,
        detail: Value,
    ) -> Result<()> {
        let now = self.collaborators.clock.now().await;
        let event = LogbookEvent::new(Uuid::new_v4().to_string(), event_type, now, status.into())
            .with_detail(detail);
        self.collaborators
            .logbook
            .append_event(operation_id, event)
            .await?;
        Ok(())
    }
}
