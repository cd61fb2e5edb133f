//! Audit pipeline stages.

use crate::error::ProcessingError;
use crate::handler::{ActionHandler, HandlerIo, ItemStatus, WorkerParameters};
use crate::workspace::{
    object_path, path_segment, rebase, CONTEXT, DATA_DIR, EXPORTS_DIR, OBJECTS_DIR, REPORTS_DIR,
};
use archiva_core::types::fields;
use archiva_core::{ArchivalObjectRef, EvidenceStatus};
use archiva_evidence::{
    handle, AuditParameters, CheckFailure, EvidenceAuditReportLine, EvidenceAuditor,
    ExtractedExport, SecureExportRef,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const PREPARE: &str = "EVIDENCE_AUDIT_LIST_OBJECT";
pub const DATABASE_CHECK: &str = "EVIDENCE_AUDIT_CHECK_DATABASE";
pub const EXTRACT_FROM_ZIP: &str = "EVIDENCE_AUDIT_EXTRACT_ZIP_FILE";
pub const GENERATE_REPORTS: &str = "EVIDENCE_AUDIT_PREPARE_GENERATE_REPORTS";
pub const REPORT_UNAUDITED: &str = "EVIDENCE_AUDIT_REPORT_UNAUDITED";

/// Input of an audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditContext {
    /// Unit selection query
    pub query: Value,
}

fn auditor(io: &HandlerIo) -> EvidenceAuditor {
    EvidenceAuditor::new(io.collaborators.clone(), Arc::clone(&io.config))
}

/// Selects the units matching the run's query and their object groups.
#[derive(Debug, Default)]
pub struct PrepareAudit;

#[async_trait]
impl ActionHandler for PrepareAudit {
    fn name(&self) -> &'static str {
        PREPARE
    }

    async fn items(&self, _io: &HandlerIo) -> Result<Vec<String>, ProcessingError> {
        Ok(vec![PREPARE.to_string()])
    }

    async fn execute(
        &self,
        parameters: &WorkerParameters,
        io: &HandlerIo,
    ) -> Result<ItemStatus, ProcessingError> {
        let context: AuditContext = io.workspace.get_json(CONTEXT).await?;
        let metadata = &io.collaborators.metadata;

        let mut selected = BTreeSet::new();
        let mut cursor = None;
        loop {
            let page = metadata
                .select_units(&context.query, cursor.take(), io.config.scroll_batch_size)
                .await?;
            for unit in &page.results {
                let id = unit
                    .get(fields::ID)
                    .and_then(Value::as_str)
                    .ok_or_else(|| ProcessingError::fatal("Selected unit has no identifier"))?;
                selected.insert(ArchivalObjectRef::unit(id));
                if let Some(og) = unit.get(fields::OBJECT_GROUP).and_then(Value::as_str) {
                    selected.insert(ArchivalObjectRef::object_group(og));
                }
            }
            match page.next_cursor {
                Some(next) if !page.results.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        for object in &selected {
            io.workspace
                .put_json(&object_path(OBJECTS_DIR, object), object)
                .await?;
        }
        info!(run_id = %parameters.run_id, objects = selected.len(), "Objects selected for audit");
        Ok(ItemStatus::ok(&parameters.item)
            .with_message(format!("{} objects selected", selected.len())))
    }
}

/// Database phase of the audit for one object.
///
/// Objects that pass go to `data/`, with their secure export noted under
/// `exports/`; the others are reported right away.
#[derive(Debug, Default)]
pub struct DatabaseCheck;

#[async_trait]
impl ActionHandler for DatabaseCheck {
    fn name(&self) -> &'static str {
        DATABASE_CHECK
    }

    async fn items(&self, io: &HandlerIo) -> Result<Vec<String>, ProcessingError> {
        Ok(io.workspace.list(OBJECTS_DIR).await?)
    }

    async fn execute(
        &self,
        parameters: &WorkerParameters,
        io: &HandlerIo,
    ) -> Result<ItemStatus, ProcessingError> {
        let object: ArchivalObjectRef = io.workspace.get_json(&parameters.item).await?;
        let audit = auditor(io).check_database(&object).await;

        if audit.is_ok() {
            if let Some(export) = &audit.secure_export {
                io.workspace
                    .put_json(
                        &format!("{EXPORTS_DIR}/{}", path_segment(&export.file_name)),
                        export,
                    )
                    .await?;
            }
            io.workspace
                .put_json(&rebase(&parameters.item, DATA_DIR), &audit)
                .await?;
        } else {
            let line = handle(object.object_type).report_line(&audit);
            io.workspace
                .put_json(&rebase(&parameters.item, REPORTS_DIR), &line)
                .await?;
        }

        let status = ItemStatus::new(&parameters.item, audit.evidence_status);
        Ok(match audit.audit_message {
            Some(message) => status.with_message(message),
            None => status,
        })
    }
}

/// Downloads and extracts each secure export referenced by the run, once.
#[derive(Debug, Default)]
pub struct ExtractFromZip;

#[async_trait]
impl ActionHandler for ExtractFromZip {
    fn name(&self) -> &'static str {
        EXTRACT_FROM_ZIP
    }

    async fn items(&self, io: &HandlerIo) -> Result<Vec<String>, ProcessingError> {
        Ok(io.workspace.list(EXPORTS_DIR).await?)
    }

    async fn execute(
        &self,
        parameters: &WorkerParameters,
        io: &HandlerIo,
    ) -> Result<ItemStatus, ProcessingError> {
        let export: SecureExportRef = io.workspace.get_json(&parameters.item).await?;
        match ExtractedExport::download(io.collaborators.storage.as_ref(), &io.config, &export)
            .await
        {
            Ok(extracted) => {
                debug!(file = %export.file_name, "Secure export registered for the run");
                io.exports.insert(extracted).await;
                Ok(ItemStatus::ok(&parameters.item))
            }
            Err(e) => {
                error!(file = %export.file_name, error = %e, "Secure export unusable");
                Ok(ItemStatus::new(&parameters.item, EvidenceStatus::Fatal)
                    .with_message(e.to_string()))
            }
        }
    }
}

/// Comparison phase for every object that passed the database check.
#[derive(Debug, Default)]
pub struct GenerateReports;

impl GenerateReports {
    async fn verify(
        io: &HandlerIo,
        audit: &mut AuditParameters,
    ) -> Result<EvidenceAuditReportLine, CheckFailure> {
        let file_name = audit
            .secure_export
            .as_ref()
            .map(|export| export.file_name.clone())
            .ok_or_else(|| CheckFailure::fatal("No secure export recorded for object"))?;
        let export = io.exports.get(&file_name).await.ok_or_else(|| {
            CheckFailure::fatal(format!("Secure export {file_name} could not be extracted"))
        })?;
        let record = export.locate(audit.object_type, &audit.id).await?;
        Ok(auditor(io).verify_against_record(audit, &record))
    }
}

#[async_trait]
impl ActionHandler for GenerateReports {
    fn name(&self) -> &'static str {
        GENERATE_REPORTS
    }

    async fn items(&self, io: &HandlerIo) -> Result<Vec<String>, ProcessingError> {
        Ok(io.workspace.list(DATA_DIR).await?)
    }

    async fn execute(
        &self,
        parameters: &WorkerParameters,
        io: &HandlerIo,
    ) -> Result<ItemStatus, ProcessingError> {
        let mut audit: AuditParameters = io.workspace.get_json(&parameters.item).await?;
        let line = match Self::verify(io, &mut audit).await {
            Ok(line) => line,
            Err(failure) => {
                audit.fail(failure);
                handle(audit.object_type).report_line(&audit)
            }
        };
        io.workspace
            .put_json(&rebase(&parameters.item, REPORTS_DIR), &line)
            .await?;

        let status = ItemStatus::new(&parameters.item, line.evidence_status);
        Ok(match &line.message {
            Some(message) => status.with_message(message.clone()),
            None => status,
        })
    }
}

/// Writes a FATAL line for every selected object that ended up with no
/// report line because one of its items failed.
///
/// Objects never scheduled in a cancelled run stay out of the report.
#[derive(Debug, Default)]
pub struct ReportUnaudited;

impl ReportUnaudited {
    /// Reason of the first FATAL item staged for the object at `path`.
    async fn failure_of(io: &HandlerIo, path: &str) -> Option<String> {
        let file = rebase(path, OBJECTS_DIR);
        io.control.stages().await.into_iter().find_map(|stage| {
            stage.items.into_iter().find_map(|item| {
                (item.status == EvidenceStatus::Fatal && rebase(&item.item, OBJECTS_DIR) == file)
                    .then(|| item.message.unwrap_or_else(|| stage.stage.to_string()))
            })
        })
    }
}

#[async_trait]
impl ActionHandler for ReportUnaudited {
    fn name(&self) -> &'static str {
        REPORT_UNAUDITED
    }

    async fn items(&self, io: &HandlerIo) -> Result<Vec<String>, ProcessingError> {
        let reported: BTreeSet<String> = io
            .workspace
            .list(REPORTS_DIR)
            .await?
            .iter()
            .map(|path| rebase(path, OBJECTS_DIR))
            .collect();
        Ok(io
            .workspace
            .list(OBJECTS_DIR)
            .await?
            .into_iter()
            .filter(|path| !reported.contains(path))
            .collect())
    }

    async fn execute(
        &self,
        parameters: &WorkerParameters,
        io: &HandlerIo,
    ) -> Result<ItemStatus, ProcessingError> {
        let reason = match Self::failure_of(io, &parameters.item).await {
            Some(reason) => reason,
            None if io.control.is_cancelled() => {
                return Ok(ItemStatus::ok(&parameters.item).with_message("Not scheduled"));
            }
            None => "no report line was produced".to_string(),
        };
        let object: ArchivalObjectRef = io.workspace.get_json(&parameters.item).await?;
        warn!(run_id = %parameters.run_id, object = %object, reason = %reason, "Object could not be audited");

        let mut audit = AuditParameters::new(&object);
        audit.fail(CheckFailure::fatal(format!("Object could not be audited: {reason}")));
        let line = handle(object.object_type).report_line(&audit);
        io.workspace
            .put_json(&rebase(&parameters.item, REPORTS_DIR), &line)
            .await?;
        Ok(ItemStatus::new(&parameters.item, EvidenceStatus::Fatal).with_message(reason))
    }

    fn runs_when_cancelled(&self) -> bool {
        true
    }
}
