//! Corrective pipeline stages.

use crate::error::{AccessRequestContext, AccessRequests, ProcessingError};
use crate::handler::{ActionHandler, HandlerIo, ItemStatus, WorkerParameters};
use crate::report::Report;
use crate::workspace::{object_path, path_segment, ALTER_DIR, CONTEXT, CORRECTIONS_DIR};
use archiva_core::{DataCategory, EvidenceStatus};
use archiva_evidence::{
    CorrectionReportEntry, EvidenceAuditReportLine, RepairExecutor, RepairTarget,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

pub const PREPARE: &str = "CORRECTIVE_AUDIT_PREPARE";
pub const CHECK_RESOURCE_AVAILABILITY: &str = "DATA_RECTIFICATION_CHECK_RESOURCE_AVAILABILITY";
pub const RECTIFICATION: &str = "DATA_RECTIFICATION_STEP";

const NO_REPAIR_TARGET: &str =
    "No secured hash or storage information for the object, it cannot be corrected";

/// Input of a corrective run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectiveContext {
    /// Audit run whose report is corrected
    pub audit_run_id: String,
}

/// Stages the KO lines of the source audit report under `alter/`.
#[derive(Debug, Default)]
pub struct PrepareCorrection;

#[async_trait]
impl ActionHandler for PrepareCorrection {
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
        let context: CorrectiveContext = io.workspace.get_json(CONTEXT).await?;
        let name = format!("{}.jsonl", context.audit_run_id);
        let mut stream = io
            .collaborators
            .storage
            .fetch_container(&io.config.default_strategy, DataCategory::Report, &name)
            .await?;
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| ProcessingError::fatal(format!("Could not read report {name}: {e}")))?;
        let report: Report<EvidenceAuditReportLine> = Report::parse(&bytes)
            .map_err(|e| ProcessingError::fatal(format!("Report {name}: {e}")))?;

        let total = report.entries.len();
        let mut selected = 0;
        for line in report
            .entries
            .iter()
            .filter(|line| line.evidence_status == EvidenceStatus::Ko)
        {
            io.workspace
                .put_json(&object_path(ALTER_DIR, &line.object_ref()), line)
                .await?;
            selected += 1;
        }
        info!(audit_run_id = %context.audit_run_id, selected, total, "KO lines staged for correction");
        Ok(ItemStatus::ok(&parameters.item)
            .with_message(format!("{selected} KO lines selected out of {total}")))
    }
}

/// Makes sure the source offer of every correctable replica set can be read
/// before copying, opening access requests on cold offers.
///
/// Runs as a single item over all staged lines so files can be checked in
/// batches per strategy, offer and category.
#[derive(Debug, Default)]
pub struct CheckResourceAvailability;

#[async_trait]
impl ActionHandler for CheckResourceAvailability {
    fn name(&self) -> &'static str {
        CHECK_RESOURCE_AVAILABILITY
    }

    async fn items(&self, _io: &HandlerIo) -> Result<Vec<String>, ProcessingError> {
        Ok(vec![CHECK_RESOURCE_AVAILABILITY.to_string()])
    }

    async fn execute(
        &self,
        parameters: &WorkerParameters,
        io: &HandlerIo,
    ) -> Result<ItemStatus, ProcessingError> {
        let lines: Vec<EvidenceAuditReportLine> = io.workspace.read_all(ALTER_DIR).await?;

        let mut groups: BTreeMap<(AccessRequestContext, DataCategory), Vec<String>> =
            BTreeMap::new();
        for target in lines.iter().flat_map(RepairTarget::from_report_line) {
            let decision = target.planned_decision();
            if !decision.correctable {
                continue;
            }
            if let Some(source) = decision.source_offer() {
                groups
                    .entry((
                        AccessRequestContext::new(&target.strategy_id, source),
                        target.category,
                    ))
                    .or_default()
                    .push(target.name());
            }
        }

        let storage = &io.collaborators.storage;
        let batch_size = io.config.availability_batch_size.max(1);
        let mut pending = AccessRequests::new();
        let mut checked = 0;
        for ((context, category), names) in &groups {
            for batch in names.chunks(batch_size) {
                checked += batch.len();
                let available = storage
                    .check_availability(&context.strategy_id, &context.offer_id, *category, batch)
                    .await?;
                if available {
                    continue;
                }
                if let Some(request) = storage
                    .create_access_request(&context.strategy_id, &context.offer_id, *category, batch)
                    .await?
                {
                    pending.entry(context.clone()).or_default().push(request);
                }
            }
        }

        if !pending.is_empty() {
            info!(contexts = pending.len(), "Source offers not yet available");
            return Err(ProcessingError::RetryLater {
                access_requests: pending,
            });
        }
        Ok(ItemStatus::ok(&parameters.item).with_message(format!("{checked} files available")))
    }
}

/// Repairs every replica set of one staged KO line.
#[derive(Debug, Default)]
pub struct Rectification;

#[async_trait]
impl ActionHandler for Rectification {
    fn name(&self) -> &'static str {
        RECTIFICATION
    }

    async fn items(&self, io: &HandlerIo) -> Result<Vec<String>, ProcessingError> {
        Ok(io.workspace.list(ALTER_DIR).await?)
    }

    async fn execute(
        &self,
        parameters: &WorkerParameters,
        io: &HandlerIo,
    ) -> Result<ItemStatus, ProcessingError> {
        let line: EvidenceAuditReportLine = io.workspace.get_json(&parameters.item).await?;
        let targets = RepairTarget::from_report_line(&line);
        let executor = RepairExecutor::new(Arc::clone(&io.collaborators.storage));

        let mut entries = Vec::with_capacity(targets.len().max(1));
        if targets.is_empty() {
            warn!(object = %line.object_ref(), "KO line without repair target");
            entries.push(CorrectionReportEntry {
                identifier: line.identifier.clone(),
                object_type: line.object_type.data_category(),
                status: EvidenceStatus::Ko,
                message: NO_REPAIR_TARGET.to_string(),
                source_offer: None,
                corrected_offer: None,
                secured_hash: None,
                offers_hashes: line.offers_hashes.clone(),
            });
        }
        for target in &targets {
            entries.push(executor.rectify(target).await);
        }

        for (index, entry) in entries.iter().enumerate() {
            let path = format!(
                "{CORRECTIONS_DIR}/{}_{}.{index}.json",
                line.object_type,
                path_segment(&line.identifier)
            );
            io.workspace.put_json(&path, entry).await?;
        }

        let status = EvidenceStatus::worst_of(entries.iter().map(|e| e.status));
        Ok(ItemStatus::new(&parameters.item, status)
            .with_message(format!("{} replica sets processed", entries.len())))
    }
}
