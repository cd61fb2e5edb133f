//! Audit and corrective pipelines.
//!
//! Both open a logbook operation named after the run, execute their stages
//! through the runner against a run-scoped workspace, finalize a report and
//! close the operation. The workspace container and every extracted export
//! are released when the run ends, whatever the outcome.

use crate::error::{AccessRequests, PipelineError, Result};
use crate::handler::{ActionHandler, HandlerIo, RunControl, StageReport};
use crate::report::{ExtendedInfo, ReportSummary, VitamResults, CORRECTIVE_AUDIT, EVIDENCE_AUDIT};
use crate::runner::run_stage;
use crate::stages::{
    report_name, AuditContext, CheckResourceAvailability, CorrectiveContext, DatabaseCheck,
    ExtractFromZip, Finalize, GenerateReports, PrepareAudit, PrepareCorrection, Rectification,
    ReportUnaudited,
};
use crate::workspace::{CONTEXT, CORRECTIONS_DIR, REPORTS_DIR, SUMMARY};
use archiva_core::{
    Collaborators, EvidenceConfig, EvidenceStatus, LogbookEvent, LogbookOperation, StatusCode,
};
use archiva_evidence::{CorrectionReportEntry, EvidenceAuditReportLine};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub const AUDIT_FINALIZE: &str = "EVIDENCE_AUDIT_FINALIZE";
pub const CORRECTIVE_FINALIZE: &str = "CORRECTIVE_AUDIT_FINALIZE";

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub status: EvidenceStatus,
    /// Name of the report in the REPORT category
    pub report_name: String,
    pub vitam_results: VitamResults,
    pub extended_info: ExtendedInfo,
    pub cancelled: bool,
    pub deferred: bool,
}

/// Outcome of a corrective run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Source offers stayed unavailable; nothing was modified. The stored
    /// report has no entries and is flagged deferred.
    Deferred {
        run_id: String,
        report_name: String,
        access_requests: AccessRequests,
    },
}

struct Run {
    io: HandlerIo,
    ev_type: &'static str,
}

impl Run {
    async fn open(
        collaborators: &Collaborators,
        config: &Arc<EvidenceConfig>,
        control: &RunControl,
        ev_type: &'static str,
        context: &Value,
    ) -> Result<Self> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = collaborators.clock.now().await;
        collaborators
            .logbook
            .create_operation(LogbookOperation::from_event(
                LogbookEvent::new(&run_id, ev_type, started_at, StatusCode::Started)
                    .with_detail(context.clone()),
            ))
            .await?;

        let io = HandlerIo::new(
            collaborators.clone(),
            Arc::clone(config),
            &run_id,
            control.fork(),
            started_at,
        );
        io.workspace.put_json(CONTEXT, context).await?;
        info!(run_id = %run_id, ev_type, "Run started");
        Ok(Self { io, ev_type })
    }

    async fn stage(&self, handler: impl ActionHandler + 'static) -> StageReport {
        run_stage(Arc::new(handler), &self.io).await
    }

    /// Read the summary Finalize left behind.
    async fn summary(&self, finalize: &StageReport) -> Result<RunSummary> {
        let summary: ReportSummary = self.io.workspace.get_json(SUMMARY).await.map_err(|_| {
            let reason = finalize
                .items
                .iter()
                .find_map(|item| item.message.clone())
                .unwrap_or_else(|| "report was not persisted".to_string());
            PipelineError::stage(finalize.stage, reason)
        })?;
        Ok(RunSummary {
            run_id: self.io.run_id().to_string(),
            status: summary.status(self.io.control.stage_status().await),
            report_name: report_name(self.io.run_id()),
            vitam_results: summary.vitam_results,
            extended_info: summary.extended_info,
            cancelled: summary.cancelled,
            deferred: summary.deferred,
        })
    }

    async fn finalize_corrections(&self) -> Result<RunSummary> {
        let finalize = self
            .stage(Finalize::<CorrectionReportEntry>::new(
                CORRECTIVE_AUDIT,
                CORRECTIONS_DIR,
                CORRECTIVE_FINALIZE,
            ))
            .await;
        self.summary(&finalize).await
    }

    /// Append the closing event and release run resources.
    async fn close(&self, outcome: StatusCode, message: String) -> Result<()> {
        self.io.exports.clear().await;
        if let Err(e) = self.io.workspace.cleanup().await {
            warn!(run_id = %self.io.run_id(), error = %e, "Could not delete run workspace");
        }
        let now = self.io.collaborators.clock.now().await;
        let event = LogbookEvent::new(Uuid::new_v4().to_string(), self.ev_type, now, outcome)
            .with_detail(json!({ "message": message }));
        self.io
            .collaborators
            .logbook
            .append_event(self.io.run_id(), event)
            .await?;
        info!(run_id = %self.io.run_id(), outcome = %outcome, "Run closed");
        Ok(())
    }

    async fn finish(&self, result: Result<RunSummary>) -> Result<RunSummary> {
        match result {
            Ok(summary) => {
                let mut message = format!("{} {}", self.ev_type, summary.status);
                if summary.deferred {
                    message.push_str(" (deferred)");
                }
                self.close(summary.status.into(), message).await?;
                Ok(summary)
            }
            Err(e) => {
                self.close(StatusCode::Fatal, e.to_string()).await?;
                Err(e)
            }
        }
    }
}

/// Audits the units matching a selection query and their object groups.
#[derive(Debug, Clone)]
pub struct AuditPipeline {
    collaborators: Collaborators,
    config: Arc<EvidenceConfig>,
    control: RunControl,
}

impl AuditPipeline {
    pub fn new(collaborators: Collaborators, config: Arc<EvidenceConfig>) -> Self {
        Self {
            collaborators,
            config,
            control: RunControl::new(),
        }
    }

    /// Stop scheduling new items in the current and later runs.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub async fn run(&self, query: Value) -> Result<RunSummary> {
        let context = serde_json::to_value(AuditContext { query })?;
        let run = Run::open(
            &self.collaborators,
            &self.config,
            &self.control,
            EVIDENCE_AUDIT,
            &context,
        )
        .await?;

        run.stage(PrepareAudit).await;
        run.stage(DatabaseCheck).await;
        run.stage(ExtractFromZip).await;
        run.stage(GenerateReports).await;
        run.io.exports.clear().await;
        run.stage(ReportUnaudited).await;
        let finalize = run
            .stage(Finalize::<EvidenceAuditReportLine>::new(
                EVIDENCE_AUDIT,
                REPORTS_DIR,
                AUDIT_FINALIZE,
            ))
            .await;

        let result = run.summary(&finalize).await;
        run.finish(result).await
    }
}

/// Repairs the correctable replica sets of a previous audit run.
#[derive(Debug, Clone)]
pub struct CorrectivePipeline {
    collaborators: Collaborators,
    config: Arc<EvidenceConfig>,
    control: RunControl,
}

impl CorrectivePipeline {
    pub fn new(collaborators: Collaborators, config: Arc<EvidenceConfig>) -> Self {
        Self {
            collaborators,
            config,
            control: RunControl::new(),
        }
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub async fn run(&self, audit_run_id: &str) -> Result<RunOutcome> {
        let context = serde_json::to_value(CorrectiveContext {
            audit_run_id: audit_run_id.to_string(),
        })?;
        let run = Run::open(
            &self.collaborators,
            &self.config,
            &self.control,
            CORRECTIVE_AUDIT,
            &context,
        )
        .await?;

        run.stage(PrepareCorrection).await;

        let max_attempts = self.config.availability_max_attempts.max(1);
        let delay = Duration::from_millis(self.config.availability_retry_delay_ms);
        let mut attempt = 1;
        let availability = loop {
            let report = run.stage(CheckResourceAvailability).await;
            if !report.needs_retry() {
                break report;
            }
            if attempt >= max_attempts {
                warn!(run_id = %run.io.run_id(), attempts = attempt, "Source offers still unavailable, run deferred");
                run.io.control.defer();
                let summary = run.finish(run.finalize_corrections().await).await?;
                return Ok(RunOutcome::Deferred {
                    run_id: summary.run_id,
                    report_name: summary.report_name,
                    access_requests: report.access_requests,
                });
            }
            attempt += 1;
            info!(run_id = %run.io.run_id(), attempt, "Waiting for source offers");
            tokio::time::sleep(delay).await;
        };

        if availability.status == EvidenceStatus::Fatal {
            warn!(run_id = %run.io.run_id(), "Availability check failed, no correction attempted");
        } else {
            run.stage(Rectification).await;
        }
        run.finish(run.finalize_corrections().await)
            .await
            .map(RunOutcome::Completed)
    }
}
