//! Report aggregation.
//!
//! A report is newline-delimited JSON:
//!
//! 1. operation summary (run id, event type, outcome, message)
//! 2. report summary (dates, per-status counts, per-category counts)
//! 3. context (selection query or source audit run id)
//! 4. one entry per line
//!
//! Entries are audit report lines for the audit pipeline and correction
//! entries for the corrective pipeline.

use crate::error::PipelineError;
use archiva_core::{DataCategory, EvidenceStatus, MetadataType, StatusCode};
use archiva_evidence::{CorrectionReportEntry, EvidenceAuditReportLine};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const EVIDENCE_AUDIT: &str = "EVIDENCE_AUDIT";
pub const CORRECTIVE_AUDIT: &str = "CORRECTIVE_AUDIT";

/// First line of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub operation_id: String,
    pub ev_type: String,
    pub outcome: StatusCode,
    pub out_message: String,
}

/// Number of entries per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitamResults {
    #[serde(rename = "OK")]
    pub ok: usize,
    #[serde(rename = "WARNING")]
    pub warning: usize,
    #[serde(rename = "KO")]
    pub ko: usize,
    #[serde(rename = "FATAL")]
    pub fatal: usize,
}

impl VitamResults {
    pub fn record(&mut self, status: EvidenceStatus) {
        match status {
            EvidenceStatus::Ok => self.ok += 1,
            EvidenceStatus::Warn => self.warning += 1,
            EvidenceStatus::Ko => self.ko += 1,
            EvidenceStatus::Fatal => self.fatal += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.warning + self.ko + self.fatal
    }

    pub fn worst(&self) -> EvidenceStatus {
        if self.fatal > 0 {
            EvidenceStatus::Fatal
        } else if self.ko > 0 {
            EvidenceStatus::Ko
        } else if self.warning > 0 {
            EvidenceStatus::Warn
        } else {
            EvidenceStatus::Ok
        }
    }
}

/// Number of entries per object category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedInfo {
    pub nb_archive_units: usize,
    pub nb_object_groups: usize,
    pub nb_objects: usize,
}

/// How a run reached Finalize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunEnd {
    #[default]
    Completed,
    /// Stopped scheduling items on request
    Cancelled,
    /// Gave up waiting for cold source offers; nothing was corrected
    Deferred,
}

/// Second line of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub ev_start_date_time: DateTime<Utc>,
    pub ev_end_date_time: DateTime<Utc>,
    pub report_type: String,
    pub vitam_results: VitamResults,
    pub extended_info: ExtendedInfo,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub deferred: bool,
}

impl ReportSummary {
    /// Final status of the run: worst entry, or worse if a stage failed.
    /// A deferred run is at least WARNING.
    pub fn status(&self, stage_status: EvidenceStatus) -> EvidenceStatus {
        let status = self.vitam_results.worst().worst(stage_status);
        if self.deferred {
            status.worst(EvidenceStatus::Warn)
        } else {
            status
        }
    }
}

/// Entry of a report.
pub trait ReportEntry {
    fn status(&self) -> EvidenceStatus;

    /// Count the entry into the per-category counters.
    fn count(&self, info: &mut ExtendedInfo);
}

impl ReportEntry for EvidenceAuditReportLine {
    fn status(&self) -> EvidenceStatus {
        self.evidence_status
    }

    fn count(&self, info: &mut ExtendedInfo) {
        match self.object_type {
            MetadataType::Unit => info.nb_archive_units += 1,
            MetadataType::ObjectGroup => info.nb_object_groups += 1,
        }
        info.nb_objects += self.sub_object_reports.as_ref().map_or(0, Vec::len);
    }
}

impl ReportEntry for CorrectionReportEntry {
    fn status(&self) -> EvidenceStatus {
        self.status
    }

    fn count(&self, info: &mut ExtendedInfo) {
        match self.object_type {
            DataCategory::Unit => info.nb_archive_units += 1,
            DataCategory::ObjectGroup => info.nb_object_groups += 1,
            _ => info.nb_objects += 1,
        }
    }
}

/// Aggregated report of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report<E> {
    pub operation: OperationSummary,
    pub summary: ReportSummary,
    pub context: Value,
    pub entries: Vec<E>,
}

impl<E: ReportEntry> Report<E> {
    /// Aggregate `entries`. The outcome also accounts for `stage_status`.
    pub fn build(
        operation_id: &str,
        ev_type: &str,
        window: (DateTime<Utc>, DateTime<Utc>),
        context: Value,
        entries: Vec<E>,
        stage_status: EvidenceStatus,
        end: RunEnd,
    ) -> Self {
        let mut vitam_results = VitamResults::default();
        let mut extended_info = ExtendedInfo::default();
        for entry in &entries {
            vitam_results.record(entry.status());
            entry.count(&mut extended_info);
        }
        let summary = ReportSummary {
            ev_start_date_time: window.0,
            ev_end_date_time: window.1,
            report_type: ev_type.to_string(),
            vitam_results,
            extended_info,
            cancelled: end == RunEnd::Cancelled,
            deferred: end == RunEnd::Deferred,
        };
        let status = summary.status(stage_status);
        let mut out_message = format!(
            "{ev_type} {status}: {} OK, {} WARNING, {} KO, {} FATAL",
            vitam_results.ok, vitam_results.warning, vitam_results.ko, vitam_results.fatal
        );
        match end {
            RunEnd::Completed => {}
            RunEnd::Cancelled => out_message.push_str(" (cancelled)"),
            RunEnd::Deferred => out_message.push_str(" (deferred, source offers unavailable)"),
        }
        Self {
            operation: OperationSummary {
                operation_id: operation_id.to_string(),
                ev_type: ev_type.to_string(),
                outcome: status.into(),
                out_message,
            },
            summary,
            context,
            entries,
        }
    }
}

impl<E: Serialize> Report<E> {
    pub fn to_jsonl(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut out = Vec::new();
        write_line(&mut out, &self.operation)?;
        write_line(&mut out, &self.summary)?;
        write_line(&mut out, &self.context)?;
        for entry in &self.entries {
            write_line(&mut out, entry)?;
        }
        Ok(out)
    }
}

fn write_line<T: Serialize>(out: &mut Vec<u8>, value: &T) -> Result<(), serde_json::Error> {
    serde_json::to_writer(&mut *out, value)?;
    out.push(b'\n');
    Ok(())
}

impl<E: DeserializeOwned> Report<E> {
    /// Parse a report. Blank lines are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, PipelineError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| PipelineError::report(format!("not UTF-8: {e}")))?;
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let mut next = |what: &str| {
            lines
                .next()
                .ok_or_else(|| PipelineError::report(format!("missing {what} line")))
        };
        let operation = serde_json::from_str(next("operation summary")?)?;
        let summary = serde_json::from_str(next("report summary")?)?;
        let context = serde_json::from_str(next("context")?)?;
        let entries = lines
            .map(serde_json::from_str)
            .collect::<Result<Vec<E>, _>>()?;
        Ok(Self {
            operation,
            summary,
            context,
            entries,
        })
    }
}
