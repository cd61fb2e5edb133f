#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
//! # Archiva Pipeline - Layer 4: Batch Orchestration
//!
//! Sequences the evidence auditor and the repair executor over batches of
//! objects:
//!
//! - [`AuditPipeline`]: Prepare, DatabaseCheck, ExtractFromZip,
//!   GenerateReports, Finalize
//! - [`CorrectivePipeline`]: Prepare, CheckResourceAvailability,
//!   Rectification, Finalize
//! - [`EvidenceAuditService`]: one object, journaled in the logbook
//!
//! Every stage implements [`ActionHandler`]; the [`runner`] runs one task per
//! item on a bounded pool. Items never share mutable state: each writes its
//! own file in the run workspace, and Finalize merges them into a single
//! NDJSON report.

pub mod error;
pub mod handler;
pub mod pipelines;
pub mod report;
pub mod runner;
pub mod single;
pub mod stages;
pub mod workspace;

pub use error::{AccessRequestContext, AccessRequests, PipelineError, ProcessingError, Result};
pub use handler::{
    ActionHandler, ExportRegistry, HandlerIo, ItemStatus, RunControl, StageReport,
    WorkerParameters,
};
pub use pipelines::{AuditPipeline, CorrectivePipeline, RunOutcome, RunSummary};
pub use report::{
    ExtendedInfo, OperationSummary, Report, ReportEntry, ReportSummary, RunEnd,
    VitamResults, CORRECTIVE_AUDIT, EVIDENCE_AUDIT,
};
pub use runner::run_stage;
pub use single::EvidenceAuditService;
pub use workspace::RunWorkspace;
