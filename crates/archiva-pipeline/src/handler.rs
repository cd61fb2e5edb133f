//! Stage handler contract and the I/O handle every item receives.

use crate::error::{AccessRequests, ProcessingError};
use crate::report::RunEnd;
use crate::workspace::RunWorkspace;
use archiva_core::{Collaborators, EvidenceConfig, EvidenceStatus};
use archiva_evidence::ExtractedExport;
use async_lock::RwLock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Identifies one task of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerParameters {
    pub run_id: String,
    pub stage: &'static str,
    /// Staging path (or fixed label) of the item
    pub item: String,
}

/// Outcome of one stage item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatus {
    pub item: String,
    pub status: EvidenceStatus,
    pub message: Option<String>,
}

impl ItemStatus {
    pub fn new(item: impl Into<String>, status: EvidenceStatus) -> Self {
        Self {
            item: item.into(),
            status,
            message: None,
        }
    }

    pub fn ok(item: impl Into<String>) -> Self {
        Self::new(item, EvidenceStatus::Ok)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// One pipeline stage.
///
/// The runner asks for the stage's items, then calls [`ActionHandler::execute`]
/// once per item on the worker pool.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Stage name used in logs and stage reports.
    fn name(&self) -> &'static str;

    /// Items to process.
    async fn items(&self, io: &HandlerIo) -> Result<Vec<String>, ProcessingError>;

    async fn execute(
        &self,
        parameters: &WorkerParameters,
        io: &HandlerIo,
    ) -> Result<ItemStatus, ProcessingError>;

    /// Whether the stage still runs after the run was cancelled.
    fn runs_when_cancelled(&self) -> bool {
        false
    }
}

/// Secure exports extracted for the current run, keyed by file name.
///
/// Written once per export by ExtractFromZip, then only read. Dropping the
/// last reference deletes the extracted files.
#[derive(Debug, Clone, Default)]
pub struct ExportRegistry {
    exports: Arc<RwLock<HashMap<String, Arc<ExtractedExport>>>>,
}

impl ExportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, export: ExtractedExport) {
        self.exports
            .write()
            .await
            .insert(export.file_name().to_string(), Arc::new(export));
    }

    pub async fn get(&self, file_name: &str) -> Option<Arc<ExtractedExport>> {
        self.exports.read().await.get(file_name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.exports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.exports.read().await.is_empty()
    }

    /// Release every export held by the run.
    pub async fn clear(&self) {
        self.exports.write().await.clear();
    }
}

/// Summary of one finished stage, kept for Finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub status: EvidenceStatus,
    pub items: Vec<ItemStatus>,
    /// Items not scheduled because the run was cancelled
    pub skipped: usize,
    pub access_requests: AccessRequests,
}

impl StageReport {
    pub fn needs_retry(&self) -> bool {
        !self.access_requests.is_empty()
    }
}

/// Cooperative cancellation and stage history of a run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
    deferred: Arc<AtomicBool>,
    stages: Arc<RwLock<Vec<StageReport>>>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh stage history sharing this control's cancellation flag.
    pub fn fork(&self) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deferred: Arc::default(),
            stages: Arc::default(),
        }
    }

    /// Stop scheduling new items. In-flight items finish.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark the run as deferred: the remaining work waits for a later run.
    pub fn defer(&self) {
        self.deferred.store(true, Ordering::SeqCst);
    }

    pub fn run_end(&self) -> RunEnd {
        if self.deferred.load(Ordering::SeqCst) {
            RunEnd::Deferred
        } else if self.is_cancelled() {
            RunEnd::Cancelled
        } else {
            RunEnd::Completed
        }
    }

    pub async fn record(&self, report: StageReport) {
        self.stages.write().await.push(report);
    }

    pub async fn stages(&self) -> Vec<StageReport> {
        self.stages.read().await.clone()
    }

    /// Worst status over the stages run so far.
    pub async fn stage_status(&self) -> EvidenceStatus {
        EvidenceStatus::worst_of(self.stages.read().await.iter().map(|s| s.status))
    }
}

/// Everything a stage item may touch.
#[derive(Debug, Clone)]
pub struct HandlerIo {
    pub collaborators: Collaborators,
    pub config: Arc<EvidenceConfig>,
    pub workspace: RunWorkspace,
    pub exports: ExportRegistry,
    pub control: RunControl,
    pub started_at: DateTime<Utc>,
}

impl HandlerIo {
    pub fn new(
        collaborators: Collaborators,
        config: Arc<EvidenceConfig>,
        run_id: &str,
        control: RunControl,
        started_at: DateTime<Utc>,
    ) -> Self {
        let workspace = RunWorkspace::new(Arc::clone(&collaborators.workspace), run_id);
        Self {
            collaborators,
            config,
            workspace,
            exports: ExportRegistry::new(),
            control,
            started_at,
        }
    }

    pub fn run_id(&self) -> &str {
        self.workspace.run_id()
    }
}
