//! Pipeline error types
//!
//! [`ProcessingError`] is what a stage handler returns for one item;
//! [`PipelineError`] is what aborts a whole run.

use archiva_core::effects::{LookupError, StorageError, WorkspaceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy and offer an access request was opened on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequestContext {
    pub strategy_id: String,
    pub offer_id: String,
}

impl AccessRequestContext {
    pub fn new(strategy_id: impl Into<String>, offer_id: impl Into<String>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            offer_id: offer_id.into(),
        }
    }
}

/// Access requests opened during a stage, per context.
pub type AccessRequests = BTreeMap<AccessRequestContext, Vec<String>>;

/// Failure of one stage item
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessingError {
    /// Technical failure; the item is reported FATAL
    #[error("Processing failed: {reason}")]
    Fatal { reason: String },

    /// Resources are being staged; the stage must run again later
    #[error("Resources not yet available, {} access request context(s) pending", .access_requests.len())]
    RetryLater { access_requests: AccessRequests },
}

impl ProcessingError {
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }
}

impl From<WorkspaceError> for ProcessingError {
    fn from(error: WorkspaceError) -> Self {
        Self::fatal(error.to_string())
    }
}

impl From<StorageError> for ProcessingError {
    fn from(error: StorageError) -> Self {
        Self::fatal(error.to_string())
    }
}

impl From<LookupError> for ProcessingError {
    fn from(error: LookupError) -> Self {
        Self::fatal(error.to_string())
    }
}

impl From<serde_json::Error> for ProcessingError {
    fn from(error: serde_json::Error) -> Self {
        Self::fatal(format!("Invalid staged document: {error}"))
    }
}

/// Failure that aborts a run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("Stage {stage} failed: {reason}")]
    Stage { stage: String, reason: String },

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Logbook(#[from] LookupError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid report: {reason}")]
    Report { reason: String },
}

impl PipelineError {
    pub fn stage(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    pub fn report(reason: impl Into<String>) -> Self {
        Self::Report {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        Self::report(error.to_string())
    }
}

/// Result type for pipeline runs
pub type Result<T> = std::result::Result<T, PipelineError>;
