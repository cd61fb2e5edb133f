//! Layer 1: Collaborator Effect Trait Definitions
//!
//! Pure trait definitions for every external system the evidence audit
//! touches. This module defines **what** can be asked of a collaborator;
//! handlers in `archiva-effects` (production) and `archiva-testkit` (memory)
//! define **how**.
//!
//! # Effect Classification
//!
//! ## Archive Effects
//! Read access to the archive's own records:
//! - **Metadata**: raw unit and object group documents, unit selection
//! - **Lifecycle**: raw lifecycle documents
//! - **Logbook**: traceability operation lookup and journaling
//!
//! ## Infrastructure Effects
//! - **Storage**: replica digests, offer-to-offer copies, containers,
//!   availability of cold offers
//! - **Workspace**: run-scoped staging area
//! - **Clock**: wall-clock timestamps
//!
//! Handlers are injected through [`Collaborators`]; no code in this workspace
//! reaches for a process-wide client.

pub mod clock;
pub mod lifecycle;
pub mod logbook;
pub mod metadata;
pub mod storage;
pub mod workspace;

pub use clock::ClockEffects;
pub use lifecycle::LifecycleEffects;
pub use logbook::LogbookEffects;
pub use metadata::{MetadataEffects, UnitPage};
pub use storage::{ByteStream, StorageEffects, StorageError};
pub use workspace::{WorkspaceEffects, WorkspaceError};

use crate::status::EvidenceStatus;
use std::sync::Arc;

/// Failure of a metadata, lifecycle or logbook lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("Not found: {what}")]
    NotFound { what: String },
    #[error("Collaborator unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("Malformed response: {reason}")]
    Malformed { reason: String },
}

impl LookupError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Verdict an audit reports when this lookup fails.
    ///
    /// An absent document is a business finding; everything else is a
    /// technical failure.
    pub fn evidence_status(&self) -> EvidenceStatus {
        match self {
            Self::NotFound { .. } => EvidenceStatus::Ko,
            Self::Unavailable { .. } | Self::Malformed { .. } => EvidenceStatus::Fatal,
        }
    }
}

/// Handles on every collaborator, shared by the tasks of one run.
#[derive(Clone)]
pub struct Collaborators {
    pub metadata: Arc<dyn MetadataEffects>,
    pub lifecycle: Arc<dyn LifecycleEffects>,
    pub logbook: Arc<dyn LogbookEffects>,
    pub storage: Arc<dyn StorageEffects>,
    pub workspace: Arc<dyn WorkspaceEffects>,
    pub clock: Arc<dyn ClockEffects>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_documents_are_business_findings() {
        assert_eq!(LookupError::not_found("u1").evidence_status(), EvidenceStatus::Ko);
        assert_eq!(
            LookupError::unavailable("timeout").evidence_status(),
            EvidenceStatus::Fatal
        );
        assert_eq!(
            LookupError::malformed("bad json").evidence_status(),
            EvidenceStatus::Fatal
        );
    }
}
