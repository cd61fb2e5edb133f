#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
//! # Archiva Evidence - Layer 2: Evidence Audit & Repair
//!
//! Verifies that the database state and every stored replica of an archival
//! object still match the digests a lifecycle traceability operation secured,
//! and repairs replica sets where a single offer diverges.
//!
//! ## Components
//!
//! - [`locator`]: streaming lookup of an object's record in a secure export
//! - [`export`]: download, digest check and extraction of secure exports
//! - [`version`]: lifecycle version consistency
//! - [`verifier`]: replica digests against secured digests
//! - [`auditor`]: the per-object audit, in database and comparison phases
//! - [`kind`]: unit and object group capabilities
//! - [`repair`]: replica set classification and offer-to-offer copies
//!
//! ## Verdicts
//!
//! Every check returns `Result<_, CheckFailure>`; the failure carries an
//! [`archiva_core::EvidenceStatus`] and a message that end up on the report
//! line. Only infrastructure failures outside a single object (an unreadable
//! export shared by many objects) surface as errors.

pub mod auditor;
pub mod export;
pub mod kind;
pub mod locator;
pub mod model;
pub mod repair;
pub mod verifier;
pub mod version;

pub use auditor::EvidenceAuditor;
pub use export::{ExportError, ExtractedExport};
pub use kind::{handle, ObjectKind};
pub use locator::{locate, SecureRecords};
pub use model::{
    AuditParameters, CheckFailure, CorrectionReportEntry, EvidenceAuditReportLine,
    EvidenceAuditReportObject, SecureExportRef, SubObjectParameters,
};
pub use repair::{classify, RepairDecision, RepairError, RepairExecutor, RepairTarget};
pub use verifier::compare_replicas;
pub use version::check_version;
