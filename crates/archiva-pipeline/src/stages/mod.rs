//! Pipeline stages.
//!
//! - [`audit`]: Prepare, DatabaseCheck, ExtractFromZip, GenerateReports,
//!   ReportUnaudited
//! - [`corrective`]: Prepare, CheckResourceAvailability, Rectification
//! - [`finalize`]: report aggregation for both pipelines

pub mod audit;
pub mod corrective;
pub mod finalize;

pub use audit::{
    AuditContext, DatabaseCheck, ExtractFromZip, GenerateReports, PrepareAudit, ReportUnaudited,
};
pub use corrective::{
    CheckResourceAvailability, CorrectiveContext, PrepareCorrection, Rectification,
};
pub use finalize::{report_name, Finalize};
