//! Domain types shared across the workspace.
//!
//! - [`object`]: audited object identifiers, storage categories and raw
//!   document accessors
//! - [`traceability`]: the ground-truth record format of a secure export
//! - [`logbook`]: logbook operations, events and the traceability query

pub mod fields;
pub mod logbook;
pub mod object;
pub mod traceability;

pub use logbook::{
    format_logbook_date, parse_logbook_date, LogbookEvent, LogbookOperation, OperationQuery,
    TraceabilityDetail,
};
pub use object::{
    object_versions, strip_fields, ArchivalObjectRef, DataCategory, MetadataType, ObjectVersion,
    StoragePointer,
};
pub use traceability::{SubObjectHash, TraceabilitySecureRecord};
