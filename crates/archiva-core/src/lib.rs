#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
//! # Archiva Core - Layer 1: Shared Vocabulary
//!
//! Everything the evidence audit engine and its pipelines agree on:
//! - Identifiers for audited objects and storage categories
//! - The evidence status lattice (OK < WARN < KO < FATAL)
//! - The ground-truth record format of a traceability secure export
//! - Effect traits for every external collaborator (metadata, lifecycle,
//!   logbook, storage, staging workspace, clock)
//! - The canonical digest computer
//! - Runtime configuration
//!
//! ## Design Principles
//!
//! - **Effects, not clients**: collaborators are async traits injected through
//!   [`effects::Collaborators`]; no process-wide client state.
//! - **Explicit verdicts**: business outcomes travel as [`EvidenceStatus`]
//!   values, technical failures as `thiserror` enums.

pub mod config;
pub mod digest;
pub mod effects;
pub mod status;
pub mod types;

pub use config::{ConfigError, EvidenceConfig};
pub use digest::{canonical_bytes, digest, DigestAlgorithm, UnknownAlgorithm};
pub use effects::{Collaborators, LookupError};
pub use status::{EvidenceStatus, StatusCode};
pub use types::{
    ArchivalObjectRef, DataCategory, LogbookEvent, LogbookOperation, MetadataType,
    OperationQuery, StoragePointer, SubObjectHash, TraceabilityDetail,
    TraceabilitySecureRecord,
};
