#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//! # Archiva Testkit - Layer 8: Test Infrastructure
//!
//! In-memory handlers for every collaborator effect, with failure injection,
//! and [`ArchiveFixture`], which builds a consistent archive (metadata,
//! lifecycles, replicas, secure exports, traceability operations) that tests
//! then tamper with.
//!
//! **Layer Constraint**: test code only. Production handlers live in
//! `archiva-effects`.

pub mod fixtures;
pub mod handlers;
pub mod logging;

pub use fixtures::{
    build_export, root_hash, ArchiveFixture, DEFAULT_OFFERS, DEFAULT_STRATEGY, PERSISTED_IN_WINDOW,
    WINDOW_END, WINDOW_START,
};
pub use handlers::{
    FixedClock, MemoryLifecycleHandler, MemoryLogbookHandler, MemoryMetadataHandler,
    MemoryStorageHandler, MemoryWorkspaceHandler, RecordedAccessRequest, RecordedCopy,
};
pub use logging::init_test_tracing;
