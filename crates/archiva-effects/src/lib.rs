#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
//! # Archiva Effects - Layer 3: Production Handlers
//!
//! Stateless production implementations of the infrastructure effect traits
//! from `archiva-core`:
//!
//! - [`FilesystemWorkspaceHandler`]: run workspaces as directories on disk
//! - [`SystemClock`]: host wall clock
//!
//! Plus [`logging::init_tracing`] for binaries embedding the engine.
//!
//! Memory handlers for tests live in `archiva-testkit`. Metadata, lifecycle,
//! logbook and storage handlers belong to the deployment that embeds the
//! engine.

pub mod clock;
pub mod logging;
pub mod workspace;

pub use clock::SystemClock;
pub use logging::init_tracing;
pub use workspace::FilesystemWorkspaceHandler;
