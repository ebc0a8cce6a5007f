//! Volume snapshot orchestration for snapvol
//!
//! This crate turns the native backup-coordination API into a single
//! "snapshot this volume" operation with deterministic teardown:
//!
//! - Session seam: the narrow set of native calls the protocol needs
//! - Orchestrator: the fixed creation sequence with per-step timeouts
//! - Snapshot: the created copy, its device root and its delete sequence
//! - Native binding (windows only) and an unsupported-platform stand-in
//! - Testing: scripted fakes recording every call

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod orchestrator; // Creation protocol (VssOrchestrator)
pub mod provider; // SnapshotProvider / VolumeSnapshot seam used by the resolver
pub mod session; // BackupSession / AsyncOperation / SessionFactory traits
pub mod snapshot; // Snapshot handle and delete sequence
pub mod testing; // Scripted session fakes
pub mod wait; // Bounded polling of asynchronous steps

#[cfg(windows)]
mod native;
#[cfg(not(windows))]
mod unsupported;

pub use orchestrator::{VssOrchestrator, CREATION_SEQUENCE};
pub use provider::{SnapshotProvider, VolumeSnapshot};
pub use session::{
    AsyncOperation, AsyncStatus, BackupSession, BackupState, BackupType, NativeResult,
    ObjectType, SessionFactory, VssContext,
};
pub use snapshot::Snapshot;
pub use wait::{run_async_step, wait_for_completion};

#[cfg(windows)]
pub use native::{NativeAsync, NativeSession, NativeSessionFactory};
#[cfg(not(windows))]
pub use unsupported::{NoOperation, NoSession, UnsupportedPlatform};

/// Session factory for the platform being compiled for
#[cfg(windows)]
pub type DefaultSessionFactory = NativeSessionFactory;

/// Session factory for the platform being compiled for
#[cfg(not(windows))]
pub type DefaultSessionFactory = UnsupportedPlatform;

/// Orchestrator over the platform's native sessions
pub fn default_orchestrator() -> VssOrchestrator<DefaultSessionFactory> {
    VssOrchestrator::new(DefaultSessionFactory::default())
}
