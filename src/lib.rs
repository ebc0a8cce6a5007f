//! snapvol - read locked files through volume shadow copy snapshots
//!
//! snapvol wraps a file system so that every read is served from a
//! point-in-time snapshot of the volume the file lives on. Files held open
//! by other processes can then be copied like any other file.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::io::Read;
//! use snapvol::FileSystem;
//!
//! let fs = snapvol::local_vss();
//!
//! // First access to C: creates its snapshot
//! let mut data = Vec::new();
//! fs.open(r"C:\Users\me\NTUSER.DAT")?.read_to_end(&mut data)?;
//!
//! // Tear every snapshot down before exiting
//! fs.delete_snapshots();
//! ```
//!
//! # Architecture
//!
//! - `snapvol-core`: errors, status codes, messages and configuration
//! - `snapvol-vss`: the snapshot orchestrator and the native binding
//! - `snapvol-fs`: the `FileSystem` seam and the `SnapshotFs` resolver
//!
//! On platforms without shadow copies every creation fails with
//! `VssError::Unsupported`, so the resolver reads the live files.

use std::path::Path;
use std::sync::Arc;

pub use snapvol_core::*;
pub use snapvol_fs::{
    winpath, FileSystem, LocalFs, OpenOptions, PathSource, ResolvedPath, SnapshotFs,
};
pub use snapvol_vss::{
    default_orchestrator, DefaultSessionFactory, Snapshot, SnapshotProvider, VolumeSnapshot,
    VssOrchestrator, CREATION_SEQUENCE,
};

/// Local file system read through native snapshots
pub type LocalSnapshotFs = SnapshotFs<LocalFs, VssOrchestrator<DefaultSessionFactory>>;

/// Local file system with default settings, reporting through `tracing`
pub fn local_vss() -> LocalSnapshotFs {
    SnapshotFs::new(LocalFs::new(), default_orchestrator(), Arc::new(TracingSink))
}

/// Local file system configured by `config`, reporting to `sink`
pub fn local_vss_with_config(config: &SnapvolConfig, sink: Arc<dyn MessageSink>) -> LocalSnapshotFs {
    let orchestrator = VssOrchestrator::from_config(DefaultSessionFactory::default(), config);
    SnapshotFs::with_config(LocalFs::new(), orchestrator, sink, config)
}

/// Local file system configured from a `snapvol.toml` file
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed or validated.
pub fn local_vss_from_file(path: &Path, sink: Arc<dyn MessageSink>) -> ConfigResult<LocalSnapshotFs> {
    let config = SnapvolConfig::from_file(path)?;
    Ok(local_vss_with_config(&config, sink))
}
