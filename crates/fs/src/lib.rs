//! Snapshot-backed file access for snapvol
//!
//! This crate provides the read-side file system surface and the resolver
//! that redirects it into volume snapshots:
//!
//! - FileSystem: open/stat/lstat plus pure path utilities; `LocalFs` over `std::fs`
//! - winpath: Windows path rules on plain strings, identical on every host
//! - SnapshotFs: per-volume snapshot cache and path rewriting
//! - testing: in-memory file system and counting snapshot provider

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod filesystem; // FileSystem trait, OpenOptions, LocalFs
pub mod resolver; // SnapshotFs, ResolvedPath, PathSource
pub mod testing; // MemoryFs, FakeProvider
pub mod winpath; // Windows path utilities

pub use filesystem::{FileSystem, LocalFs, OpenOptions};
pub use resolver::{PathSource, ResolvedPath, SnapshotFs};
