//! Snapshot File System Scenarios
//!
//! End-to-end tests of `SnapshotFs` driving the real orchestrator against
//! scripted sessions:
//! - Reads redirected into the snapshot of the file's volume
//! - Fallback to live files when a volume cannot be snapshotted
//! - Snapshot teardown and session release
//! - Configuration flowing into the resolver and the orchestrator
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test --test snapshot_fs_scenarios
//! ```

#[path = "../common/mod.rs"]
mod common;

mod config;
mod fallback;
mod lifecycle;
mod redirect;
