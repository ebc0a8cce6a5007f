//! Core types for snapvol
//!
//! This crate defines the foundational types shared by the snapshot
//! orchestrator and the snapshot-backed file system:
//! - HResult: native status codes with a name table built once
//! - VolumeId: normalised drive identifier (snapshot cache key)
//! - Step: named steps of the native backup protocol
//! - SnapshotProperties: decoded properties of a created snapshot
//! - Error: VssError and ConfigError hierarchies
//! - MessageSink: error/info/verbose reporting channels
//! - SnapvolConfig: `snapvol.toml` settings

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod sink;
pub mod status;
pub mod types;

pub use config::{
    SnapvolConfig, CONFIG_FILE_NAME, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SNAPSHOT_TIMEOUT_SECS,
};
pub use error::{ConfigError, ConfigResult, Result, VssError};
pub use sink::{CollectingSink, MessageLevel, MessageSink, NullSink, TracingSink};
pub use status::HResult;
pub use types::{filetime_to_datetime, SnapshotProperties, Step, VolumeId};
