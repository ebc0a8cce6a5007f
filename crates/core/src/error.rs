//! Error types for snapshot creation, deletion and configuration
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//! Every variant that originates from a native call preserves the raw status
//! code so it can be rendered by name.

use crate::status::HResult;
use crate::types::Step;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, VssError>;

/// Failures of the snapshot orchestrator
#[derive(Debug, Error)]
pub enum VssError {
    /// Caller lacks backup privileges
    #[error(
        "VSS error: {status} The caller does not have sufficient backup privileges or is not an administrator"
    )]
    AccessDenied {
        /// Native status returned by the session constructor
        status: HResult,
    },

    /// Process word size does not match the operating system
    #[error(
        "VSS error: executables compiled for {process_arch} can't use VSS on other architectures; use an executable compiled for your platform"
    )]
    ArchitectureMismatch {
        /// Architecture the process was compiled for
        process_arch: &'static str,
    },

    /// Operating system architecture could not be determined
    #[error("VSS error: failed to detect windows architecture: {0}")]
    ArchitectureDetection(String),

    /// Snapshots are not supported for the volume
    #[error("VSS error: snapshots are not supported for volume {volume}")]
    VolumeNotSupported {
        /// Volume root that was rejected
        volume: String,
    },

    /// A protocol step returned a failure status
    #[error("VSS error: {step} returned {status}")]
    Step {
        /// Step that failed
        step: Step,
        /// Native status code
        status: HResult,
    },

    /// An asynchronous step succeeded but handed back no operation to poll
    #[error("VSS error: {step} returned no asynchronous operation")]
    MissingAsyncHandle {
        /// Step that failed
        step: Step,
    },

    /// An asynchronous step reported that it was cancelled
    #[error("VSS error: {step} was cancelled")]
    AsyncCancelled {
        /// Step that was cancelled
        step: Step,
    },

    /// An asynchronous step did not finish within its budget
    #[error("VSS error: {step} timed out; waited for more than {} ms", .timeout.as_millis())]
    Timeout {
        /// Step that timed out
        step: Step,
        /// Budget that was exceeded
        timeout: Duration,
    },

    /// The native library could not be loaded
    #[error("VSS error: failed to load {library}: {reason}")]
    LibraryUnavailable {
        /// Library file name
        library: &'static str,
        /// Loader error description
        reason: String,
    },

    /// The native library lacks an expected entry point
    #[error("VSS error: entry point {symbol} not found in {library}")]
    EntryPointMissing {
        /// Library file name
        library: &'static str,
        /// Exported symbol that was looked up
        symbol: &'static str,
    },

    /// COM could not be initialised on the calling thread
    #[error("VSS error: COM initialization failed: {status}")]
    ComInitialization {
        /// Native status code
        status: HResult,
    },

    /// A native resource could not be released
    #[error("VSS error: failed to release {resource}: {reason}")]
    Release {
        /// Resource that leaked
        resource: &'static str,
        /// Why the release failed
        reason: String,
    },

    /// Snapshots are not available on this platform
    #[error("VSS snapshots are only supported on windows")]
    Unsupported,
}

impl VssError {
    /// Create a step failure
    pub fn step(step: Step, status: HResult) -> Self {
        VssError::Step { step, status }
    }

    /// Create a resource release failure
    pub fn release(resource: &'static str, reason: impl Into<String>) -> Self {
        VssError::Release {
            resource,
            reason: reason.into(),
        }
    }

    /// Native status code carried by this error, if any
    pub fn status(&self) -> Option<HResult> {
        match self {
            VssError::AccessDenied { status }
            | VssError::Step { status, .. }
            | VssError::ComInitialization { status } => Some(*status),
            _ => None,
        }
    }

    /// Step this error was raised in, if any
    pub fn failed_step(&self) -> Option<Step> {
        match self {
            VssError::Step { step, .. }
            | VssError::MissingAsyncHandle { step }
            | VssError::AsyncCancelled { step }
            | VssError::Timeout { step, .. } => Some(*step),
            VssError::AccessDenied { .. } => Some(Step::CreateSession),
            VssError::VolumeNotSupported { .. } => Some(Step::IsVolumeSupported),
            _ => None,
        }
    }

    /// True when the platform cannot provide snapshots at all
    pub fn is_unsupported(&self) -> bool {
        matches!(self, VssError::Unsupported)
    }
}

/// Result type alias for configuration loading
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Failures while reading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read or written
    #[error("failed to access config file '{path}': {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML or has wrong types
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be serialised
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid config value for '{field}': {reason}")]
    Invalid {
        /// Offending key
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}
