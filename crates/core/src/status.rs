//! Native status codes returned by the backup-coordination API
//!
//! Every native call reports an `HRESULT`. The orchestrator preserves the raw
//! code in its errors and renders it through a name table that is built once
//! on first use and never mutated afterwards.
//!
//! ## Rendering
//!
//! ```
//! use snapvol_core::HResult;
//!
//! let status = HResult::VSS_E_VOLUME_NOT_SUPPORTED;
//! assert_eq!(status.to_string(), "VSS_E_VOLUME_NOT_SUPPORTED (0x8004230c)");
//! assert_eq!(HResult::from_raw(0x8004_FFFF).name(), "UNKNOWN");
//! ```

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// A 32-bit native status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HResult(u32);

impl HResult {
    // =========================================================================
    // Generic COM codes
    // =========================================================================

    /// Operation succeeded
    pub const S_OK: HResult = HResult(0x0000_0000);
    /// Operation succeeded with a "false" outcome (e.g. COM already initialised)
    pub const S_FALSE: HResult = HResult(0x0000_0001);
    /// Interface not supported by the object
    pub const E_NOINTERFACE: HResult = HResult(0x8000_4002);
    /// Catastrophic failure
    pub const E_UNEXPECTED: HResult = HResult(0x8000_FFFF);
    /// COM was initialised on this thread with a different concurrency model
    pub const RPC_E_CHANGED_MODE: HResult = HResult(0x8001_0106);
    /// Caller lacks backup privileges or is not an administrator
    pub const E_ACCESSDENIED: HResult = HResult(0x8007_0005);
    /// Out of memory
    pub const E_OUTOFMEMORY: HResult = HResult(0x8007_000E);
    /// One or more arguments are invalid
    pub const E_INVALIDARG: HResult = HResult(0x8007_0057);

    // =========================================================================
    // Backup-coordination codes
    // =========================================================================

    /// A call was made in the wrong protocol state
    pub const VSS_E_BAD_STATE: HResult = HResult(0x8004_2301);
    /// Unexpected provider failure
    pub const VSS_E_UNEXPECTED: HResult = HResult(0x8004_2302);
    /// The requested provider is not registered
    pub const VSS_E_PROVIDER_NOT_REGISTERED: HResult = HResult(0x8004_2304);
    /// The provider vetoed the operation
    pub const VSS_E_PROVIDER_VETO: HResult = HResult(0x8004_2306);
    /// The requested object does not exist
    pub const VSS_E_OBJECT_NOT_FOUND: HResult = HResult(0x8004_2308);
    /// The volume cannot be snapshotted
    pub const VSS_E_VOLUME_NOT_SUPPORTED: HResult = HResult(0x8004_230C);
    /// The object already exists
    pub const VSS_E_OBJECT_ALREADY_EXISTS: HResult = HResult(0x8004_230D);
    /// No provider supports snapshots of the volume
    pub const VSS_E_VOLUME_NOT_SUPPORTED_BY_PROVIDER: HResult = HResult(0x8004_230E);
    /// Provider returned an unexpected error code
    pub const VSS_E_UNEXPECTED_PROVIDER_ERROR: HResult = HResult(0x8004_230F);
    /// An XML document is malformed
    pub const VSS_E_INVALID_XML_DOCUMENT: HResult = HResult(0x8004_2311);
    /// Too many volumes in the snapshot set
    pub const VSS_E_MAXIMUM_NUMBER_OF_VOLUMES_REACHED: HResult = HResult(0x8004_2312);
    /// Another snapshot set is being created
    pub const FSRVP_E_SHADOW_COPY_SET_IN_PROGRESS: HResult = HResult(0x8004_2316);
    /// The volume has reached its snapshot limit
    pub const VSS_E_MAXIMUM_NUMBER_OF_SNAPSHOTS_REACHED: HResult = HResult(0x8004_2317);
    /// Volume was not selected for the operation
    pub const VSS_E_UNSELECTED_VOLUME: HResult = HResult(0x8004_232A);
    /// The snapshot is not part of the set
    pub const VSS_E_SNAPSHOT_NOT_IN_SET: HResult = HResult(0x8004_232B);
    /// Nested volume limit reached
    pub const VSS_E_NESTED_VOLUME_LIMIT: HResult = HResult(0x8004_232C);
    /// Provider is a legacy provider
    pub const VSS_E_LEGACY_PROVIDER: HResult = HResult(0x8004_23F7);
    /// Disk id could not be reverted
    pub const VSS_E_CANNOT_REVERT_DISKID: HResult = HResult(0x8004_23FE);
    /// A resync operation is in progress
    pub const VSS_E_RESYNC_IN_PROGRESS: HResult = HResult(0x8004_23FF);

    // =========================================================================
    // Asynchronous operation states
    // =========================================================================

    /// Asynchronous operation still running
    pub const VSS_S_ASYNC_PENDING: HResult = HResult(0x0004_2309);
    /// Asynchronous operation completed
    pub const VSS_S_ASYNC_FINISHED: HResult = HResult(0x0004_230A);
    /// Asynchronous operation was cancelled
    pub const VSS_S_ASYNC_CANCELLED: HResult = HResult(0x0004_230B);

    /// Wrap a raw unsigned status code
    #[inline]
    pub const fn from_raw(code: u32) -> Self {
        HResult(code)
    }

    /// Wrap a signed status code as returned by most native signatures
    #[inline]
    pub const fn from_i32(code: i32) -> Self {
        HResult(code as u32)
    }

    /// The raw code
    #[inline]
    pub const fn code(self) -> u32 {
        self.0
    }

    /// True only for `S_OK`
    ///
    /// Protocol steps require an exact `S_OK`; other success codes are treated
    /// as failures of the step.
    #[inline]
    pub const fn is_ok(self) -> bool {
        self.0 == Self::S_OK.0
    }

    /// True when the severity bit is clear (`SUCCEEDED` in native terms)
    #[inline]
    pub const fn succeeded(self) -> bool {
        (self.0 as i32) >= 0
    }

    /// Human readable name, or `"UNKNOWN"`
    pub fn name(self) -> &'static str {
        STATUS_NAMES.get(&self).copied().unwrap_or("UNKNOWN")
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#010x})", self.name(), self.0)
    }
}

impl From<i32> for HResult {
    fn from(code: i32) -> Self {
        HResult::from_i32(code)
    }
}

static STATUS_NAMES: Lazy<HashMap<HResult, &'static str>> = Lazy::new(|| {
    [
        (HResult::S_OK, "S_OK"),
        (HResult::S_FALSE, "S_FALSE"),
        (HResult::E_NOINTERFACE, "E_NOINTERFACE"),
        (HResult::E_UNEXPECTED, "E_UNEXPECTED"),
        (HResult::RPC_E_CHANGED_MODE, "RPC_E_CHANGED_MODE"),
        (HResult::E_ACCESSDENIED, "E_ACCESSDENIED"),
        (HResult::E_OUTOFMEMORY, "E_OUTOFMEMORY"),
        (HResult::E_INVALIDARG, "E_INVALIDARG"),
        (HResult::VSS_E_BAD_STATE, "VSS_E_BAD_STATE"),
        (HResult::VSS_E_UNEXPECTED, "VSS_E_UNEXPECTED"),
        (HResult::VSS_E_PROVIDER_NOT_REGISTERED, "VSS_E_PROVIDER_NOT_REGISTERED"),
        (HResult::VSS_E_PROVIDER_VETO, "VSS_E_PROVIDER_VETO"),
        (HResult::VSS_E_OBJECT_NOT_FOUND, "VSS_E_OBJECT_NOT_FOUND"),
        (HResult::VSS_E_VOLUME_NOT_SUPPORTED, "VSS_E_VOLUME_NOT_SUPPORTED"),
        (HResult::VSS_E_OBJECT_ALREADY_EXISTS, "VSS_E_OBJECT_ALREADY_EXISTS"),
        (
            HResult::VSS_E_VOLUME_NOT_SUPPORTED_BY_PROVIDER,
            "VSS_E_VOLUME_NOT_SUPPORTED_BY_PROVIDER",
        ),
        (HResult::VSS_E_UNEXPECTED_PROVIDER_ERROR, "VSS_E_UNEXPECTED_PROVIDER_ERROR"),
        (HResult::VSS_E_INVALID_XML_DOCUMENT, "VSS_E_INVALID_XML_DOCUMENT"),
        (
            HResult::VSS_E_MAXIMUM_NUMBER_OF_VOLUMES_REACHED,
            "VSS_E_MAXIMUM_NUMBER_OF_VOLUMES_REACHED",
        ),
        (
            HResult::FSRVP_E_SHADOW_COPY_SET_IN_PROGRESS,
            "FSRVP_E_SHADOW_COPY_SET_IN_PROGRESS",
        ),
        (
            HResult::VSS_E_MAXIMUM_NUMBER_OF_SNAPSHOTS_REACHED,
            "VSS_E_MAXIMUM_NUMBER_OF_SNAPSHOTS_REACHED",
        ),
        (HResult::VSS_E_UNSELECTED_VOLUME, "VSS_E_UNSELECTED_VOLUME"),
        (HResult::VSS_E_SNAPSHOT_NOT_IN_SET, "VSS_E_SNAPSHOT_NOT_IN_SET"),
        (HResult::VSS_E_NESTED_VOLUME_LIMIT, "VSS_E_NESTED_VOLUME_LIMIT"),
        (HResult::VSS_E_LEGACY_PROVIDER, "VSS_E_LEGACY_PROVIDER"),
        (HResult::VSS_E_CANNOT_REVERT_DISKID, "VSS_E_CANNOT_REVERT_DISKID"),
        (HResult::VSS_E_RESYNC_IN_PROGRESS, "VSS_E_RESYNC_IN_PROGRESS"),
        (HResult::VSS_S_ASYNC_PENDING, "VSS_S_ASYNC_PENDING"),
        (HResult::VSS_S_ASYNC_FINISHED, "VSS_S_ASYNC_FINISHED"),
        (HResult::VSS_S_ASYNC_CANCELLED, "VSS_S_ASYNC_CANCELLED"),
    ]
    .into_iter()
    .collect()
});
