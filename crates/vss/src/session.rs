//! Narrow seam over the native backup-coordination session
//!
//! Only the calls the orchestrator actually makes are exposed. The native
//! binding implements these traits over the vtable of the session object;
//! tests implement them with scripted fakes.
//!
//! Ownership: dropping a `BackupSession` or an `AsyncOperation` releases the
//! underlying native object exactly once.

use snapvol_core::{HResult, Result, SnapshotProperties};
use std::time::Duration;
use uuid::Uuid;

/// Result of a single native call: the raw status on failure
pub type NativeResult<T> = std::result::Result<T, HResult>;

// =============================================================================
// Native enumerations
// =============================================================================

/// Snapshot context passed to `SetContext`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum VssContext {
    /// Non-persistent, writer-involving backup snapshot
    Backup = 0x0000_0000,
    /// Non-persistent snapshot without writer involvement
    FileShareBackup = 0x0000_0010,
    /// Persistent snapshot without writers, for NAS rollback
    NasRollback = 0x0000_0019,
    /// Persistent snapshot with writers, for application rollback
    AppRollback = 0x0000_0009,
    /// Client-accessible persistent snapshot
    ClientAccessible = 0x0000_001D,
    /// Client-accessible persistent snapshot with writers
    ClientAccessibleWriters = 0x0000_000D,
    /// All snapshot types
    All = -1,
}

/// Backup type passed to `SetBackupState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BackupType {
    /// Not specified
    Undefined = 0,
    /// Full backup that resets the incremental baseline
    Full = 1,
    /// Incremental backup
    Incremental = 2,
    /// Differential backup
    Differential = 3,
    /// Log backup
    Log = 4,
    /// Copy that leaves the incremental baseline untouched
    Copy = 5,
    /// Any other type
    Other = 6,
}

/// Object type passed to `DeleteSnapshots`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ObjectType {
    /// Unknown
    Unknown = 0,
    /// No object
    None = 1,
    /// A whole snapshot set
    SnapshotSet = 2,
    /// A single snapshot
    Snapshot = 3,
    /// A provider
    Provider = 4,
}

/// Options declared by `SetBackupState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupState {
    /// Component-level selection
    pub select_components: bool,
    /// Back up the bootable system state
    pub backup_bootable_system_state: bool,
    /// Backup type
    pub backup_type: BackupType,
    /// Partial file support
    pub partial_file_support: bool,
}

impl BackupState {
    /// Plain copy backup: no components, no system state, no partial files.
    pub const COPY: BackupState = BackupState {
        select_components: false,
        backup_bootable_system_state: false,
        backup_type: BackupType::Copy,
        partial_file_support: false,
    };
}

/// State reported by an asynchronous operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncStatus {
    /// Still running
    Pending,
    /// Completed successfully
    Finished,
    /// Cancelled before completion
    Cancelled,
    /// Completed with a failure status
    Failed(HResult),
    /// Any other success code; treated as still running
    Other(HResult),
}

impl AsyncStatus {
    /// Classify the status word returned by `QueryStatus`
    pub fn from_status(status: HResult) -> Self {
        match status {
            HResult::VSS_S_ASYNC_PENDING => AsyncStatus::Pending,
            HResult::VSS_S_ASYNC_FINISHED => AsyncStatus::Finished,
            HResult::VSS_S_ASYNC_CANCELLED => AsyncStatus::Cancelled,
            other if !other.succeeded() => AsyncStatus::Failed(other),
            other => AsyncStatus::Other(other),
        }
    }
}

// =============================================================================
// Seam traits
// =============================================================================

/// A pending native operation that has to be polled to completion
pub trait AsyncOperation {
    /// Block for at most `interval` waiting for completion
    fn wait(&mut self, interval: Duration) -> NativeResult<()>;

    /// Current state of the operation
    fn query_status(&mut self) -> NativeResult<AsyncStatus>;
}

/// One native backup-coordination session
///
/// Asynchronous calls return `Ok(None)` when the native call succeeded but
/// handed back no operation object.
pub trait BackupSession: Send {
    /// Operation type returned by the asynchronous calls
    type Operation: AsyncOperation;

    /// `InitializeForBackup`
    fn initialize_for_backup(&mut self) -> NativeResult<()>;

    /// `SetContext`
    fn set_context(&mut self, context: VssContext) -> NativeResult<()>;

    /// `SetBackupState`
    fn set_backup_state(&mut self, state: BackupState) -> NativeResult<()>;

    /// `GatherWriterMetadata`
    fn gather_writer_metadata(&mut self) -> NativeResult<Option<Self::Operation>>;

    /// `IsVolumeSupported` for the default provider
    fn is_volume_supported(&mut self, volume: &str) -> NativeResult<bool>;

    /// `StartSnapshotSet`, returning the set id
    fn start_snapshot_set(&mut self) -> NativeResult<Uuid>;

    /// `AddToSnapshotSet`, returning the id of the snapshot within the set
    fn add_to_snapshot_set(&mut self, volume: &str) -> NativeResult<Uuid>;

    /// `PrepareForBackup`
    fn prepare_for_backup(&mut self) -> NativeResult<Option<Self::Operation>>;

    /// `DoSnapshotSet`
    fn do_snapshot_set(&mut self) -> NativeResult<Option<Self::Operation>>;

    /// `GetSnapshotProperties`
    ///
    /// The session keeps the native record alive until
    /// `free_snapshot_properties` is called.
    fn snapshot_properties(&mut self, snapshot_id: Uuid) -> NativeResult<SnapshotProperties>;

    /// `VssFreeSnapshotProperties` for the record retained by
    /// `snapshot_properties`; a no-op when nothing is retained.
    fn free_snapshot_properties(&mut self) -> Result<()>;

    /// `BackupComplete`
    fn backup_complete(&mut self) -> NativeResult<Option<Self::Operation>>;

    /// `AbortBackup`
    fn abort_backup(&mut self) -> NativeResult<()>;

    /// `DeleteSnapshots` for one snapshot (forced), returning how many were deleted
    fn delete_snapshot(&mut self, snapshot_id: Uuid) -> NativeResult<u32>;
}

/// Creates sessions and vouches for the platform they run on
pub trait SessionFactory: Send + Sync {
    /// Session type produced by this factory
    type Session: BackupSession;

    /// Fail fast when the process cannot use the native API at all
    fn platform_check(&self) -> Result<()>;

    /// Instantiate a fresh session
    fn create_session(&self) -> Result<Self::Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_status_classification() {
        assert_eq!(
            AsyncStatus::from_status(HResult::VSS_S_ASYNC_FINISHED),
            AsyncStatus::Finished
        );
        assert_eq!(
            AsyncStatus::from_status(HResult::VSS_S_ASYNC_PENDING),
            AsyncStatus::Pending
        );
        assert_eq!(
            AsyncStatus::from_status(HResult::VSS_S_ASYNC_CANCELLED),
            AsyncStatus::Cancelled
        );
        assert_eq!(
            AsyncStatus::from_status(HResult::VSS_E_PROVIDER_VETO),
            AsyncStatus::Failed(HResult::VSS_E_PROVIDER_VETO)
        );
        assert_eq!(
            AsyncStatus::from_status(HResult::S_OK),
            AsyncStatus::Other(HResult::S_OK)
        );
    }

    #[test]
    fn test_copy_backup_state() {
        let state = BackupState::COPY;
        assert_eq!(state.backup_type, BackupType::Copy);
        assert!(!state.select_components);
        assert!(!state.backup_bootable_system_state);
        assert!(!state.partial_file_support);
        assert_eq!(BackupType::Copy as i32, 5);
        assert_eq!(VssContext::Backup as i32, 0);
        assert_eq!(ObjectType::Snapshot as i32, 3);
    }
}
