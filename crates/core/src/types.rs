//! Core value types shared by the orchestrator and the resolver
//!
//! - `VolumeId`: normalised drive identifier used as the snapshot cache key
//! - `Step`: named steps of the snapshot creation and deletion protocol
//! - `SnapshotProperties`: decoded properties of a created snapshot

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// VolumeId
// =============================================================================

/// Normalised volume identifier: an upper-case drive letter followed by a colon
///
/// Two paths on the same drive always produce equal identifiers regardless of
/// the case of the drive letter.
///
/// ```
/// use snapvol_core::VolumeId;
///
/// let volume = VolumeId::parse(r"c:\data\file.txt").unwrap();
/// assert_eq!(volume.as_str(), "C:");
/// assert_eq!(volume.root(), r"C:\");
/// assert!(VolumeId::parse(r"\\server\share\file").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeId(String);

impl VolumeId {
    /// Extract the drive identifier from the start of `path`
    ///
    /// Returns `None` when the path does not begin with `<letter>:`.
    pub fn parse(path: &str) -> Option<Self> {
        let mut chars = path.chars();
        let letter = chars.next()?;
        if !letter.is_ascii_alphabetic() || chars.next()? != ':' {
            return None;
        }
        Some(VolumeId(format!("{}:", letter.to_ascii_uppercase())))
    }

    /// The identifier, e.g. `"C:"`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Volume root path as accepted by the native API, e.g. `"C:\"`
    pub fn root(&self) -> String {
        format!("{}\\", self.0)
    }

    /// Length of the identifier in bytes (always 2)
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VolumeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Protocol steps
// =============================================================================

/// Named steps of the native backup-coordination protocol
///
/// Errors carry the step they failed in so a message always says where the
/// protocol stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Instantiate the backup-coordination session
    CreateSession,
    /// Initialise the session for a backup
    InitializeForBackup,
    /// Select the backup context
    SetContext,
    /// Declare backup type and options
    SetBackupState,
    /// Collect writer metadata (asynchronous)
    GatherWriterMetadata,
    /// Check that the volume can be snapshotted
    IsVolumeSupported,
    /// Open a new snapshot set
    StartSnapshotSet,
    /// Add the target volume to the set
    AddToSnapshotSet,
    /// Notify writers of the upcoming backup (asynchronous)
    PrepareForBackup,
    /// Create the point-in-time copy (asynchronous)
    DoSnapshotSet,
    /// Read the snapshot's properties
    GetSnapshotProperties,
    /// Release the properties record
    FreeSnapshotProperties,
    /// Signal that the backup finished (asynchronous)
    BackupComplete,
    /// Delete the snapshot
    DeleteSnapshots,
    /// Abort a partially completed backup
    AbortBackup,
}

impl Step {
    /// Name of the native call this step maps to
    pub fn name(self) -> &'static str {
        match self {
            Step::CreateSession => "CreateVssBackupComponents",
            Step::InitializeForBackup => "InitializeForBackup",
            Step::SetContext => "SetContext",
            Step::SetBackupState => "SetBackupState",
            Step::GatherWriterMetadata => "GatherWriterMetadata",
            Step::IsVolumeSupported => "IsVolumeSupported",
            Step::StartSnapshotSet => "StartSnapshotSet",
            Step::AddToSnapshotSet => "AddToSnapshotSet",
            Step::PrepareForBackup => "PrepareForBackup",
            Step::DoSnapshotSet => "DoSnapshotSet",
            Step::GetSnapshotProperties => "GetSnapshotProperties",
            Step::FreeSnapshotProperties => "VssFreeSnapshotProperties",
            Step::BackupComplete => "BackupComplete",
            Step::DeleteSnapshots => "DeleteSnapshots",
            Step::AbortBackup => "AbortBackup",
        }
    }

    /// True for steps that hand back an asynchronous operation to poll
    pub fn is_async(self) -> bool {
        matches!(
            self,
            Step::GatherWriterMetadata
                | Step::PrepareForBackup
                | Step::DoSnapshotSet
                | Step::BackupComplete
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}()", self.name())
    }
}

// =============================================================================
// Snapshot properties
// =============================================================================

/// Decoded properties of a created snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotProperties {
    /// Identifier of the snapshot
    pub snapshot_id: Uuid,
    /// Identifier of the set the snapshot belongs to
    pub snapshot_set_id: Uuid,
    /// Number of snapshots in the set
    pub snapshots_count: u32,
    /// Device object rooting the snapshot contents
    /// (e.g. `\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopy7`)
    pub device_object: String,
    /// Volume the snapshot was taken of
    pub original_volume_name: String,
    /// Machine that owns the original volume
    pub originating_machine: String,
    /// Machine that manages the snapshot
    pub service_machine: String,
    /// Exposed name, if the snapshot is exposed
    pub exposed_name: String,
    /// Exposed path, if the snapshot is exposed
    pub exposed_path: String,
    /// Provider that created the snapshot
    pub provider_id: Uuid,
    /// Raw snapshot attribute flags
    pub attributes: u32,
    /// Creation time, if the provider reported a representable one
    pub created_at: Option<DateTime<Utc>>,
    /// Raw snapshot status value
    pub status: u32,
}

/// Number of 100ns intervals between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_EPOCH_OFFSET: i64 = 116_444_736_000_000_000;

/// Convert a native 100ns-since-1601 timestamp into a UTC date
///
/// Returns `None` for zero or out-of-range values.
pub fn filetime_to_datetime(filetime: i64) -> Option<DateTime<Utc>> {
    if filetime <= 0 {
        return None;
    }
    let since_unix = filetime.checked_sub(FILETIME_UNIX_EPOCH_OFFSET)?;
    let secs = since_unix.div_euclid(10_000_000);
    let nanos = (since_unix.rem_euclid(10_000_000) * 100) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_id_uppercases_drive_letter() {
        let lower = VolumeId::parse(r"d:\x").unwrap();
        let upper = VolumeId::parse(r"D:\y").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.as_str(), "D:");
    }

    #[test]
    fn test_volume_id_rejects_non_drive_paths() {
        assert!(VolumeId::parse("").is_none());
        assert!(VolumeId::parse("C").is_none());
        assert!(VolumeId::parse("/usr/lib").is_none());
        assert!(VolumeId::parse(r"\\?\C:\x").is_none());
        assert!(VolumeId::parse("1:").is_none());
    }

    #[test]
    fn test_volume_id_bare_drive() {
        let volume = VolumeId::parse("e:").unwrap();
        assert_eq!(volume.root(), r"E:\");
        assert_eq!(volume.len(), 2);
        assert_eq!(volume.to_string(), "E:");
    }

    #[test]
    fn test_step_names_and_async_flags() {
        assert_eq!(Step::DoSnapshotSet.to_string(), "DoSnapshotSet()");
        assert!(Step::GatherWriterMetadata.is_async());
        assert!(Step::BackupComplete.is_async());
        assert!(!Step::StartSnapshotSet.is_async());
        assert_eq!(Step::CreateSession.name(), "CreateVssBackupComponents");
    }

    #[test]
    fn test_filetime_unix_epoch() {
        let dt = filetime_to_datetime(FILETIME_UNIX_EPOCH_OFFSET).unwrap();
        assert_eq!(dt.timestamp(), 0);
    }

    #[test]
    fn test_filetime_known_value() {
        // 2020-01-01T00:00:00Z
        let filetime = FILETIME_UNIX_EPOCH_OFFSET + 1_577_836_800 * 10_000_000 + 5;
        let dt = filetime_to_datetime(filetime).unwrap();
        assert_eq!(dt.timestamp(), 1_577_836_800);
        assert_eq!(dt.timestamp_subsec_nanos(), 500);
    }

    #[test]
    fn test_filetime_zero_is_none() {
        assert!(filetime_to_datetime(0).is_none());
        assert!(filetime_to_datetime(-5).is_none());
    }
}
