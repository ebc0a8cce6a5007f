//! Provider seam between the orchestrator and the path resolver
//!
//! The resolver only needs two things from a snapshot: its root path and a
//! way to delete it. Keeping that behind a trait lets the resolver be driven
//! by the real orchestrator or by a counting fake.

use snapvol_core::Result;
use std::time::Duration;

/// A created snapshot as seen by the resolver
pub trait VolumeSnapshot: Send {
    /// Path that roots the snapshot contents
    fn root_path(&self) -> &str;

    /// Tear the snapshot down
    ///
    /// Intended to be called once; implementations should make a second
    /// call harmless.
    fn delete(&mut self) -> Result<()>;
}

/// Something that can snapshot a volume
///
/// Thread safety: shared by every thread that resolves paths
/// (requires Send + Sync).
pub trait SnapshotProvider: Send + Sync {
    /// Snapshot type produced
    type Snapshot: VolumeSnapshot;

    /// Create a snapshot of `volume` (a volume root such as `C:\`), allowing
    /// `timeout` for each asynchronous step.
    fn create(&self, volume: &str, timeout: Duration) -> Result<Self::Snapshot>;
}
