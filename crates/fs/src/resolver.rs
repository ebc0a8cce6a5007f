//! Snapshot-backed path resolver
//!
//! `SnapshotFs` wraps a `FileSystem` and serves every read from a snapshot of
//! the volume the path lives on. Snapshots are created on first access to a
//! volume and kept until `delete_snapshots`.
//!
//! ## Resolution
//!
//! ```text
//! 1. normalise: absolute, `/` -> `\`, no `\\?\` prefix
//! 2. volume = leading drive ("C:"); none, or a second drive further
//!    along the path -> original path
//! 3. lock the cache (held until 6)
//! 4. no entry -> create; failure is reported and not remembered
//! 5. entry -> join(root, path after volume); none -> original path
//! 6. unlock
//! ```
//!
//! The lock is held across creation so concurrent first accesses to a volume
//! produce exactly one snapshot. Creation for different volumes is
//! serialised too.
//!
//! A failed creation never becomes an I/O error: the path falls back to the
//! live volume and the failure goes to the message sink. Every later access to
//! that volume tries again.

use crate::filesystem::{FileSystem, OpenOptions};
use crate::winpath;
use parking_lot::Mutex;
use snapvol_core::{MessageSink, SnapvolConfig, VolumeId, DEFAULT_SNAPSHOT_TIMEOUT_SECS};
use snapvol_vss::{SnapshotProvider, VolumeSnapshot};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Where a resolved path points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSource {
    /// Inside the snapshot of `volume`
    Snapshot {
        /// Snapshotted volume
        volume: VolumeId,
    },
    /// The original path on the live file system
    Live,
}

/// Outcome of resolving one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Path to hand to the wrapped file system
    pub path: String,
    /// Whether `path` points into a snapshot
    pub source: PathSource,
}

impl ResolvedPath {
    fn live(path: &str) -> Self {
        Self {
            path: path.to_string(),
            source: PathSource::Live,
        }
    }

    /// True when the path points into a snapshot
    pub fn is_snapshot(&self) -> bool {
        matches!(self.source, PathSource::Snapshot { .. })
    }
}

/// File system that reads locked files through per-volume snapshots
pub struct SnapshotFs<F, P: SnapshotProvider> {
    fs: F,
    provider: P,
    sink: Arc<dyn MessageSink>,
    timeout: Duration,
    enabled: bool,
    snapshots: Mutex<HashMap<VolumeId, P::Snapshot>>,
}

impl<F: FileSystem, P: SnapshotProvider> SnapshotFs<F, P> {
    /// Wrap `fs`, creating snapshots through `provider` with a 120 second
    /// budget per asynchronous step
    pub fn new(fs: F, provider: P, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            fs,
            provider,
            sink,
            timeout: Duration::from_secs(DEFAULT_SNAPSHOT_TIMEOUT_SECS),
            enabled: true,
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    /// Wrap `fs` using the timeout and switch from `config`
    pub fn with_config(
        fs: F,
        provider: P,
        sink: Arc<dyn MessageSink>,
        config: &SnapvolConfig,
    ) -> Self {
        let mut resolver = Self::new(fs, provider, sink);
        resolver.timeout = config.snapshot_timeout();
        resolver.enabled = config.enabled;
        resolver
    }

    /// Replace the per-step creation budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Per-step creation budget
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// False when every path passes through unchanged
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The wrapped file system
    pub fn inner(&self) -> &F {
        &self.fs
    }

    /// The snapshot provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Number of cached snapshots
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().len()
    }

    /// Whether a snapshot is cached for the volume `path` lives on
    pub fn has_snapshot(&self, path: &str) -> bool {
        match winpath::drive_volume(path) {
            Some(volume) => self.snapshots.lock().contains_key(&volume),
            None => false,
        }
    }

    /// Path inside the snapshot for `path`, or `path` itself when no snapshot
    /// is available
    pub fn resolve_path(&self, path: &str) -> String {
        self.resolve(path).path
    }

    /// Like `resolve_path`, also reporting where the result points
    pub fn resolve(&self, path: &str) -> ResolvedPath {
        if !self.enabled {
            return ResolvedPath::live(path);
        }

        let normalized = self.normalize(path);
        let Some(volume) = winpath::drive_volume(&normalized) else {
            return ResolvedPath::live(path);
        };
        let rest = &normalized[volume.len()..];
        if winpath::has_drive_element(rest) {
            debug!(target: "snapvol::fs", path, "Path names a second volume; reading live");
            return ResolvedPath::live(path);
        }

        let mut snapshots = self.snapshots.lock();
        if !snapshots.contains_key(&volume) {
            if let Some(snapshot) = self.create_snapshot(&volume) {
                snapshots.insert(volume.clone(), snapshot);
            }
        }

        match snapshots.get(&volume) {
            Some(snapshot) => ResolvedPath {
                path: winpath::join(&[snapshot.root_path(), rest]),
                source: PathSource::Snapshot { volume },
            },
            None => ResolvedPath::live(path),
        }
    }

    /// Delete every cached snapshot, reporting failures to the sink
    ///
    /// The cache keeps its entries; resolving paths afterwards is not
    /// supported. Calling this again reports nothing new.
    pub fn delete_snapshots(&self) {
        let mut snapshots = self.snapshots.lock();
        self.sink
            .verbose(&format!("deleting {} snapshot(s)", snapshots.len()));

        for (volume, snapshot) in snapshots.iter_mut() {
            match snapshot.delete() {
                Ok(()) => debug!(target: "snapvol::fs", %volume, "Snapshot released"),
                Err(error) => self.sink.error(&format!(
                    "failed to delete snapshot for [{}]: {}",
                    volume, error
                )),
            }
        }
    }

    /// Absolute, cleaned form without any extended prefix
    ///
    /// Cleaning happens before the volume is split off so `..` can never
    /// climb out of the snapshot root.
    fn normalize(&self, path: &str) -> String {
        let absolute = if winpath::is_abs(path) {
            path.to_string()
        } else {
            self.fs.abs(path).unwrap_or_else(|_| path.to_string())
        };
        let unified = winpath::to_backslashes(&absolute);
        winpath::clean(winpath::strip_extended_prefix(&unified))
    }

    fn create_snapshot(&self, volume: &VolumeId) -> Option<P::Snapshot> {
        let root = volume.root();
        self.sink
            .verbose(&format!("creating snapshot for [{}]", root));

        match self.provider.create(&root, self.timeout) {
            Ok(snapshot) => {
                self.sink.info(&format!(
                    "created snapshot for [{}] at {}",
                    root,
                    snapshot.root_path()
                ));
                Some(snapshot)
            }
            Err(error) => {
                self.sink.error(&format!(
                    "failed to create snapshot for [{}]: {}",
                    volume, error
                ));
                None
            }
        }
    }
}

impl<F: FileSystem, P: SnapshotProvider> FileSystem for SnapshotFs<F, P> {
    type File = F::File;
    type Metadata = F::Metadata;

    fn open(&self, path: &str) -> io::Result<F::File> {
        self.fs.open(&self.resolve_path(path))
    }

    fn open_file(&self, path: &str, options: &OpenOptions) -> io::Result<F::File> {
        self.fs.open_file(&self.resolve_path(path), options)
    }

    fn stat(&self, path: &str) -> io::Result<F::Metadata> {
        self.fs.stat(&self.resolve_path(path))
    }

    fn lstat(&self, path: &str) -> io::Result<F::Metadata> {
        self.fs.lstat(&self.resolve_path(path))
    }

    fn join(&self, elems: &[&str]) -> String {
        self.fs.join(elems)
    }

    fn separator(&self) -> &'static str {
        self.fs.separator()
    }

    fn is_abs(&self, path: &str) -> bool {
        self.fs.is_abs(path)
    }

    fn abs(&self, path: &str) -> io::Result<String> {
        self.fs.abs(path)
    }

    fn clean(&self, path: &str) -> String {
        self.fs.clean(path)
    }

    fn base(&self, path: &str) -> String {
        self.fs.base(path)
    }

    fn dir(&self, path: &str) -> String {
        self.fs.dir(path)
    }

    fn volume_name(&self, path: &str) -> String {
        self.fs.volume_name(path)
    }
}
