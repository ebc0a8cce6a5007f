//! In-memory fakes for exercising the resolver
//!
//! - `MemoryFs`: Windows-style file system over a map of paths to contents,
//!   recording every path it is asked to read
//! - `FakeProvider`: snapshot provider that counts creations and deletions
//!   and can be told to refuse volumes or fail deletion

use crate::filesystem::{FileSystem, OpenOptions};
use crate::winpath;
use parking_lot::Mutex;
use snapvol_core::{HResult, Result, Step, VolumeId, VssError};
use snapvol_vss::{SnapshotProvider, VolumeSnapshot};
use std::collections::HashMap;
use std::io::{self, Cursor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// MemoryFs
// =============================================================================

/// Metadata of a `MemoryFs` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMetadata {
    /// Size in bytes
    pub len: u64,
}

/// Windows-style in-memory file system
#[derive(Debug)]
pub struct MemoryFs {
    files: Mutex<HashMap<String, Vec<u8>>>,
    accessed: Mutex<Vec<String>>,
    cwd: String,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Empty file system whose working directory is `C:\work`
    pub fn new() -> Self {
        Self::with_cwd(r"C:\work")
    }

    /// Empty file system with the given working directory
    pub fn with_cwd(cwd: &str) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            accessed: Mutex::new(Vec::new()),
            cwd: cwd.to_string(),
        }
    }

    /// Add or replace a file
    pub fn insert(&self, path: &str, contents: &[u8]) {
        self.files.lock().insert(path.to_string(), contents.to_vec());
    }

    /// Paths passed to `open`, `open_file`, `stat` and `lstat`, in call order
    pub fn accessed(&self) -> Vec<String> {
        self.accessed.lock().clone()
    }

    fn lookup(&self, path: &str) -> io::Result<Vec<u8>> {
        self.accessed.lock().push(path.to_string());
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

impl FileSystem for MemoryFs {
    type File = Cursor<Vec<u8>>;
    type Metadata = MemoryMetadata;

    fn open(&self, path: &str) -> io::Result<Self::File> {
        self.lookup(path).map(Cursor::new)
    }

    fn open_file(&self, path: &str, options: &OpenOptions) -> io::Result<Self::File> {
        if options.write || options.append || options.create || options.truncate {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "memory file system is read-only",
            ));
        }
        self.open(path)
    }

    fn stat(&self, path: &str) -> io::Result<MemoryMetadata> {
        self.lookup(path).map(|data| MemoryMetadata {
            len: data.len() as u64,
        })
    }

    fn lstat(&self, path: &str) -> io::Result<MemoryMetadata> {
        self.stat(path)
    }

    fn join(&self, elems: &[&str]) -> String {
        winpath::join(elems)
    }

    fn separator(&self) -> &'static str {
        "\\"
    }

    fn is_abs(&self, path: &str) -> bool {
        winpath::is_abs(path)
    }

    fn abs(&self, path: &str) -> io::Result<String> {
        Ok(winpath::abs_from(&self.cwd, path))
    }

    fn clean(&self, path: &str) -> String {
        winpath::clean(path)
    }

    fn base(&self, path: &str) -> String {
        winpath::base(path)
    }

    fn dir(&self, path: &str) -> String {
        winpath::dir(path)
    }

    fn volume_name(&self, path: &str) -> String {
        winpath::volume_name(path)
    }
}

// =============================================================================
// FakeProvider
// =============================================================================

#[derive(Debug, Default)]
struct ProviderState {
    created: Vec<String>,
    last_timeout: Option<Duration>,
}

/// Snapshot provider that hands out numbered roots
///
/// The n-th successful creation gets the root `{prefix}{n}`.
#[derive(Debug)]
pub struct FakeProvider {
    prefix: String,
    unsupported: Vec<VolumeId>,
    fail_delete: bool,
    delay: Duration,
    creations: AtomicUsize,
    deletions: Arc<AtomicUsize>,
    state: Mutex<ProviderState>,
}

impl FakeProvider {
    /// Provider whose roots start with `prefix`
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            unsupported: Vec::new(),
            fail_delete: false,
            delay: Duration::ZERO,
            creations: AtomicUsize::new(0),
            deletions: Arc::new(AtomicUsize::new(0)),
            state: Mutex::new(ProviderState::default()),
        }
    }

    /// Refuse the given volumes (`"D:"`)
    pub fn with_unsupported(mut self, volumes: &[&str]) -> Self {
        self.unsupported = volumes.iter().filter_map(|v| VolumeId::parse(v)).collect();
        self
    }

    /// Make every snapshot fail its first deletion
    pub fn with_failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Pause inside every creation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Creation attempts, successful or not
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    /// Volumes snapshotted successfully, in order
    pub fn created_volumes(&self) -> Vec<String> {
        self.state.lock().created.clone()
    }

    /// Deletions that reached a live snapshot
    pub fn deletions(&self) -> usize {
        self.deletions.load(Ordering::SeqCst)
    }

    /// Budget passed to the latest creation
    pub fn last_timeout(&self) -> Option<Duration> {
        self.state.lock().last_timeout
    }
}

impl SnapshotProvider for FakeProvider {
    type Snapshot = FakeSnapshot;

    fn create(&self, volume: &str, timeout: Duration) -> Result<FakeSnapshot> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let mut state = self.state.lock();
        state.last_timeout = Some(timeout);
        if let Some(id) = VolumeId::parse(volume) {
            if self.unsupported.contains(&id) {
                return Err(VssError::VolumeNotSupported {
                    volume: volume.to_string(),
                });
            }
        }

        state.created.push(volume.to_string());
        Ok(FakeSnapshot {
            root: format!("{}{}", self.prefix, state.created.len()),
            fail_delete: self.fail_delete,
            deleted: false,
            deletions: Arc::clone(&self.deletions),
        })
    }
}

/// Snapshot produced by `FakeProvider`
#[derive(Debug)]
pub struct FakeSnapshot {
    root: String,
    fail_delete: bool,
    deleted: bool,
    deletions: Arc<AtomicUsize>,
}

impl VolumeSnapshot for FakeSnapshot {
    fn root_path(&self) -> &str {
        &self.root
    }

    fn delete(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.deleted, true) {
            return Ok(());
        }
        self.deletions.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete {
            return Err(VssError::step(
                Step::DeleteSnapshots,
                HResult::VSS_E_OBJECT_NOT_FOUND,
            ));
        }
        Ok(())
    }
}
