//! Read-side file system seam
//!
//! `FileSystem` is the surface the resolver wraps and re-exposes: opening for
//! reading, metadata lookups and pure path utilities. Paths are plain strings
//! so Windows paths survive unchanged on every host.
//!
//! `LocalFs` implements it over `std::fs` with the host's path rules.

use std::fs::{File, Metadata};
use std::io;

/// Flags for `FileSystem::open_file`
///
/// Defaults to read-only, matching `FileSystem::open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Open for reading
    pub read: bool,
    /// Open for writing
    pub write: bool,
    /// Append on write
    pub append: bool,
    /// Create when missing
    pub create: bool,
    /// Truncate on open
    pub truncate: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            truncate: false,
        }
    }
}

impl OpenOptions {
    /// Read-only options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set read access
    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    /// Set write access
    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    /// Set append mode
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Create the file when missing
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Truncate the file on open
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Equivalent `std::fs::OpenOptions`
    pub fn to_std(&self) -> std::fs::OpenOptions {
        let mut options = std::fs::OpenOptions::new();
        options
            .read(self.read)
            .write(self.write)
            .append(self.append)
            .create(self.create)
            .truncate(self.truncate);
        options
    }
}

/// File access surface shared by the local file system and the resolver
///
/// Thread safety: a single instance is used by every thread that reads
/// files (requires Send + Sync).
pub trait FileSystem: Send + Sync {
    /// Handle returned by `open`
    type File;
    /// Metadata returned by `stat` and `lstat`
    type Metadata;

    /// Open `path` for reading
    fn open(&self, path: &str) -> io::Result<Self::File>;

    /// Open `path` with explicit flags
    fn open_file(&self, path: &str, options: &OpenOptions) -> io::Result<Self::File>;

    /// Metadata of `path`, following links
    fn stat(&self, path: &str) -> io::Result<Self::Metadata>;

    /// Metadata of `path` itself, not following links
    fn lstat(&self, path: &str) -> io::Result<Self::Metadata>;

    /// Join path elements with the separator and clean the result
    fn join(&self, elems: &[&str]) -> String;

    /// Directory separator
    fn separator(&self) -> &'static str;

    /// Whether `path` is absolute
    fn is_abs(&self, path: &str) -> bool;

    /// Absolute, cleaned form of `path`
    fn abs(&self, path: &str) -> io::Result<String>;

    /// Shortest equivalent path
    fn clean(&self, path: &str) -> String;

    /// Last element of `path`
    fn base(&self, path: &str) -> String;

    /// All but the last element of `path`
    fn dir(&self, path: &str) -> String;

    /// Leading volume name (`C:`, `\\host\share`), empty where volumes do not exist
    fn volume_name(&self, path: &str) -> String;
}

// =============================================================================
// LocalFs
// =============================================================================

fn utf8_path(path: &std::path::Path) -> io::Result<&str> {
    path.to_str().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8")
    })
}

#[cfg(windows)]
mod host {
    use std::io;

    pub(super) use crate::winpath::{base, clean, dir, is_abs, join, volume_name};

    pub(super) const SEPARATOR: &str = "\\";

    /// Completed by the OS, so `\x` and `C:x` honour the per-drive
    /// working directories
    pub(super) fn abs(path: &str) -> io::Result<String> {
        if is_abs(path) {
            return Ok(clean(path));
        }
        let absolute = std::path::absolute(path)?;
        Ok(clean(super::utf8_path(&absolute)?))
    }
}

#[cfg(not(windows))]
mod host {
    use std::io;

    pub(super) const SEPARATOR: &str = "/";

    pub(super) fn is_abs(path: &str) -> bool {
        path.starts_with('/')
    }

    pub(super) fn clean(path: &str) -> String {
        let rooted = path.starts_with('/');
        let mut parts: Vec<&str> = Vec::new();
        for part in path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    if parts.last().map_or(false, |last| *last != "..") {
                        parts.pop();
                    } else if !rooted {
                        parts.push("..");
                    }
                }
                other => parts.push(other),
            }
        }
        let joined = parts.join("/");
        match (rooted, joined.is_empty()) {
            (true, _) => format!("/{}", joined),
            (false, true) => ".".to_string(),
            (false, false) => joined,
        }
    }

    pub(super) fn join(elems: &[&str]) -> String {
        let parts: Vec<&str> = elems.iter().copied().filter(|e| !e.is_empty()).collect();
        if parts.is_empty() {
            return String::new();
        }
        clean(&parts.join("/"))
    }

    pub(super) fn base(path: &str) -> String {
        if path.is_empty() {
            return ".".to_string();
        }
        let trimmed = path.trim_end_matches('/');
        match trimmed.rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => "/".to_string(),
        }
    }

    pub(super) fn dir(path: &str) -> String {
        let cut = path.rfind('/').map_or(0, |i| i + 1);
        clean(&path[..cut])
    }

    pub(super) fn volume_name(_path: &str) -> String {
        String::new()
    }

    pub(super) fn abs(path: &str) -> io::Result<String> {
        if is_abs(path) {
            return Ok(clean(path));
        }
        let cwd = std::env::current_dir()?;
        Ok(join(&[super::utf8_path(&cwd)?, path]))
    }
}

/// The machine's own file system
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Create a handle to the local file system
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    type File = File;
    type Metadata = Metadata;

    fn open(&self, path: &str) -> io::Result<File> {
        File::open(path)
    }

    fn open_file(&self, path: &str, options: &OpenOptions) -> io::Result<File> {
        options.to_std().open(path)
    }

    fn stat(&self, path: &str) -> io::Result<Metadata> {
        std::fs::metadata(path)
    }

    fn lstat(&self, path: &str) -> io::Result<Metadata> {
        std::fs::symlink_metadata(path)
    }

    fn join(&self, elems: &[&str]) -> String {
        host::join(elems)
    }

    fn separator(&self) -> &'static str {
        host::SEPARATOR
    }

    fn is_abs(&self, path: &str) -> bool {
        host::is_abs(path)
    }

    fn abs(&self, path: &str) -> io::Result<String> {
        host::abs(path)
    }

    fn clean(&self, path: &str) -> String {
        host::clean(path)
    }

    fn base(&self, path: &str) -> String {
        host::base(path)
    }

    fn dir(&self, path: &str) -> String {
        host::dir(path)
    }

    fn volume_name(&self, path: &str) -> String {
        host::volume_name(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    #[test]
    fn test_open_options_default_is_read_only() {
        let options = OpenOptions::new();
        assert!(options.read);
        assert!(!options.write && !options.append && !options.create && !options.truncate);

        let options = OpenOptions::new().read(false).write(true).create(true);
        assert!(!options.read && options.write && options.create);
    }

    #[test]
    fn test_local_fs_reads_and_stats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"hello")
            .unwrap();
        let path = path.to_str().unwrap();

        let fs = LocalFs::new();
        let mut contents = String::new();
        fs.open(path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello");
        assert_eq!(fs.stat(path).unwrap().len(), 5);
        assert_eq!(fs.lstat(path).unwrap().len(), 5);
        assert!(fs.open_file(path, &OpenOptions::new()).is_ok());
        assert!(fs.open(&fs.join(&[dir.path().to_str().unwrap(), "missing"])).is_err());
    }

    #[test]
    fn test_local_fs_abs_is_absolute_and_clean() {
        let fs = LocalFs::new();
        let abs = fs.abs("some/./relative/../path").unwrap();
        assert!(fs.is_abs(&abs));
        assert_eq!(fs.base(&abs), "path");
        assert_eq!(fs.clean(&abs), abs);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_posix_path_utilities() {
        let fs = LocalFs::new();
        assert_eq!(fs.separator(), "/");
        assert_eq!(fs.join(&["/a", "", "b/../c"]), "/a/c");
        assert_eq!(fs.clean("a//b/./.."), "a");
        assert_eq!(fs.clean("/.."), "/");
        assert_eq!(fs.base("/a/b/"), "b");
        assert_eq!(fs.base("/"), "/");
        assert_eq!(fs.dir("/a/b"), "/a");
        assert_eq!(fs.dir("b"), ".");
        assert_eq!(fs.volume_name("/a"), "");
    }

    #[cfg(windows)]
    #[test]
    fn test_windows_path_utilities() {
        let fs = LocalFs::new();
        assert_eq!(fs.separator(), "\\");
        assert_eq!(fs.join(&[r"C:\a", "b"]), r"C:\a\b");
        assert_eq!(fs.volume_name(r"C:\a"), "C:");
    }
}
