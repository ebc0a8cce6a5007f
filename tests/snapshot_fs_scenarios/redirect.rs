//! Redirect Tests
//!
//! Reads of drive paths land inside the volume's snapshot:
//! - Paths are rewritten onto the device object root
//! - One snapshot per volume, shared by every later read
//! - Paths without a drive are never snapshotted

use crate::common::*;
use snapvol::{winpath, VolumeId};
use snapvol_core::Step;
use std::sync::{Arc, Barrier};
use std::thread;

// ============================================================================
// Rewriting
// ============================================================================

#[test]
fn read_on_c_is_served_from_snapshot() {
    let h = harness(behavior());

    let resolved = h.fs.resolve(r"C:\data\file.txt");
    assert_eq!(resolved.path, r"\\?\SnapshotDevice\1\data\file.txt");
    assert_eq!(
        resolved.source,
        PathSource::Snapshot {
            volume: VolumeId::parse("C:").unwrap()
        }
    );
    assert_eq!(h.log.volumes(), vec![r"C:\".to_string()]);
    assert_eq!(h.log.count(Step::DoSnapshotSet), 1);
}

#[test]
fn file_contents_come_from_the_snapshot_copy() {
    let memory = MemoryFs::new();
    memory.insert(r"C:\db\locked.sqlite", b"live, locked");
    memory.insert(r"\\?\SnapshotDevice\1\db\locked.sqlite", b"frozen");
    let h = harness_with(behavior(), memory, std::time::Duration::from_secs(5));

    let data = h.fs.open(r"C:\db\locked.sqlite").unwrap().into_inner();
    assert_eq!(data, b"frozen");
    assert_eq!(h.fs.lstat(r"c:/db/locked.sqlite").unwrap().len, 6);
    assert!(h
        .fs
        .inner()
        .accessed()
        .iter()
        .all(|p| p.starts_with(DEVICE_PREFIX)));
}

#[test]
fn resolved_path_joins_root_and_volume_relative_rest() {
    let h = harness(behavior());
    for rest in [r"\a", r"\a\b\c.txt", r"\Program Files\app\config.ini"] {
        let input = format!("C:{}", rest);
        let expected = winpath::join(&[Harness::device(1).as_str(), rest]);
        assert_eq!(h.fs.resolve_path(&input), expected);
    }
}

// ============================================================================
// Cache
// ============================================================================

#[test]
fn each_volume_is_snapshotted_once() {
    let h = harness(behavior());

    assert_eq!(h.fs.resolve_path(r"C:\a"), r"\\?\SnapshotDevice\1\a");
    assert_eq!(h.fs.resolve_path(r"D:\a"), r"\\?\SnapshotDevice\2\a");
    assert_eq!(h.fs.resolve_path(r"c:\b"), r"\\?\SnapshotDevice\1\b");
    assert_eq!(h.fs.resolve_path(r"\\?\D:\b"), r"\\?\SnapshotDevice\2\b");

    assert_eq!(h.log.sessions_created(), 2);
    assert_eq!(h.fs.snapshot_count(), 2);
}

#[test]
fn concurrent_readers_share_one_snapshot() {
    let h = Arc::new(harness(behavior()));
    let num_threads = 6;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let h = Arc::clone(&h);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                h.fs.resolve_path(&format!(r"C:\shared\{}.log", i))
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().starts_with(r"\\?\SnapshotDevice\1\shared\"));
    }
    assert_eq!(h.log.sessions_created(), 1);
    assert_eq!(h.log.count(Step::AddToSnapshotSet), 1);
}

#[test]
fn unc_paths_pass_through() {
    let h = harness(behavior());
    assert_eq!(
        h.fs.resolve_path(r"\\fileserver\share\doc.txt"),
        r"\\fileserver\share\doc.txt"
    );
    assert_eq!(h.log.sessions_created(), 0);
    assert!(h.sink.messages().is_empty());
}
