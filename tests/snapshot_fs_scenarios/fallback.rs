//! Fallback Tests
//!
//! A volume that cannot be snapshotted is read live:
//! - The original path is returned unchanged
//! - Every access retries creation and reports one error
//! - Failed attempts leave no session behind

use crate::common::*;
use snapvol::{HResult, VssError};
use snapvol_core::Step;
use std::time::Duration;

fn unsupported_d() -> FakeBehavior {
    FakeBehavior {
        unsupported_volumes: vec![r"D:\".to_string()],
        ..behavior()
    }
}

#[test]
fn orchestrator_rejects_unsupported_volume() {
    let h = harness(unsupported_d());
    let err = h.fs.provider().create(r"D:\", Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, VssError::VolumeNotSupported { .. }));
    assert_eq!(err.failed_step(), Some(Step::IsVolumeSupported));
    assert_eq!(h.log.sessions_open(), 0);
}

#[test]
fn unsupported_volume_is_read_live() {
    let memory = MemoryFs::new();
    memory.insert(r"D:\media\movie.mkv", b"live bytes");
    let h = harness_with(unsupported_d(), memory, Duration::from_secs(5));

    let data = h.fs.open(r"D:\media\movie.mkv").unwrap().into_inner();
    assert_eq!(data, b"live bytes");
    assert_eq!(h.fs.stat(r"D:\media\movie.mkv").unwrap().len, 10);
    assert_eq!(h.fs.resolve_path(r"D:\media\movie.mkv"), r"D:\media\movie.mkv");

    let errors = h.sink.messages_at(MessageLevel::Error);
    assert_eq!(errors.len(), 3);
    assert!(errors[0].contains("D:"));
    assert!(errors[0].contains("not supported"));
    assert_eq!(h.log.sessions_created(), 3);
    assert_eq!(h.log.sessions_open(), 0);
    assert_eq!(h.fs.snapshot_count(), 0);
}

#[test]
fn step_failure_is_reported_with_status_name() {
    let h = harness(FakeBehavior {
        fail_at: Some((Step::StartSnapshotSet, HResult::FSRVP_E_SHADOW_COPY_SET_IN_PROGRESS)),
        ..behavior()
    });

    assert_eq!(h.fs.resolve_path(r"C:\x"), r"C:\x");
    let errors = h.sink.messages_at(MessageLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("StartSnapshotSet()"));
    assert!(errors[0].contains("FSRVP_E_SHADOW_COPY_SET_IN_PROGRESS"));
}

#[test]
fn stalled_snapshot_times_out_and_falls_back() {
    let h = harness_with(
        FakeBehavior {
            never_finish: Some(Step::DoSnapshotSet),
            ..behavior()
        },
        MemoryFs::new(),
        Duration::from_millis(30),
    );

    let resolved = h.fs.resolve(r"C:\x");
    assert!(!resolved.is_snapshot());
    let errors = h.sink.messages_at(MessageLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("timed out"));
    assert_eq!(h.log.count(Step::AbortBackup), 1);
    assert_eq!(h.log.sessions_open(), 0);
    assert_eq!(h.log.operations_open(), 0);
}

#[test]
fn access_denied_names_privileges() {
    let h = harness(FakeBehavior {
        fail_at: Some((Step::CreateSession, HResult::E_ACCESSDENIED)),
        ..behavior()
    });

    h.fs.resolve_path(r"C:\x");
    let errors = h.sink.messages_at(MessageLevel::Error);
    assert!(errors[0].contains("backup privileges"));
}
