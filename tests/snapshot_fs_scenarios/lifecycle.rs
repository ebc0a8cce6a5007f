//! Lifecycle Tests
//!
//! Tearing snapshots down at the end of a run:
//! - Every snapshot goes through BackupComplete and DeleteSnapshots
//! - Sessions are released exactly once
//! - A second teardown does nothing

use crate::common::*;
use snapvol_core::Step;

#[test]
fn delete_snapshots_tears_down_every_volume() {
    let h = harness(behavior());
    h.fs.resolve_path(r"C:\a");
    h.fs.resolve_path(r"D:\a");
    assert_eq!(h.log.sessions_open(), 2);

    h.fs.delete_snapshots();

    assert_eq!(h.log.count(Step::BackupComplete), 2);
    assert_eq!(h.log.deleted_snapshots().len(), 2);
    assert_eq!(h.log.sessions_open(), 0);
    assert_eq!(h.log.operations_open(), 0);
    assert_eq!(h.sink.error_count(), 0);
}

#[test]
fn second_teardown_is_a_no_op() {
    let h = harness(behavior());
    h.fs.resolve_path(r"C:\a");

    h.fs.delete_snapshots();
    h.log.clear_calls();
    h.fs.delete_snapshots();

    assert!(h.log.calls().is_empty());
    assert_eq!(h.log.sessions_released(), 1);
    assert_eq!(h.sink.error_count(), 0);
}

#[test]
fn teardown_failure_is_reported_not_raised() {
    let h = harness(FakeBehavior {
        fail_free_properties: true,
        ..behavior()
    });
    h.fs.resolve_path(r"C:\a");

    h.fs.delete_snapshots();

    let errors = h.sink.messages_at(MessageLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("failed to delete snapshot for [C:]"));
    assert_eq!(h.log.count(Step::DeleteSnapshots), 1);
    assert_eq!(h.log.sessions_open(), 0);
}

#[test]
fn dropping_the_resolver_releases_sessions() {
    let h = harness(behavior());
    h.fs.resolve_path(r"C:\a");
    let log = h.log.clone();
    drop(h);
    assert_eq!(log.sessions_open(), 0);
}

#[test]
fn tracing_sink_reports_lifecycle() {
    init_tracing();
    let factory = FakeSessionFactory::new(behavior());
    let log = factory.log();
    let fs = SnapshotFs::new(
        MemoryFs::new(),
        VssOrchestrator::with_poll_interval(factory, POLL),
        std::sync::Arc::new(snapvol::TracingSink),
    );

    assert!(fs.resolve(r"C:\a").is_snapshot());
    fs.delete_snapshots();
    assert_eq!(log.sessions_open(), 0);
}
