//! Configuration Tests
//!
//! `snapvol.toml` settings reaching the resolver and the orchestrator.

use crate::common::*;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn disabled_config_reads_live_files() {
    let config = SnapvolConfig::from_toml_str("enabled = false").unwrap();
    let factory = FakeSessionFactory::new(behavior());
    let log = factory.log();
    let fs = SnapshotFs::with_config(
        MemoryFs::new(),
        VssOrchestrator::from_config(factory, &config),
        Arc::new(CollectingSink::new()),
        &config,
    );

    assert_eq!(fs.resolve_path(r"C:\a"), r"C:\a");
    assert_eq!(log.sessions_created(), 0);
}

#[test]
fn config_file_sets_budget_and_poll_interval() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(snapvol::CONFIG_FILE_NAME);
    std::fs::write(&path, "snapshot_timeout_secs = 7\npoll_interval_ms = 3\n").unwrap();

    let config = SnapvolConfig::from_file(&path).unwrap();
    let orchestrator = VssOrchestrator::from_config(FakeSessionFactory::new(behavior()), &config);
    assert_eq!(orchestrator.poll_interval(), Duration::from_millis(3));

    let fs = SnapshotFs::with_config(
        MemoryFs::new(),
        orchestrator,
        Arc::new(CollectingSink::new()),
        &config,
    );
    assert_eq!(fs.timeout(), Duration::from_secs(7));
    assert!(fs.resolve(r"C:\a").is_snapshot());
}

#[test]
fn local_vss_from_file_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(snapvol::CONFIG_FILE_NAME);
    std::fs::write(&path, "snapshot_timeout_secs = 0\n").unwrap();

    let result = snapvol::local_vss_from_file(&path, Arc::new(CollectingSink::new()));
    assert!(result.is_err());
}

#[cfg(not(windows))]
#[test]
fn local_vss_reads_live_files_off_windows() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("plain.txt");
    std::fs::write(&file, b"plain").unwrap();

    let sink = Arc::new(CollectingSink::new());
    let fs = snapvol::local_vss_with_config(&SnapvolConfig::default(), sink.clone());
    let path = file.to_str().unwrap();
    assert_eq!(fs.resolve_path(path), path);
    assert_eq!(fs.stat(path).unwrap().len(), 5);
    assert!(sink.messages().is_empty());
}
