//! Shared test utilities for the root integration suites.
//!
//! Builds `SnapshotFs` instances over the in-memory file system and the real
//! orchestrator driving scripted sessions.
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::Arc;
use std::time::Duration;

pub use snapvol::{
    CollectingSink, FileSystem, MessageLevel, PathSource, SnapshotFs, SnapvolConfig,
    VssOrchestrator,
};
pub use snapvol_fs::testing::MemoryFs;
pub use snapvol_vss::testing::{CallLog, FakeBehavior, FakeSessionFactory};

/// Device prefix the scripted sessions use
pub const DEVICE_PREFIX: &str = r"\\?\SnapshotDevice\";

/// Short poll interval so scripted operations finish quickly
pub const POLL: Duration = Duration::from_millis(2);

/// Resolver over scripted sessions, with handles to inspect it
pub struct Harness {
    pub fs: SnapshotFs<MemoryFs, VssOrchestrator<FakeSessionFactory>>,
    pub sink: Arc<CollectingSink>,
    pub log: CallLog,
}

impl Harness {
    /// Device object root of the n-th snapshot
    pub fn device(n: usize) -> String {
        format!("{}{}", DEVICE_PREFIX, n)
    }
}

/// Route `tracing` output to the test harness; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Behaviour with the scenario device prefix
pub fn behavior() -> FakeBehavior {
    FakeBehavior::with_device_prefix(DEVICE_PREFIX)
}

/// Harness with default settings
pub fn harness(behavior: FakeBehavior) -> Harness {
    harness_with(behavior, MemoryFs::new(), Duration::from_secs(5))
}

/// Harness over `memory` with a per-step budget of `timeout`
pub fn harness_with(behavior: FakeBehavior, memory: MemoryFs, timeout: Duration) -> Harness {
    let factory = FakeSessionFactory::new(behavior);
    let log = factory.log();
    let sink = Arc::new(CollectingSink::new());
    let orchestrator = VssOrchestrator::with_poll_interval(factory, POLL);
    let fs = SnapshotFs::new(memory, orchestrator, sink.clone()).with_timeout(timeout);
    Harness { fs, sink, log }
}
