//! Scripted session fakes
//!
//! `FakeSessionFactory` produces sessions that succeed by default and can be
//! told to fail, stall or cancel at any step. Every native call is recorded in
//! a shared `CallLog` together with acquire/release counts, so tests can check
//! both call order and that every acquired object was released exactly once.
//!
//! # Example
//!
//! ```ignore
//! use snapvol_vss::testing::{FakeBehavior, FakeSessionFactory};
//! use snapvol_vss::VssOrchestrator;
//!
//! let factory = FakeSessionFactory::new(FakeBehavior::default());
//! let log = factory.log();
//! let orchestrator = VssOrchestrator::new(factory);
//! ```

use crate::session::{
    AsyncOperation, AsyncStatus, BackupSession, BackupState, NativeResult, SessionFactory,
    VssContext,
};
use parking_lot::Mutex;
use snapvol_core::{HResult, Result, SnapshotProperties, Step, VssError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Default prefix of fake device object paths
pub const DEFAULT_DEVICE_PREFIX: &str = r"\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopy";

/// How fake sessions behave
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    /// Fail the given step with the given status
    pub fail_at: Option<(Step, HResult)>,
    /// Volume roots reported as unsupported
    pub unsupported_volumes: Vec<String>,
    /// Asynchronous step whose operation never finishes
    pub never_finish: Option<Step>,
    /// Asynchronous step whose operation reports cancellation
    pub cancel_at: Option<Step>,
    /// Asynchronous step that hands back no operation object
    pub missing_async: Option<Step>,
    /// Number of failing status queries before each operation reports its state
    pub transient_status_errors: u32,
    /// Fail releasing the properties record
    pub fail_free_properties: bool,
    /// Report a 32-bit process on a 64-bit OS
    pub architecture_mismatch: bool,
    /// Pause inside session creation
    pub create_delay: Duration,
    /// Device object paths are this prefix followed by a counter from 1
    pub device_prefix: String,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            fail_at: None,
            unsupported_volumes: Vec::new(),
            never_finish: None,
            cancel_at: None,
            missing_async: None,
            transient_status_errors: 0,
            fail_free_properties: false,
            architecture_mismatch: false,
            create_delay: Duration::ZERO,
            device_prefix: DEFAULT_DEVICE_PREFIX.to_string(),
        }
    }
}

impl FakeBehavior {
    /// Sessions that name their device objects `{prefix}{n}`
    pub fn with_device_prefix(prefix: impl Into<String>) -> Self {
        Self {
            device_prefix: prefix.into(),
            ..Self::default()
        }
    }

    fn failure_for(&self, step: Step) -> Option<HResult> {
        match self.fail_at {
            Some((failing, status)) if failing == step => Some(status),
            _ => None,
        }
    }
}

// =============================================================================
// Call log
// =============================================================================

#[derive(Debug, Default)]
struct LogState {
    calls: Vec<Step>,
    volumes: Vec<String>,
    deleted: Vec<Uuid>,
    sessions_created: usize,
    sessions_released: usize,
    operations_created: usize,
    operations_released: usize,
}

/// Shared record of everything the fakes were asked to do
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    state: Arc<Mutex<LogState>>,
}

impl CallLog {
    fn record(&self, step: Step) {
        self.state.lock().calls.push(step);
    }

    /// Native calls in the order they were made, across all sessions
    pub fn calls(&self) -> Vec<Step> {
        self.state.lock().calls.clone()
    }

    /// Number of calls made for `step`
    pub fn count(&self, step: Step) -> usize {
        self.state.lock().calls.iter().filter(|s| **s == step).count()
    }

    /// Forget recorded calls; counters are kept
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Volumes passed to `AddToSnapshotSet`
    pub fn volumes(&self) -> Vec<String> {
        self.state.lock().volumes.clone()
    }

    /// Snapshot ids passed to a successful `DeleteSnapshots`
    pub fn deleted_snapshots(&self) -> Vec<Uuid> {
        self.state.lock().deleted.clone()
    }

    /// Sessions created so far
    pub fn sessions_created(&self) -> usize {
        self.state.lock().sessions_created
    }

    /// Sessions released so far
    pub fn sessions_released(&self) -> usize {
        self.state.lock().sessions_released
    }

    /// Sessions created but not yet released
    pub fn sessions_open(&self) -> usize {
        let state = self.state.lock();
        state.sessions_created - state.sessions_released
    }

    /// Operations handed out so far
    pub fn operations_created(&self) -> usize {
        self.state.lock().operations_created
    }

    /// Operations handed out but not yet released
    pub fn operations_open(&self) -> usize {
        let state = self.state.lock();
        state.operations_created - state.operations_released
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Produces `FakeSession`s sharing one behaviour and one log
#[derive(Debug, Clone)]
pub struct FakeSessionFactory {
    behavior: FakeBehavior,
    log: CallLog,
    devices: Arc<AtomicU64>,
}

impl FakeSessionFactory {
    /// Create a factory with the given behaviour
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            log: CallLog::default(),
            devices: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Handle to the shared call log
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl Default for FakeSessionFactory {
    fn default() -> Self {
        Self::new(FakeBehavior::default())
    }
}

impl SessionFactory for FakeSessionFactory {
    type Session = FakeSession;

    fn platform_check(&self) -> Result<()> {
        if self.behavior.architecture_mismatch {
            return Err(VssError::ArchitectureMismatch {
                process_arch: "32-bit",
            });
        }
        Ok(())
    }

    fn create_session(&self) -> Result<FakeSession> {
        self.log.record(Step::CreateSession);
        if !self.behavior.create_delay.is_zero() {
            std::thread::sleep(self.behavior.create_delay);
        }
        match self.behavior.failure_for(Step::CreateSession) {
            Some(HResult::E_ACCESSDENIED) => {
                return Err(VssError::AccessDenied {
                    status: HResult::E_ACCESSDENIED,
                })
            }
            Some(status) => return Err(VssError::step(Step::CreateSession, status)),
            None => {}
        }

        self.log.state.lock().sessions_created += 1;
        Ok(FakeSession {
            behavior: self.behavior.clone(),
            log: self.log.clone(),
            devices: Arc::clone(&self.devices),
            snapshot_set_id: None,
            snapshots: Vec::new(),
            properties_held: false,
        })
    }
}

// =============================================================================
// Session
// =============================================================================

/// A scripted backup session
#[derive(Debug)]
pub struct FakeSession {
    behavior: FakeBehavior,
    log: CallLog,
    devices: Arc<AtomicU64>,
    snapshot_set_id: Option<Uuid>,
    snapshots: Vec<(Uuid, String)>,
    properties_held: bool,
}

impl FakeSession {
    fn sync_call(&self, step: Step) -> NativeResult<()> {
        self.log.record(step);
        match self.behavior.failure_for(step) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn async_call(&self, step: Step) -> NativeResult<Option<FakeOperation>> {
        self.sync_call(step)?;
        if self.behavior.missing_async == Some(step) {
            return Ok(None);
        }

        let outcome = if self.behavior.never_finish == Some(step) {
            AsyncStatus::Pending
        } else if self.behavior.cancel_at == Some(step) {
            AsyncStatus::Cancelled
        } else {
            AsyncStatus::Finished
        };
        self.log.state.lock().operations_created += 1;
        Ok(Some(FakeOperation {
            outcome,
            failing_queries: self.behavior.transient_status_errors,
            log: self.log.clone(),
        }))
    }
}

impl BackupSession for FakeSession {
    type Operation = FakeOperation;

    fn initialize_for_backup(&mut self) -> NativeResult<()> {
        self.sync_call(Step::InitializeForBackup)
    }

    fn set_context(&mut self, _context: VssContext) -> NativeResult<()> {
        self.sync_call(Step::SetContext)
    }

    fn set_backup_state(&mut self, _state: BackupState) -> NativeResult<()> {
        self.sync_call(Step::SetBackupState)
    }

    fn gather_writer_metadata(&mut self) -> NativeResult<Option<FakeOperation>> {
        self.async_call(Step::GatherWriterMetadata)
    }

    fn is_volume_supported(&mut self, volume: &str) -> NativeResult<bool> {
        self.sync_call(Step::IsVolumeSupported)?;
        Ok(!self
            .behavior
            .unsupported_volumes
            .iter()
            .any(|v| v.eq_ignore_ascii_case(volume)))
    }

    fn start_snapshot_set(&mut self) -> NativeResult<Uuid> {
        self.sync_call(Step::StartSnapshotSet)?;
        let id = Uuid::new_v4();
        self.snapshot_set_id = Some(id);
        Ok(id)
    }

    fn add_to_snapshot_set(&mut self, volume: &str) -> NativeResult<Uuid> {
        self.sync_call(Step::AddToSnapshotSet)?;
        let id = Uuid::new_v4();
        self.snapshots.push((id, volume.to_string()));
        self.log.state.lock().volumes.push(volume.to_string());
        Ok(id)
    }

    fn prepare_for_backup(&mut self) -> NativeResult<Option<FakeOperation>> {
        self.async_call(Step::PrepareForBackup)
    }

    fn do_snapshot_set(&mut self) -> NativeResult<Option<FakeOperation>> {
        self.async_call(Step::DoSnapshotSet)
    }

    fn snapshot_properties(&mut self, snapshot_id: Uuid) -> NativeResult<SnapshotProperties> {
        self.sync_call(Step::GetSnapshotProperties)?;
        let volume = self
            .snapshots
            .iter()
            .find(|(id, _)| *id == snapshot_id)
            .map(|(_, volume)| volume.clone())
            .ok_or(HResult::VSS_E_OBJECT_NOT_FOUND)?;

        let device = self.devices.fetch_add(1, Ordering::SeqCst) + 1;
        self.properties_held = true;
        Ok(SnapshotProperties {
            snapshot_id,
            snapshot_set_id: self.snapshot_set_id.unwrap_or_default(),
            snapshots_count: self.snapshots.len() as u32,
            device_object: format!("{}{}", self.behavior.device_prefix, device),
            original_volume_name: volume,
            created_at: Some(chrono::Utc::now()),
            ..SnapshotProperties::default()
        })
    }

    fn free_snapshot_properties(&mut self) -> Result<()> {
        self.log.record(Step::FreeSnapshotProperties);
        if !std::mem::take(&mut self.properties_held) {
            return Ok(());
        }
        if self.behavior.fail_free_properties {
            return Err(VssError::release(
                "snapshot properties",
                "scripted release failure",
            ));
        }
        Ok(())
    }

    fn backup_complete(&mut self) -> NativeResult<Option<FakeOperation>> {
        self.async_call(Step::BackupComplete)
    }

    fn abort_backup(&mut self) -> NativeResult<()> {
        self.sync_call(Step::AbortBackup)
    }

    fn delete_snapshot(&mut self, snapshot_id: Uuid) -> NativeResult<u32> {
        self.sync_call(Step::DeleteSnapshots)?;
        let before = self.snapshots.len();
        self.snapshots.retain(|(id, _)| *id != snapshot_id);
        if self.snapshots.len() == before {
            return Err(HResult::VSS_E_OBJECT_NOT_FOUND);
        }
        self.log.state.lock().deleted.push(snapshot_id);
        Ok(1)
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.log.state.lock().sessions_released += 1;
    }
}

// =============================================================================
// Operation
// =============================================================================

/// A scripted asynchronous operation
#[derive(Debug)]
pub struct FakeOperation {
    outcome: AsyncStatus,
    failing_queries: u32,
    log: CallLog,
}

impl AsyncOperation for FakeOperation {
    fn wait(&mut self, interval: Duration) -> NativeResult<()> {
        if self.outcome == AsyncStatus::Pending {
            std::thread::sleep(interval);
        }
        Ok(())
    }

    fn query_status(&mut self) -> NativeResult<AsyncStatus> {
        if self.failing_queries > 0 {
            self.failing_queries -= 1;
            return Err(HResult::E_UNEXPECTED);
        }
        Ok(self.outcome)
    }
}

impl Drop for FakeOperation {
    fn drop(&mut self) {
        self.log.state.lock().operations_released += 1;
    }
}
