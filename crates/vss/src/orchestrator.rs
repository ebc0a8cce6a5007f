//! Snapshot orchestrator
//!
//! Drives one native session through the fixed creation protocol for one
//! volume. The protocol is the explicit list `CREATION_SEQUENCE`; each step is
//! checked before the next begins and the first failure aborts the attempt.
//!
//! ## Creation Sequence
//!
//! ```text
//!  0. platform check (process word size == OS word size)
//!  1. CreateVssBackupComponents
//!  2. InitializeForBackup
//!  3. SetContext(Backup)
//!  4. SetBackupState(no components, no system state, Copy, no partial files)
//!  5. GatherWriterMetadata          (async)
//!  6. IsVolumeSupported
//!  7. StartSnapshotSet              -> snapshot set id
//!  8. AddToSnapshotSet              -> snapshot id
//!  9. PrepareForBackup              (async)
//! 10. DoSnapshotSet                 (async; the point-in-time copy)
//! 11. GetSnapshotProperties         -> device object root
//! ```
//!
//! On failure after step 7 the partial backup is aborted (best effort). The
//! session is released on every failure path; on success it moves into the
//! returned `Snapshot` and stays open until deletion.

use crate::provider::SnapshotProvider;
use crate::session::{BackupSession, BackupState, SessionFactory, VssContext};
use crate::snapshot::Snapshot;
use crate::wait::run_async_step;
use snapvol_core::{
    HResult, Result, SnapshotProperties, SnapvolConfig, Step, VssError, DEFAULT_POLL_INTERVAL_MS,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Steps executed by `VssOrchestrator::create`, in order
pub const CREATION_SEQUENCE: [Step; 11] = [
    Step::CreateSession,
    Step::InitializeForBackup,
    Step::SetContext,
    Step::SetBackupState,
    Step::GatherWriterMetadata,
    Step::IsVolumeSupported,
    Step::StartSnapshotSet,
    Step::AddToSnapshotSet,
    Step::PrepareForBackup,
    Step::DoSnapshotSet,
    Step::GetSnapshotProperties,
];

/// Creates snapshots through sessions obtained from a `SessionFactory`
#[derive(Debug, Clone)]
pub struct VssOrchestrator<F> {
    factory: F,
    poll_interval: Duration,
}

impl<F: SessionFactory> VssOrchestrator<F> {
    /// Create an orchestrator polling asynchronous steps every 100ms
    pub fn new(factory: F) -> Self {
        Self::with_poll_interval(factory, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Create an orchestrator with a custom poll interval
    pub fn with_poll_interval(factory: F, poll_interval: Duration) -> Self {
        Self {
            factory,
            poll_interval,
        }
    }

    /// Create an orchestrator using the poll interval from `config`
    pub fn from_config(factory: F, config: &SnapvolConfig) -> Self {
        Self::with_poll_interval(factory, config.poll_interval())
    }

    /// The session factory
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Interval between status polls
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Snapshot `volume`, allowing `timeout` for each asynchronous step.
    ///
    /// `volume` may be given with or without its trailing separator
    /// (`C:` or `C:\`).
    ///
    /// # Errors
    ///
    /// Returns the first failure of the protocol; no snapshot exists then.
    pub fn create(&self, volume: &str, timeout: Duration) -> Result<Snapshot<F::Session>> {
        self.factory.platform_check()?;

        let volume = volume_root(volume);
        let started = Instant::now();
        info!(target: "snapvol::vss", %volume, timeout_secs = timeout.as_secs(), "Creating snapshot");

        let mut attempt = CreationAttempt {
            factory: &self.factory,
            volume,
            timeout,
            poll_interval: self.poll_interval,
            session: None,
            snapshot_set_id: None,
            snapshot_id: None,
            properties: None,
        };

        for step in CREATION_SEQUENCE {
            debug!(target: "snapvol::vss", volume = %attempt.volume, %step, "Running step");
            if let Err(error) = attempt.run_step(step) {
                attempt.abandon(&error);
                return Err(error);
            }
        }

        let snapshot = attempt.finish()?;
        info!(
            target: "snapvol::vss",
            volume = %snapshot.volume(),
            root = %snapshot.root_path(),
            snapshot_id = %snapshot.snapshot_id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Snapshot created"
        );
        Ok(snapshot)
    }
}

impl<F: SessionFactory> SnapshotProvider for VssOrchestrator<F> {
    type Snapshot = Snapshot<F::Session>;

    fn create(&self, volume: &str, timeout: Duration) -> Result<Self::Snapshot> {
        VssOrchestrator::create(self, volume, timeout)
    }
}

/// Normalise a volume name to its root form with a trailing separator
fn volume_root(volume: &str) -> String {
    if volume.ends_with('\\') {
        volume.to_string()
    } else {
        format!("{}\\", volume)
    }
}

// =============================================================================
// Creation attempt
// =============================================================================

/// State accumulated by one run of the creation protocol
struct CreationAttempt<'a, F: SessionFactory> {
    factory: &'a F,
    volume: String,
    timeout: Duration,
    poll_interval: Duration,
    session: Option<F::Session>,
    snapshot_set_id: Option<Uuid>,
    snapshot_id: Option<Uuid>,
    properties: Option<SnapshotProperties>,
}

/// The session a step runs against; missing only if the sequence is misordered
fn session_for<S>(session: &mut Option<S>, step: Step) -> Result<&mut S> {
    session
        .as_mut()
        .ok_or_else(|| VssError::step(step, HResult::VSS_E_BAD_STATE))
}

impl<'a, F: SessionFactory> CreationAttempt<'a, F> {
    fn run_step(&mut self, step: Step) -> Result<()> {
        let timeout = self.timeout;
        let poll = self.poll_interval;
        let fail = |status: HResult| VssError::step(step, status);

        match step {
            Step::CreateSession => {
                self.session = Some(self.factory.create_session()?);
                Ok(())
            }
            Step::InitializeForBackup => session_for(&mut self.session, step)?
                .initialize_for_backup()
                .map_err(fail),
            Step::SetContext => session_for(&mut self.session, step)?
                .set_context(VssContext::Backup)
                .map_err(fail),
            Step::SetBackupState => session_for(&mut self.session, step)?
                .set_backup_state(BackupState::COPY)
                .map_err(fail),
            Step::GatherWriterMetadata => {
                let session = session_for(&mut self.session, step)?;
                run_async_step(step, session.gather_writer_metadata(), timeout, poll)
            }
            Step::IsVolumeSupported => {
                let session = session_for(&mut self.session, step)?;
                if session.is_volume_supported(&self.volume).map_err(fail)? {
                    Ok(())
                } else {
                    Err(VssError::VolumeNotSupported {
                        volume: self.volume.clone(),
                    })
                }
            }
            Step::StartSnapshotSet => {
                let session = session_for(&mut self.session, step)?;
                self.snapshot_set_id = Some(session.start_snapshot_set().map_err(fail)?);
                Ok(())
            }
            Step::AddToSnapshotSet => {
                let session = session_for(&mut self.session, step)?;
                self.snapshot_id = Some(session.add_to_snapshot_set(&self.volume).map_err(fail)?);
                Ok(())
            }
            Step::PrepareForBackup => {
                let session = session_for(&mut self.session, step)?;
                run_async_step(step, session.prepare_for_backup(), timeout, poll)
            }
            Step::DoSnapshotSet => {
                let session = session_for(&mut self.session, step)?;
                run_async_step(step, session.do_snapshot_set(), timeout, poll)
            }
            Step::GetSnapshotProperties => {
                let snapshot_id = self.snapshot_id.ok_or_else(|| fail(HResult::VSS_E_BAD_STATE))?;
                let session = session_for(&mut self.session, step)?;
                self.properties = Some(session.snapshot_properties(snapshot_id).map_err(fail)?);
                Ok(())
            }
            Step::FreeSnapshotProperties
            | Step::BackupComplete
            | Step::DeleteSnapshots
            | Step::AbortBackup => Err(fail(HResult::VSS_E_BAD_STATE)),
        }
    }

    /// Best-effort release of whatever this failed attempt acquired
    fn abandon(&mut self, error: &VssError) {
        warn!(target: "snapvol::vss", volume = %self.volume, %error, "Snapshot creation failed");

        let Some(mut session) = self.session.take() else {
            return;
        };
        if self.properties.take().is_some() {
            if let Err(release_error) = session.free_snapshot_properties() {
                warn!(target: "snapvol::vss", error = %release_error, "Failed to release snapshot properties");
            }
        }
        if self.snapshot_set_id.is_some() {
            if let Err(status) = session.abort_backup() {
                warn!(target: "snapvol::vss", %status, "AbortBackup() failed");
            }
        }
        drop(session);
    }

    fn finish(mut self) -> Result<Snapshot<F::Session>> {
        let bad_state = || VssError::step(Step::GetSnapshotProperties, HResult::VSS_E_BAD_STATE);
        let (Some(session), Some(snapshot_set_id), Some(snapshot_id), Some(properties)) = (
            self.session.take(),
            self.snapshot_set_id,
            self.snapshot_id,
            self.properties.take(),
        ) else {
            return Err(bad_state());
        };

        Ok(Snapshot::new(
            session,
            self.volume,
            snapshot_set_id,
            snapshot_id,
            properties,
            self.timeout,
            self.poll_interval,
        ))
    }
}
