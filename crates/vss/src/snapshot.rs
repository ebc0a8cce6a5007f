//! A created volume snapshot and its teardown
//!
//! A `Snapshot` only exists once every creation step succeeded. It owns the
//! live session until `delete` runs, which performs, in order:
//!
//! 1. release the properties record (always attempted)
//! 2. `BackupComplete`, waited on with the creation budget
//! 3. `DeleteSnapshots` for this snapshot
//! 4. release the session (unconditional)
//!
//! Every step runs even when an earlier one failed; the first error is
//! returned. `delete` takes the session out of the snapshot, so calling it
//! again is a no-op.

use crate::provider::VolumeSnapshot;
use crate::session::BackupSession;
use crate::wait::run_async_step;
use snapvol_core::{Result, SnapshotProperties, Step, VssError};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// A point-in-time copy of one volume
pub struct Snapshot<S: BackupSession> {
    session: Option<S>,
    volume: String,
    snapshot_set_id: Uuid,
    snapshot_id: Uuid,
    properties: SnapshotProperties,
    timeout: Duration,
    poll_interval: Duration,
}

impl<S: BackupSession> Snapshot<S> {
    pub(crate) fn new(
        session: S,
        volume: String,
        snapshot_set_id: Uuid,
        snapshot_id: Uuid,
        properties: SnapshotProperties,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            session: Some(session),
            volume,
            snapshot_set_id,
            snapshot_id,
            properties,
            timeout,
            poll_interval,
        }
    }

    /// Device object path that roots the snapshot contents
    pub fn root_path(&self) -> &str {
        &self.properties.device_object
    }

    /// Volume root the snapshot was taken of, e.g. `C:\`
    pub fn volume(&self) -> &str {
        &self.volume
    }

    /// Identifier of the snapshot set
    pub fn snapshot_set_id(&self) -> Uuid {
        self.snapshot_set_id
    }

    /// Identifier of the snapshot
    pub fn snapshot_id(&self) -> Uuid {
        self.snapshot_id
    }

    /// Properties reported by the provider at creation
    pub fn properties(&self) -> &SnapshotProperties {
        &self.properties
    }

    /// Budget used for each asynchronous step
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True once `delete` has run
    pub fn is_deleted(&self) -> bool {
        self.session.is_none()
    }

    /// Tear the snapshot down, returning the first error encountered
    pub fn delete(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        let mut first_error: Option<VssError> = None;
        let mut record = |error: VssError| {
            warn!(target: "snapvol::vss", volume = %self.volume, %error, "Snapshot teardown step failed");
            if first_error.is_none() {
                first_error = Some(error);
            }
        };

        if let Err(error) = session.free_snapshot_properties() {
            record(error);
        }

        if let Err(error) = run_async_step(
            Step::BackupComplete,
            session.backup_complete(),
            self.timeout,
            self.poll_interval,
        ) {
            record(error);
        }

        match session.delete_snapshot(self.snapshot_id) {
            Ok(deleted) => {
                info!(
                    target: "snapvol::vss",
                    volume = %self.volume,
                    snapshot_id = %self.snapshot_id,
                    deleted,
                    "Snapshot deleted"
                );
            }
            Err(status) => record(VssError::step(Step::DeleteSnapshots, status)),
        }

        drop(session);

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<S: BackupSession> VolumeSnapshot for Snapshot<S> {
    fn root_path(&self) -> &str {
        Snapshot::root_path(self)
    }

    fn delete(&mut self) -> Result<()> {
        Snapshot::delete(self)
    }
}

impl<S: BackupSession> Drop for Snapshot<S> {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!(
                target: "snapvol::vss",
                volume = %self.volume,
                snapshot_id = %self.snapshot_id,
                "Snapshot dropped without delete; releasing session"
            );
        }
    }
}

impl<S: BackupSession> fmt::Debug for Snapshot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("volume", &self.volume)
            .field("snapshot_set_id", &self.snapshot_set_id)
            .field("snapshot_id", &self.snapshot_id)
            .field("root_path", &self.properties.device_object)
            .field("timeout", &self.timeout)
            .field("deleted", &self.session.is_none())
            .finish()
    }
}
