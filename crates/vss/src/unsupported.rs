//! Session factory for platforms without volume shadow copies
//!
//! Every attempt fails the platform check, so no session is ever created.

use crate::session::{
    AsyncOperation, AsyncStatus, BackupSession, BackupState, NativeResult, SessionFactory,
    VssContext,
};
use snapvol_core::{Result, SnapshotProperties, VssError};
use std::time::Duration;
use uuid::Uuid;

/// Factory that reports the platform as unsupported
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedPlatform;

impl UnsupportedPlatform {
    /// Create the factory
    pub fn new() -> Self {
        Self
    }
}

/// Uninhabited session type; no value of it can exist
#[derive(Debug)]
pub enum NoSession {}

/// Uninhabited operation type; no value of it can exist
#[derive(Debug)]
pub enum NoOperation {}

impl SessionFactory for UnsupportedPlatform {
    type Session = NoSession;

    fn platform_check(&self) -> Result<()> {
        Err(VssError::Unsupported)
    }

    fn create_session(&self) -> Result<NoSession> {
        Err(VssError::Unsupported)
    }
}

impl AsyncOperation for NoOperation {
    fn wait(&mut self, _interval: Duration) -> NativeResult<()> {
        match *self {}
    }

    fn query_status(&mut self) -> NativeResult<AsyncStatus> {
        match *self {}
    }
}

impl BackupSession for NoSession {
    type Operation = NoOperation;

    fn initialize_for_backup(&mut self) -> NativeResult<()> {
        match *self {}
    }

    fn set_context(&mut self, _context: VssContext) -> NativeResult<()> {
        match *self {}
    }

    fn set_backup_state(&mut self, _state: BackupState) -> NativeResult<()> {
        match *self {}
    }

    fn gather_writer_metadata(&mut self) -> NativeResult<Option<NoOperation>> {
        match *self {}
    }

    fn is_volume_supported(&mut self, _volume: &str) -> NativeResult<bool> {
        match *self {}
    }

    fn start_snapshot_set(&mut self) -> NativeResult<Uuid> {
        match *self {}
    }

    fn add_to_snapshot_set(&mut self, _volume: &str) -> NativeResult<Uuid> {
        match *self {}
    }

    fn prepare_for_backup(&mut self) -> NativeResult<Option<NoOperation>> {
        match *self {}
    }

    fn do_snapshot_set(&mut self) -> NativeResult<Option<NoOperation>> {
        match *self {}
    }

    fn snapshot_properties(&mut self, _snapshot_id: Uuid) -> NativeResult<SnapshotProperties> {
        match *self {}
    }

    fn free_snapshot_properties(&mut self) -> Result<()> {
        match *self {}
    }

    fn backup_complete(&mut self) -> NativeResult<Option<NoOperation>> {
        match *self {}
    }

    fn abort_backup(&mut self) -> NativeResult<()> {
        match *self {}
    }

    fn delete_snapshot(&mut self, _snapshot_id: Uuid) -> NativeResult<u32> {
        match *self {}
    }
}
