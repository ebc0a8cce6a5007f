//! Windows binding of the session seam
//!
//! - `library`: lazy load of `VssApi.dll` and its two exports
//! - `com`: vtable layouts, `NativeSession` and `NativeAsync`
//! - `arch`: word-size check

mod arch;
mod com;
mod library;

pub use com::{NativeAsync, NativeSession};

use crate::session::SessionFactory;
use snapvol_core::{HResult, Result, VssError};
use std::cell::Cell;
use windows_sys::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};

thread_local! {
    static COM_READY: Cell<bool> = const { Cell::new(false) };
}

/// Join the multithreaded apartment once per thread
///
/// Threads already initialised in another apartment are accepted as is.
/// COM is never uninitialised; the apartment lives as long as the thread.
fn ensure_com_initialized() -> Result<()> {
    COM_READY.with(|ready| {
        if ready.get() {
            return Ok(());
        }
        // SAFETY: reserved pointer must be null.
        let status = HResult::from_i32(unsafe {
            CoInitializeEx(std::ptr::null(), COINIT_MULTITHREADED as _)
        });
        match status {
            HResult::S_OK | HResult::S_FALSE | HResult::RPC_E_CHANGED_MODE => {
                ready.set(true);
                Ok(())
            }
            status => Err(VssError::ComInitialization { status }),
        }
    })
}

/// Sessions backed by the system volume shadow copy service
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSessionFactory;

impl NativeSessionFactory {
    /// Create the factory; nothing is loaded until first use
    pub fn new() -> Self {
        Self
    }
}

impl SessionFactory for NativeSessionFactory {
    type Session = NativeSession;

    fn platform_check(&self) -> Result<()> {
        arch::check_architecture()?;
        library::vss_api().map(|_| ())
    }

    fn create_session(&self) -> Result<NativeSession> {
        ensure_com_initialized()?;
        com::create_components()
    }
}
