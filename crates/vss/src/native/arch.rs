//! Process/OS word-size check
//!
//! The native API refuses to work from a 32-bit process on a 64-bit OS, so
//! such processes are turned away before any session is created.

use snapvol_core::Result;

/// Fails when the process word size differs from the OS word size
#[cfg(target_pointer_width = "64")]
pub(crate) fn check_architecture() -> Result<()> {
    Ok(())
}

/// Fails when the process word size differs from the OS word size
#[cfg(target_pointer_width = "32")]
pub(crate) fn check_architecture() -> Result<()> {
    use snapvol_core::VssError;
    use windows_sys::Win32::System::Threading::{GetCurrentProcess, IsWow64Process};

    let mut wow64 = 0;
    // SAFETY: the pseudo handle of the current process is always valid.
    let ok = unsafe { IsWow64Process(GetCurrentProcess(), &mut wow64) };
    if ok == 0 {
        return Err(VssError::ArchitectureDetection(
            std::io::Error::last_os_error().to_string(),
        ));
    }
    if wow64 != 0 {
        return Err(VssError::ArchitectureMismatch {
            process_arch: "32-bit",
        });
    }
    Ok(())
}
