//! Lazy, process-wide binding to `VssApi.dll`
//!
//! The library is loaded from the system directory only, once per process.
//! The session constructor is exported under its C++-decorated name, which
//! differs between 32-bit and 64-bit builds.

use super::com::{RawUnknown, VssSnapshotProp};
use once_cell::sync::OnceCell;
use snapvol_core::{Result, VssError};
use windows_sys::core::HRESULT;
use windows_sys::Win32::System::LibraryLoader::{
    GetProcAddress, LoadLibraryExW, LOAD_LIBRARY_SEARCH_SYSTEM32,
};

const LIBRARY: &str = "VssApi.dll";

#[cfg(target_pointer_width = "64")]
const CREATE_SYMBOL: &str = "?CreateVssBackupComponents@@YAJPEAPEAVIVssBackupComponents@@@Z";
#[cfg(target_pointer_width = "32")]
const CREATE_SYMBOL: &str = "?CreateVssBackupComponents@@YGJPAPAVIVssBackupComponents@@@Z";

const FREE_PROPERTIES_SYMBOL: &str = "VssFreeSnapshotProperties";

pub(crate) type CreateComponentsFn = unsafe extern "system" fn(*mut *mut RawUnknown) -> HRESULT;
pub(crate) type FreePropertiesFn = unsafe extern "system" fn(*mut VssSnapshotProp);

/// Entry points resolved from the library
pub(crate) struct VssApi {
    pub(crate) create_components: CreateComponentsFn,
    pub(crate) free_properties: Option<FreePropertiesFn>,
}

static VSS_API: OnceCell<VssApi> = OnceCell::new();

/// Load the library on first use and return its entry points
pub(crate) fn vss_api() -> Result<&'static VssApi> {
    VSS_API.get_or_try_init(load)
}

fn load() -> Result<VssApi> {
    let name: Vec<u16> = LIBRARY.encode_utf16().chain(std::iter::once(0)).collect();
    // SAFETY: `name` is a NUL-terminated wide string that outlives the call.
    let module = unsafe {
        LoadLibraryExW(
            name.as_ptr(),
            std::ptr::null_mut(),
            LOAD_LIBRARY_SEARCH_SYSTEM32,
        )
    };
    if module.is_null() {
        return Err(VssError::LibraryUnavailable {
            library: LIBRARY,
            reason: std::io::Error::last_os_error().to_string(),
        });
    }

    let lookup = |symbol: &'static str| {
        let c_name: Vec<u8> = symbol.bytes().chain(std::iter::once(0)).collect();
        // SAFETY: `module` is a loaded library handle that is never freed and
        // `c_name` is NUL-terminated.
        unsafe { GetProcAddress(module, c_name.as_ptr()) }
    };

    let create = lookup(CREATE_SYMBOL).ok_or(VssError::EntryPointMissing {
        library: LIBRARY,
        symbol: CREATE_SYMBOL,
    })?;
    let free = lookup(FREE_PROPERTIES_SYMBOL);

    tracing::debug!(target: "snapvol::vss", library = LIBRARY, "Loaded native library");

    // SAFETY: both exports have exactly these signatures in every shipped
    // version of the library.
    unsafe {
        Ok(VssApi {
            create_components: std::mem::transmute::<
                unsafe extern "system" fn() -> isize,
                CreateComponentsFn,
            >(create),
            free_properties: free.map(|f| {
                std::mem::transmute::<unsafe extern "system" fn() -> isize, FreePropertiesFn>(f)
            }),
        })
    }
}

impl VssApi {
    /// Release the strings owned by a properties record
    pub(crate) fn free_snapshot_properties(&self, properties: &mut VssSnapshotProp) -> Result<()> {
        let free = self.free_properties.ok_or(VssError::EntryPointMissing {
            library: LIBRARY,
            symbol: FREE_PROPERTIES_SYMBOL,
        })?;
        // SAFETY: `properties` was filled by GetSnapshotProperties and has not
        // been freed yet; the caller drops its copy afterwards.
        unsafe { free(properties) };
        Ok(())
    }
}
