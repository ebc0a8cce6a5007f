//! Raw COM layouts and the native session
//!
//! Vtables are declared in slot order. Slots the orchestrator never calls are
//! kept as plain `usize` placeholders so the offsets of the used slots match
//! the native layout; the backup components table is cut off after the last
//! slot in use.

use super::library::vss_api;
use crate::session::{
    AsyncOperation, AsyncStatus, BackupSession, BackupState, NativeResult, ObjectType,
    VssContext,
};
use snapvol_core::{filetime_to_datetime, HResult, Result, SnapshotProperties, VssError};
use std::ffi::c_void;
use std::ptr;
use std::time::Duration;
use uuid::Uuid;
use windows_sys::core::{GUID, HRESULT};

/// `IVssBackupComponents`
const IID_IVSS_BACKUP_COMPONENTS: GUID = GUID::from_u128(0x665c1d5f_c218_414d_a05d_7fef5f9d5c86);

/// `IVssAsync`
const IID_IVSS_ASYNC: GUID = GUID::from_u128(0x507c37b4_cf5b_4e95_b0af_14eb9767467e);

/// Default provider
const GUID_NULL: GUID = GUID::from_u128(0);

// =============================================================================
// Layouts
// =============================================================================

#[allow(dead_code)]
#[repr(C)]
pub(crate) struct IUnknownVtbl {
    query_interface:
        unsafe extern "system" fn(*mut c_void, *const GUID, *mut *mut c_void) -> HRESULT,
    add_ref: unsafe extern "system" fn(*mut c_void) -> u32,
    release: unsafe extern "system" fn(*mut c_void) -> u32,
}

/// Any interface pointer: the first field is always the vtable
#[repr(C)]
pub(crate) struct ComObject<V> {
    vtbl: *const V,
}

pub(crate) type RawUnknown = ComObject<IUnknownVtbl>;

#[allow(dead_code)]
#[repr(C)]
pub(crate) struct IVssBackupComponentsVtbl {
    base: IUnknownVtbl,
    get_writer_components_count: usize,
    get_writer_components: usize,
    initialize_for_backup: unsafe extern "system" fn(*mut c_void, *mut u16) -> HRESULT,
    set_backup_state: unsafe extern "system" fn(*mut c_void, bool, bool, i32, bool) -> HRESULT,
    initialize_for_restore: usize,
    set_restore_state: usize,
    gather_writer_metadata: unsafe extern "system" fn(*mut c_void, *mut *mut RawUnknown) -> HRESULT,
    get_writer_metadata_count: usize,
    get_writer_metadata: usize,
    free_writer_metadata: usize,
    add_component: usize,
    prepare_for_backup: unsafe extern "system" fn(*mut c_void, *mut *mut RawUnknown) -> HRESULT,
    abort_backup: unsafe extern "system" fn(*mut c_void) -> HRESULT,
    gather_writer_status: usize,
    get_writer_status_count: usize,
    free_writer_status: usize,
    get_writer_status: usize,
    set_backup_succeeded: usize,
    set_backup_options: usize,
    set_selected_for_restore: usize,
    set_restore_options: usize,
    set_additional_restores: usize,
    set_previous_backup_stamp: usize,
    save_as_xml: usize,
    backup_complete: unsafe extern "system" fn(*mut c_void, *mut *mut RawUnknown) -> HRESULT,
    add_alternative_location_mapping: usize,
    add_restore_subcomponent: usize,
    set_file_restore_status: usize,
    add_new_target: usize,
    set_ranges_file_path: usize,
    pre_restore: usize,
    post_restore: usize,
    set_context: unsafe extern "system" fn(*mut c_void, i32) -> HRESULT,
    start_snapshot_set: unsafe extern "system" fn(*mut c_void, *mut GUID) -> HRESULT,
    add_to_snapshot_set:
        unsafe extern "system" fn(*mut c_void, *const u16, GUID, *mut GUID) -> HRESULT,
    do_snapshot_set: unsafe extern "system" fn(*mut c_void, *mut *mut RawUnknown) -> HRESULT,
    delete_snapshots:
        unsafe extern "system" fn(*mut c_void, GUID, i32, i32, *mut i32, *mut GUID) -> HRESULT,
    import_snapshots: usize,
    break_snapshot_set: usize,
    get_snapshot_properties:
        unsafe extern "system" fn(*mut c_void, GUID, *mut VssSnapshotProp) -> HRESULT,
    query: usize,
    is_volume_supported:
        unsafe extern "system" fn(*mut c_void, GUID, *const u16, *mut i32) -> HRESULT,
}

#[allow(dead_code)]
#[repr(C)]
pub(crate) struct IVssAsyncVtbl {
    base: IUnknownVtbl,
    cancel: unsafe extern "system" fn(*mut c_void) -> HRESULT,
    wait: unsafe extern "system" fn(*mut c_void, u32) -> HRESULT,
    query_status: unsafe extern "system" fn(*mut c_void, *mut HRESULT, *mut i32) -> HRESULT,
}

/// `VSS_SNAPSHOT_PROP`
#[repr(C)]
pub(crate) struct VssSnapshotProp {
    snapshot_id: GUID,
    snapshot_set_id: GUID,
    snapshots_count: i32,
    snapshot_device_object: *mut u16,
    original_volume_name: *mut u16,
    originating_machine: *mut u16,
    service_machine: *mut u16,
    exposed_name: *mut u16,
    exposed_path: *mut u16,
    provider_id: GUID,
    snapshot_attributes: i32,
    creation_timestamp: i64,
    status: i32,
}

impl VssSnapshotProp {
    fn zeroed() -> Self {
        Self {
            snapshot_id: GUID_NULL,
            snapshot_set_id: GUID_NULL,
            snapshots_count: 0,
            snapshot_device_object: ptr::null_mut(),
            original_volume_name: ptr::null_mut(),
            originating_machine: ptr::null_mut(),
            service_machine: ptr::null_mut(),
            exposed_name: ptr::null_mut(),
            exposed_path: ptr::null_mut(),
            provider_id: GUID_NULL,
            snapshot_attributes: 0,
            creation_timestamp: 0,
            status: 0,
        }
    }

    /// Copy the record into owned Rust values
    ///
    /// # Safety
    ///
    /// Every string pointer must be null or a valid NUL-terminated wide string.
    unsafe fn to_properties(&self) -> SnapshotProperties {
        SnapshotProperties {
            snapshot_id: uuid_from_guid(&self.snapshot_id),
            snapshot_set_id: uuid_from_guid(&self.snapshot_set_id),
            snapshots_count: self.snapshots_count as u32,
            device_object: from_wide(self.snapshot_device_object),
            original_volume_name: from_wide(self.original_volume_name),
            originating_machine: from_wide(self.originating_machine),
            service_machine: from_wide(self.service_machine),
            exposed_name: from_wide(self.exposed_name),
            exposed_path: from_wide(self.exposed_path),
            provider_id: uuid_from_guid(&self.provider_id),
            attributes: self.snapshot_attributes as u32,
            created_at: filetime_to_datetime(self.creation_timestamp),
            status: self.status as u32,
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn guid_from_uuid(id: Uuid) -> GUID {
    let (data1, data2, data3, data4) = id.as_fields();
    GUID {
        data1,
        data2,
        data3,
        data4: *data4,
    }
}

fn uuid_from_guid(guid: &GUID) -> Uuid {
    Uuid::from_fields(guid.data1, guid.data2, guid.data3, &guid.data4)
}

fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated wide string.
unsafe fn from_wide(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
}

fn check(hr: HRESULT) -> NativeResult<()> {
    let status = HResult::from_i32(hr);
    if status.is_ok() {
        Ok(())
    } else {
        Err(status)
    }
}

// =============================================================================
// Interface handles
// =============================================================================

/// Owned interface pointer, released on drop
pub(crate) struct ComPtr<V> {
    raw: ptr::NonNull<ComObject<V>>,
}

impl<V> ComPtr<V> {
    fn this(&self) -> *mut c_void {
        self.raw.as_ptr().cast()
    }

    /// # Safety
    ///
    /// The pointer must be a live interface whose vtable is `V`.
    unsafe fn vtbl(&self) -> &V {
        &*(*self.raw.as_ptr()).vtbl
    }
}

impl<V> Drop for ComPtr<V> {
    fn drop(&mut self) {
        // SAFETY: every vtable starts with IUnknown and we own one reference.
        unsafe {
            let unknown = self.raw.as_ptr().cast::<RawUnknown>();
            ((*(*unknown).vtbl).release)(unknown.cast());
        }
    }
}

/// Ask `unknown` for interface `iid`, consuming the original reference
///
/// # Safety
///
/// `unknown` must be null or a live interface pointer owned by the caller.
unsafe fn query_interface<V>(unknown: *mut RawUnknown, iid: &GUID) -> NativeResult<Option<ComPtr<V>>> {
    let Some(unknown) = ptr::NonNull::new(unknown) else {
        return Ok(None);
    };
    let owned = ComPtr::<IUnknownVtbl> { raw: unknown };

    let mut out: *mut c_void = ptr::null_mut();
    let hr = (owned.vtbl().query_interface)(owned.this(), iid, &mut out);
    check(hr)?;
    Ok(ptr::NonNull::new(out.cast::<ComObject<V>>()).map(|raw| ComPtr { raw }))
}

// =============================================================================
// Session
// =============================================================================

/// Creates an `IVssBackupComponents` instance
pub(crate) fn create_components() -> Result<NativeSession> {
    let api = vss_api()?;

    let mut unknown: *mut RawUnknown = ptr::null_mut();
    // SAFETY: the constructor writes one owned interface pointer on success.
    let status = HResult::from_i32(unsafe { (api.create_components)(&mut unknown) });
    match status {
        HResult::S_OK => {}
        HResult::E_ACCESSDENIED => return Err(VssError::AccessDenied { status }),
        other => return Err(VssError::step(snapvol_core::Step::CreateSession, other)),
    }

    // SAFETY: `unknown` was just handed to us by the constructor.
    let components = unsafe { query_interface(unknown, &IID_IVSS_BACKUP_COMPONENTS) }
        .map_err(|status| VssError::step(snapvol_core::Step::CreateSession, status))?
        .ok_or_else(|| {
            VssError::step(snapvol_core::Step::CreateSession, HResult::E_NOINTERFACE)
        })?;

    Ok(NativeSession {
        components,
        properties: None,
    })
}

/// A live `IVssBackupComponents` session
pub struct NativeSession {
    components: ComPtr<IVssBackupComponentsVtbl>,
    properties: Option<VssSnapshotProp>,
}

// SAFETY: the session is created in the multithreaded apartment and is only
// ever used by one thread at a time through `&mut self`.
unsafe impl Send for NativeSession {}

impl NativeSession {
    fn vtbl(&self) -> &IVssBackupComponentsVtbl {
        // SAFETY: `components` is a live IVssBackupComponents pointer.
        unsafe { self.components.vtbl() }
    }

    fn start_async(
        &mut self,
        call: unsafe extern "system" fn(*mut c_void, *mut *mut RawUnknown) -> HRESULT,
    ) -> NativeResult<Option<NativeAsync>> {
        let mut unknown: *mut RawUnknown = ptr::null_mut();
        // SAFETY: the call writes one owned interface pointer on success.
        check(unsafe { call(self.components.this(), &mut unknown) })?;
        // A result object that is not an IVssAsync counts as missing.
        // SAFETY: ownership of `unknown` passes to query_interface.
        let operation = unsafe { query_interface(unknown, &IID_IVSS_ASYNC) }.unwrap_or(None);
        Ok(operation.map(|operation| NativeAsync { operation }))
    }

    fn release_properties(&mut self) -> Result<()> {
        let Some(mut properties) = self.properties.take() else {
            return Ok(());
        };
        vss_api()?.free_snapshot_properties(&mut properties)
    }
}

impl BackupSession for NativeSession {
    type Operation = NativeAsync;

    fn initialize_for_backup(&mut self) -> NativeResult<()> {
        // SAFETY: live session; a null XML document is allowed.
        check(unsafe {
            (self.vtbl().initialize_for_backup)(self.components.this(), ptr::null_mut())
        })
    }

    fn set_context(&mut self, context: VssContext) -> NativeResult<()> {
        // SAFETY: live session.
        check(unsafe { (self.vtbl().set_context)(self.components.this(), context as i32) })
    }

    fn set_backup_state(&mut self, state: BackupState) -> NativeResult<()> {
        // SAFETY: live session.
        check(unsafe {
            (self.vtbl().set_backup_state)(
                self.components.this(),
                state.select_components,
                state.backup_bootable_system_state,
                state.backup_type as i32,
                state.partial_file_support,
            )
        })
    }

    fn gather_writer_metadata(&mut self) -> NativeResult<Option<NativeAsync>> {
        let call = self.vtbl().gather_writer_metadata;
        self.start_async(call)
    }

    fn is_volume_supported(&mut self, volume: &str) -> NativeResult<bool> {
        let name = to_wide(volume);
        let mut supported: i32 = 0;
        // SAFETY: `name` is NUL-terminated and outlives the call.
        check(unsafe {
            (self.vtbl().is_volume_supported)(
                self.components.this(),
                GUID_NULL,
                name.as_ptr(),
                &mut supported,
            )
        })?;
        Ok(supported != 0)
    }

    fn start_snapshot_set(&mut self) -> NativeResult<Uuid> {
        let mut id = GUID_NULL;
        // SAFETY: live session; `id` is a valid out pointer.
        check(unsafe { (self.vtbl().start_snapshot_set)(self.components.this(), &mut id) })?;
        Ok(uuid_from_guid(&id))
    }

    fn add_to_snapshot_set(&mut self, volume: &str) -> NativeResult<Uuid> {
        let name = to_wide(volume);
        let mut id = GUID_NULL;
        // SAFETY: `name` is NUL-terminated and outlives the call.
        check(unsafe {
            (self.vtbl().add_to_snapshot_set)(
                self.components.this(),
                name.as_ptr(),
                GUID_NULL,
                &mut id,
            )
        })?;
        Ok(uuid_from_guid(&id))
    }

    fn prepare_for_backup(&mut self) -> NativeResult<Option<NativeAsync>> {
        let call = self.vtbl().prepare_for_backup;
        self.start_async(call)
    }

    fn do_snapshot_set(&mut self) -> NativeResult<Option<NativeAsync>> {
        let call = self.vtbl().do_snapshot_set;
        self.start_async(call)
    }

    fn snapshot_properties(&mut self, snapshot_id: Uuid) -> NativeResult<SnapshotProperties> {
        let mut raw = VssSnapshotProp::zeroed();
        // SAFETY: live session; `raw` is a valid out record.
        check(unsafe {
            (self.vtbl().get_snapshot_properties)(
                self.components.this(),
                guid_from_uuid(snapshot_id),
                &mut raw,
            )
        })?;
        // SAFETY: the record was filled by the call above.
        let properties = unsafe { raw.to_properties() };

        if let Err(error) = self.release_properties() {
            tracing::warn!(target: "snapvol::vss", %error, "Failed to release previous snapshot properties");
        }
        self.properties = Some(raw);
        Ok(properties)
    }

    fn free_snapshot_properties(&mut self) -> Result<()> {
        self.release_properties()
    }

    fn backup_complete(&mut self) -> NativeResult<Option<NativeAsync>> {
        let call = self.vtbl().backup_complete;
        self.start_async(call)
    }

    fn abort_backup(&mut self) -> NativeResult<()> {
        // SAFETY: live session.
        check(unsafe { (self.vtbl().abort_backup)(self.components.this()) })
    }

    fn delete_snapshot(&mut self, snapshot_id: Uuid) -> NativeResult<u32> {
        let mut deleted: i32 = 0;
        let mut not_deleted = GUID_NULL;
        // SAFETY: live session; both out pointers are valid.
        check(unsafe {
            (self.vtbl().delete_snapshots)(
                self.components.this(),
                guid_from_uuid(snapshot_id),
                ObjectType::Snapshot as i32,
                1,
                &mut deleted,
                &mut not_deleted,
            )
        })?;
        Ok(deleted.max(0) as u32)
    }
}

impl Drop for NativeSession {
    fn drop(&mut self) {
        if let Err(error) = self.release_properties() {
            tracing::warn!(target: "snapvol::vss", %error, "Failed to release snapshot properties");
        }
    }
}

// =============================================================================
// Async operation
// =============================================================================

/// A pending `IVssAsync` operation
pub struct NativeAsync {
    operation: ComPtr<IVssAsyncVtbl>,
}

impl AsyncOperation for NativeAsync {
    fn wait(&mut self, interval: Duration) -> NativeResult<()> {
        let millis = u32::try_from(interval.as_millis()).unwrap_or(u32::MAX);
        // SAFETY: live operation.
        check(unsafe { (self.operation.vtbl().wait)(self.operation.this(), millis) })
    }

    fn query_status(&mut self) -> NativeResult<AsyncStatus> {
        let mut status: HRESULT = 0;
        let mut reserved: i32 = 0;
        // SAFETY: live operation; both out pointers are valid.
        check(unsafe {
            (self.operation.vtbl().query_status)(self.operation.this(), &mut status, &mut reserved)
        })?;
        Ok(AsyncStatus::from_status(HResult::from_i32(status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_round_trip_keeps_field_order() {
        let id = Uuid::parse_str("665c1d5f-c218-414d-a05d-7fef5f9d5c86").unwrap();
        let guid = guid_from_uuid(id);
        assert_eq!(guid.data1, IID_IVSS_BACKUP_COMPONENTS.data1);
        assert_eq!(guid.data4, IID_IVSS_BACKUP_COMPONENTS.data4);
        assert_eq!(uuid_from_guid(&guid), id);
    }

    #[test]
    fn test_snapshot_prop_layout() {
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<VssSnapshotProp>(), 128);
        assert_eq!(std::mem::align_of::<VssSnapshotProp>(), std::mem::align_of::<i64>());
    }

    #[test]
    fn test_from_wide_stops_at_nul() {
        let wide = to_wide(r"\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopy7");
        assert_eq!(
            unsafe { from_wide(wide.as_ptr()) },
            r"\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopy7"
        );
        assert_eq!(unsafe { from_wide(ptr::null()) }, "");
    }
}
