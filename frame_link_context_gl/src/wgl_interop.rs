/// WglInterop - share-handle export through NV_DX_interop
///
/// Producer GL textures are bound to shared Direct3D 9Ex textures created on
/// an offscreen device owned by this module; the consumer opens the D3D
/// share handle on its own device. Lock/unlock brackets every producer frame
/// and replaces GPU fences on this path.
///
/// No Direct3D bindings crate is used: the module links the two entry points
/// it needs and types the three COM calls it makes.

use frame_link::framelink::context::{InteropDevice, InteropRegistration, ProcLoader};
use frame_link::framelink::{Error, Result};
use frame_link::glam::UVec2;
use frame_link::{bridge_debug, bridge_err, bridge_warn};
use rustc_hash::FxHashMap;
use std::ffi::c_void;
use std::sync::Mutex;

// Direct3D 9 SDK constants for the offscreen device and shared textures
const D3D_SDK_VERSION: u32 = 32;
const D3DADAPTER_DEFAULT: u32 = 0;
const D3DDEVTYPE_HAL: u32 = 1;
const D3DCREATE_FPU_PRESERVE: u32 = 0x02;
const D3DCREATE_MULTITHREADED: u32 = 0x04;
const D3DCREATE_HARDWARE_VERTEXPROCESSING: u32 = 0x40;
const D3DSWAPEFFECT_DISCARD: u32 = 1;
const D3DFMT_UNKNOWN: u32 = 0;
const D3DFMT_A8R8G8B8: u32 = 21;
const D3DUSAGE_RENDERTARGET: u32 = 0x01;
const D3DPOOL_DEFAULT: u32 = 0;

const WGL_ACCESS_READ_WRITE_NV: u32 = 0x0001;

#[link(name = "d3d9")]
extern "system" {
    fn Direct3DCreate9Ex(sdk_version: u32, out: *mut *mut c_void) -> i32;
}

#[link(name = "user32")]
extern "system" {
    fn GetDesktopWindow() -> *mut c_void;
}

/// D3DPRESENT_PARAMETERS, field for field
#[repr(C)]
struct PresentParameters {
    back_buffer_width: u32,
    back_buffer_height: u32,
    back_buffer_format: u32,
    back_buffer_count: u32,
    multi_sample_type: u32,
    multi_sample_quality: u32,
    swap_effect: u32,
    device_window: *mut c_void,
    windowed: i32,
    enable_auto_depth_stencil: i32,
    auto_depth_stencil_format: u32,
    flags: u32,
    fullscreen_refresh_rate_hz: u32,
    presentation_interval: u32,
}

/// IDirect3D9Ex::CreateDeviceEx (vtable slot 20)
type CreateDeviceExFn = unsafe extern "system" fn(
    this: *mut c_void,
    adapter: u32,
    device_type: u32,
    focus_window: *mut c_void,
    behavior_flags: u32,
    present_parameters: *mut PresentParameters,
    fullscreen_display_mode: *mut c_void,
    out_device: *mut *mut c_void,
) -> i32;

/// IDirect3DDevice9::CreateTexture (vtable slot 23)
type CreateTextureFn = unsafe extern "system" fn(
    this: *mut c_void,
    width: u32,
    height: u32,
    levels: u32,
    usage: u32,
    format: u32,
    pool: u32,
    out_texture: *mut *mut c_void,
    shared_handle: *mut *mut c_void,
) -> i32;

/// IUnknown::Release (vtable slot 2)
type ReleaseFn = unsafe extern "system" fn(this: *mut c_void) -> u32;

unsafe fn com_method(object: *mut c_void, slot: usize) -> *const c_void {
    let vtable = *(object as *mut *const *const c_void);
    *vtable.add(slot)
}

unsafe fn com_release(object: *mut c_void) {
    let release: ReleaseFn = std::mem::transmute(com_method(object, 2));
    release(object);
}

type WglDXOpenDeviceNV = unsafe extern "system" fn(dx_device: *mut c_void) -> *mut c_void;
type WglDXCloseDeviceNV = unsafe extern "system" fn(device: *mut c_void) -> i32;
type WglDXSetResourceShareHandleNV =
    unsafe extern "system" fn(dx_object: *mut c_void, share_handle: *mut c_void) -> i32;
type WglDXRegisterObjectNV = unsafe extern "system" fn(
    device: *mut c_void,
    dx_object: *mut c_void,
    name: u32,
    object_type: u32,
    access: u32,
) -> *mut c_void;
type WglDXUnregisterObjectNV =
    unsafe extern "system" fn(device: *mut c_void, object: *mut c_void) -> i32;
type WglDXLockObjectsNV =
    unsafe extern "system" fn(device: *mut c_void, count: i32, objects: *mut *mut c_void) -> i32;
type WglDXUnlockObjectsNV =
    unsafe extern "system" fn(device: *mut c_void, count: i32, objects: *mut *mut c_void) -> i32;

/// NV_DX_interop entry points resolved through the host loader
struct WglDxTable {
    open_device: WglDXOpenDeviceNV,
    close_device: WglDXCloseDeviceNV,
    set_resource_share_handle: WglDXSetResourceShareHandleNV,
    register_object: WglDXRegisterObjectNV,
    unregister_object: WglDXUnregisterObjectNV,
    lock_objects: WglDXLockObjectsNV,
    unlock_objects: WglDXUnlockObjectsNV,
}

impl WglDxTable {
    fn load(loader: &ProcLoader) -> Result<Self> {
        unsafe {
            Ok(Self {
                open_device: load_fn(loader, "wglDXOpenDeviceNV")?,
                close_device: load_fn(loader, "wglDXCloseDeviceNV")?,
                set_resource_share_handle: load_fn(loader, "wglDXSetResourceShareHandleNV")?,
                register_object: load_fn(loader, "wglDXRegisterObjectNV")?,
                unregister_object: load_fn(loader, "wglDXUnregisterObjectNV")?,
                lock_objects: load_fn(loader, "wglDXLockObjectsNV")?,
                unlock_objects: load_fn(loader, "wglDXUnlockObjectsNV")?,
            })
        }
    }
}

unsafe fn load_fn<T>(loader: &ProcLoader, name: &str) -> Result<T> {
    let ptr = loader(name);
    if ptr.is_null() {
        return Err(Error::InitializationFailed(format!("{} not available", name)));
    }
    Ok(std::mem::transmute_copy(&ptr))
}

/// Interop device over one offscreen Direct3D 9Ex device
///
/// Native pointers are carried as `u64` so the device can cross threads;
/// every call still runs on the producer's context thread.
pub(crate) struct WglInterop {
    wgl: WglDxTable,
    /// IDirect3DDevice9Ex backing the shared textures
    dx_device: u64,
    /// Handle from wglDXOpenDeviceNV
    interop_device: u64,
    /// Registered object handle -> backing D3D texture
    registrations: Mutex<FxHashMap<u64, u64>>,
}

impl WglInterop {
    pub(crate) fn open(loader: &ProcLoader) -> Result<Self> {
        let wgl = WglDxTable::load(loader)?;
        unsafe {
            let dx_device = create_offscreen_device()?;
            let interop_device = (wgl.open_device)(dx_device as *mut c_void);
            if interop_device.is_null() {
                com_release(dx_device as *mut c_void);
                return Err(Error::InitializationFailed(
                    "wglDXOpenDeviceNV failed".to_string(),
                ));
            }
            bridge_debug!("framelink::gl", "NV_DX_interop device open");
            Ok(Self {
                wgl,
                dx_device,
                interop_device: interop_device as u64,
                registrations: Mutex::new(FxHashMap::default()),
            })
        }
    }
}

/// Create the offscreen Direct3D 9Ex device backing shared textures
unsafe fn create_offscreen_device() -> Result<u64> {
    let mut d3d: *mut c_void = std::ptr::null_mut();
    let hr = Direct3DCreate9Ex(D3D_SDK_VERSION, &mut d3d);
    if hr < 0 || d3d.is_null() {
        return Err(Error::InitializationFailed(format!(
            "Direct3DCreate9Ex failed: {:#x}",
            hr
        )));
    }
    let window = GetDesktopWindow();
    let mut params = PresentParameters {
        back_buffer_width: 1,
        back_buffer_height: 1,
        back_buffer_format: D3DFMT_UNKNOWN,
        back_buffer_count: 1,
        multi_sample_type: 0,
        multi_sample_quality: 0,
        swap_effect: D3DSWAPEFFECT_DISCARD,
        device_window: window,
        windowed: 1,
        enable_auto_depth_stencil: 0,
        auto_depth_stencil_format: D3DFMT_UNKNOWN,
        flags: 0,
        fullscreen_refresh_rate_hz: 0,
        presentation_interval: 0,
    };
    let create_device: CreateDeviceExFn = std::mem::transmute(com_method(d3d, 20));
    let mut device: *mut c_void = std::ptr::null_mut();
    let hr = create_device(
        d3d,
        D3DADAPTER_DEFAULT,
        D3DDEVTYPE_HAL,
        window,
        D3DCREATE_HARDWARE_VERTEXPROCESSING | D3DCREATE_MULTITHREADED | D3DCREATE_FPU_PRESERVE,
        &mut params,
        std::ptr::null_mut(),
        &mut device,
    );
    com_release(d3d);
    if hr < 0 || device.is_null() {
        return Err(Error::InitializationFailed(format!(
            "IDirect3D9Ex::CreateDeviceEx failed: {:#x}",
            hr
        )));
    }
    Ok(device as u64)
}

impl InteropDevice for WglInterop {
    fn register_texture(&self, texture: u64, size: UVec2) -> Result<InteropRegistration> {
        unsafe {
            // CreateTexture with a non-null pSharedHandle yields the share
            // handle the consumer side opens.
            let create_texture: CreateTextureFn =
                std::mem::transmute(com_method(self.dx_device as *mut c_void, 23));
            let mut dx_texture: *mut c_void = std::ptr::null_mut();
            let mut share_handle: *mut c_void = std::ptr::null_mut();
            let hr = create_texture(
                self.dx_device as *mut c_void,
                size.x,
                size.y,
                1,
                D3DUSAGE_RENDERTARGET,
                D3DFMT_A8R8G8B8,
                D3DPOOL_DEFAULT,
                &mut dx_texture,
                &mut share_handle,
            );
            if hr < 0 || dx_texture.is_null() {
                return Err(bridge_err!(
                    "framelink::gl",
                    "Shared CreateTexture failed: {:#x}",
                    hr
                ));
            }
            if (self.wgl.set_resource_share_handle)(dx_texture, share_handle) == 0 {
                com_release(dx_texture);
                return Err(bridge_err!(
                    "framelink::gl",
                    "wglDXSetResourceShareHandleNV failed for texture {:#x}",
                    texture
                ));
            }
            let object = (self.wgl.register_object)(
                self.interop_device as *mut c_void,
                dx_texture,
                texture as u32,
                glow::TEXTURE_2D,
                WGL_ACCESS_READ_WRITE_NV,
            );
            if object.is_null() {
                com_release(dx_texture);
                return Err(bridge_err!(
                    "framelink::gl",
                    "wglDXRegisterObjectNV failed for texture {:#x}",
                    texture
                ));
            }
            self.registrations
                .lock()
                .unwrap()
                .insert(object as u64, dx_texture as u64);
            Ok(InteropRegistration {
                object: object as u64,
                share_handle: share_handle as u64,
            })
        }
    }

    fn lock(&self, object: u64) -> Result<()> {
        let mut handle = object as *mut c_void;
        let ok =
            unsafe { (self.wgl.lock_objects)(self.interop_device as *mut c_void, 1, &mut handle) };
        if ok == 0 {
            return Err(bridge_err!(
                "framelink::gl",
                "wglDXLockObjectsNV failed for object {:#x}",
                object
            ));
        }
        Ok(())
    }

    fn unlock(&self, object: u64) -> Result<()> {
        let mut handle = object as *mut c_void;
        let ok = unsafe {
            (self.wgl.unlock_objects)(self.interop_device as *mut c_void, 1, &mut handle)
        };
        if ok == 0 {
            return Err(bridge_err!(
                "framelink::gl",
                "wglDXUnlockObjectsNV failed for object {:#x}",
                object
            ));
        }
        Ok(())
    }

    fn unregister_texture(&self, object: u64) {
        unsafe {
            let ok = (self.wgl.unregister_object)(
                self.interop_device as *mut c_void,
                object as *mut c_void,
            );
            if ok == 0 {
                bridge_warn!(
                    "framelink::gl",
                    "wglDXUnregisterObjectNV failed for object {:#x}",
                    object
                );
            }
            if let Some(dx_texture) = self.registrations.lock().unwrap().remove(&object) {
                com_release(dx_texture as *mut c_void);
            }
        }
    }
}

impl Drop for WglInterop {
    fn drop(&mut self) {
        unsafe {
            (self.wgl.close_device)(self.interop_device as *mut c_void);
            com_release(self.dx_device as *mut c_void);
        }
    }
}
