//! Native context and device abstractions
//!
//! These traits are the seam between the API-agnostic swapchain core and the
//! backend plugins (OpenGL provider, test mock). A `GpuContext` describes one
//! native rendering context; its `GpuDevice` performs the resource work the
//! image strategies need. Cross-API sharing goes through `InteropDevice`, an
//! owned handle created once per context rather than process-wide state.

use bitflags::bitflags;
use glam::UVec2;
use std::sync::Arc;

use crate::context::fence::GpuFence;
use crate::error::Result;

/// Native graphics API family of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// OpenGL (desktop or ES)
    OpenGl,
    /// Direct3D (9 or 11 style consumer pipelines)
    Direct3d,
    /// Metal
    Metal,
    /// CPU/software pipeline (no GPU sharing possible)
    Software,
}

bitflags! {
    /// Capabilities a context reports at creation time
    ///
    /// Transfer-mode selection inspects these once per swapchain; they never
    /// change during the life of a context.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContextCaps: u32 {
        /// Texture names can be aliased by another context of the same kind
        const TEXTURE_ALIAS  = 1 << 0;
        /// Can export textures as platform share handles
        const SHARE_EXPORT   = 1 << 1;
        /// Can import platform share handles as textures
        const SHARE_IMPORT   = 1 << 2;
        /// Supports asynchronous pixel readback through transfer buffers
        const PIXEL_READBACK = 1 << 3;
        /// Supports real GPU fences (otherwise NoopFence is used)
        const GPU_FENCES     = 1 << 4;
    }
}

/// Pixel format of swapchain images
///
/// Both formats are 4 bytes per pixel; the byte order is chosen by the
/// consumer (Direct3D-backed hosts want Bgra8, everything else Rgba8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
}

impl PixelFormat {
    /// Bytes per pixel for this format
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }

    /// Byte length of a tightly packed image of `size` pixels
    pub fn byte_len(self, size: UVec2) -> usize {
        size.x as usize * size.y as usize * self.bytes_per_pixel()
    }
}

/// One native rendering context
///
/// Implemented by backend plugins. A swapchain involves two of these: the
/// producer's context (where images are rendered) and the consumer's context
/// (where they are displayed).
pub trait GpuContext: Send + Sync {
    /// Graphics API family
    fn kind(&self) -> ContextKind;

    /// Capabilities reported by the native context
    fn caps(&self) -> ContextCaps;

    /// Device performing resource operations on this context
    ///
    /// Device calls must run on a thread where the native context is
    /// current; marshaling onto that thread is the caller's job (see
    /// `ContextExecutor`).
    fn device(&self) -> Arc<dyn GpuDevice>;

    /// Cross-API interop device, when the platform supports one
    fn interop(&self) -> Option<Arc<dyn InteropDevice>>;
}

/// Resource operations on one native context
///
/// Textures and transfer buffers are identified by opaque `u64` names so the
/// core never depends on backend handle types.
pub trait GpuDevice: Send + Sync {
    /// Create a 2D texture sized `size`
    fn create_texture(&self, size: UVec2, format: PixelFormat) -> Result<u64>;

    /// Destroy a texture created by this device
    fn destroy_texture(&self, texture: u64);

    /// Upload tightly packed pixels into a texture
    fn upload_texture(
        &self,
        texture: u64,
        size: UVec2,
        format: PixelFormat,
        pixels: &[u8],
    ) -> Result<()>;

    /// Create a transfer buffer for asynchronous readback, `len` bytes
    fn create_transfer_buffer(&self, len: usize) -> Result<u64>;

    /// Destroy a transfer buffer
    fn destroy_transfer_buffer(&self, buffer: u64);

    /// Enqueue a GPU copy of `texture` into `buffer`
    ///
    /// Returns as soon as the copy is queued; completion is observed through
    /// a fence created after this call.
    fn enqueue_readback(
        &self,
        texture: u64,
        size: UVec2,
        format: PixelFormat,
        buffer: u64,
    ) -> Result<()>;

    /// Map a transfer buffer for CPU reads
    ///
    /// The pointer stays valid until `unmap_transfer_buffer`. Use
    /// `TransferMapping::map` to get unmapping on every exit path.
    fn map_transfer_buffer(&self, buffer: u64, len: usize) -> Result<*const u8>;

    /// Unmap a transfer buffer previously mapped
    fn unmap_transfer_buffer(&self, buffer: u64);

    /// Import a platform share handle as a texture on this context
    fn open_shared_texture(&self, share_handle: u64, size: UVec2) -> Result<u64>;

    /// Create a fence capturing the current command stream position
    fn create_fence(&self) -> Result<Box<dyn GpuFence>>;

    /// Make all queued commands visible to other contexts
    fn flush(&self);
}

/// Cross-API sharing operations for native-handle interop
///
/// The producer registers its texture and brackets every render pass with
/// `lock`/`unlock`; the consumer opens the share handle through its own
/// `GpuDevice::open_shared_texture`. Registration or lock failures make the
/// image unusable; callers treat them as fatal.
pub trait InteropDevice: Send + Sync {
    /// Register a producer texture for sharing
    fn register_texture(&self, texture: u64, size: UVec2) -> Result<InteropRegistration>;

    /// Acquire the device-level lock on a registered object
    fn lock(&self, object: u64) -> Result<()>;

    /// Release the device-level lock on a registered object
    fn unlock(&self, object: u64) -> Result<()>;

    /// Drop a registration created by `register_texture`
    fn unregister_texture(&self, object: u64);
}

/// Result of registering a texture with an `InteropDevice`
#[derive(Debug, Clone, Copy)]
pub struct InteropRegistration {
    /// Device-local object used for lock/unlock/unregister
    pub object: u64,
    /// Platform share handle the consumer side opens
    pub share_handle: u64,
}

/// RAII guard over a mapped transfer buffer
///
/// Unmaps in `drop`, so mapped buffers are released on every exit path,
/// including early returns on copy errors.
pub struct TransferMapping<'a> {
    device: &'a dyn GpuDevice,
    buffer: u64,
    ptr: *const u8,
    len: usize,
}

impl<'a> TransferMapping<'a> {
    /// Map `buffer` for reading
    pub fn map(device: &'a dyn GpuDevice, buffer: u64, len: usize) -> Result<Self> {
        let ptr = device.map_transfer_buffer(buffer, len)?;
        Ok(Self {
            device,
            buffer,
            ptr,
            len,
        })
    }

    /// Mapped bytes
    pub fn bytes(&self) -> &[u8] {
        // Safety: the device keeps `ptr` valid for `len` bytes until the
        // buffer is unmapped, which only happens in drop.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl Drop for TransferMapping<'_> {
    fn drop(&mut self) {
        self.device.unmap_transfer_buffer(self.buffer);
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
