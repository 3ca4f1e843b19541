/// GlDevice - OpenGL implementation of the GpuDevice resource seam

use frame_link::framelink::context::{GpuDevice, GpuFence, NoopFence, PixelFormat};
use frame_link::framelink::{Error, Result};
use frame_link::glam::UVec2;
use frame_link::{bridge_err, bridge_error, bridge_warn};
use glow::{HasContext, PixelPackData, PixelUnpackData};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::gl_context::SharedGl;
use crate::gl_fence::GlFence;

/// OpenGL resource device
///
/// Textures and transfer buffers are GL names carried as `u64` handles.
/// Every method must run on a thread where the wrapped context is current;
/// the swapchain executor pins device work to that thread.
pub struct GlDevice {
    /// Shared function table
    gl: Arc<SharedGl>,
    /// Scratch framebuffer for texture-to-buffer readback copies
    readback_fbo: Option<glow::NativeFramebuffer>,
    /// Fence sync objects are available (GL 3.2 / GLES 3.0)
    has_fences: bool,
}

impl GlDevice {
    pub(crate) fn new(gl: Arc<SharedGl>, has_fences: bool, has_readback: bool) -> Result<Self> {
        let readback_fbo = if has_readback {
            let fbo = unsafe { gl.create_framebuffer() }.map_err(|message| {
                bridge_err!("framelink::gl", "glGenFramebuffers failed: {}", message)
            })?;
            Some(fbo)
        } else {
            None
        };
        Ok(Self {
            gl,
            readback_fbo,
            has_fences,
        })
    }

    /// Check the GL error flag after an allocating call
    fn check_allocation(&self, what: &str) -> Result<()> {
        let error = unsafe { self.gl.get_error() };
        match error {
            glow::NO_ERROR => Ok(()),
            glow::OUT_OF_MEMORY => {
                bridge_error!("framelink::gl", "Out of GPU memory allocating {}", what);
                Err(Error::OutOfMemory)
            }
            other => Err(bridge_err!(
                "framelink::gl",
                "GL error {:#x} allocating {}",
                other,
                what
            )),
        }
    }
}

impl GpuDevice for GlDevice {
    fn create_texture(&self, size: UVec2, format: PixelFormat) -> Result<u64> {
        let gl = &self.gl;
        unsafe {
            let texture = gl.create_texture().map_err(|message| {
                bridge_err!("framelink::gl", "glGenTextures failed: {}", message)
            })?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                size.x as i32,
                size.y as i32,
                0,
                gl_format(format),
                glow::UNSIGNED_BYTE,
                None,
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
            if let Err(error) = self.check_allocation("texture storage") {
                gl.delete_texture(texture);
                return Err(error);
            }
            Ok(texture_handle(texture))
        }
    }

    fn destroy_texture(&self, texture: u64) {
        match texture_name(texture) {
            Ok(texture) => unsafe { self.gl.delete_texture(texture) },
            Err(_) => bridge_warn!(
                "framelink::gl",
                "Ignoring destroy of invalid texture handle {:#x}",
                texture
            ),
        }
    }

    fn upload_texture(
        &self,
        texture: u64,
        size: UVec2,
        format: PixelFormat,
        pixels: &[u8],
    ) -> Result<()> {
        let expected = format.byte_len(size);
        if pixels.len() != expected {
            return Err(Error::InvalidResource(format!(
                "upload of {} bytes into a {}x{} image expecting {}",
                pixels.len(),
                size.x,
                size.y,
                expected
            )));
        }
        let texture = texture_name(texture)?;
        let gl = &self.gl;
        unsafe {
            // The unpack source is the client slice, never a bound buffer.
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                size.x as i32,
                size.y as i32,
                gl_format(format),
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(pixels),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(())
    }

    fn create_transfer_buffer(&self, len: usize) -> Result<u64> {
        let size = byte_count(len)?;
        let gl = &self.gl;
        unsafe {
            let buffer = gl.create_buffer().map_err(|message| {
                bridge_err!("framelink::gl", "glGenBuffers failed: {}", message)
            })?;
            gl.bind_buffer(glow::PIXEL_PACK_BUFFER, Some(buffer));
            gl.buffer_data_size(glow::PIXEL_PACK_BUFFER, size, glow::STREAM_READ);
            gl.bind_buffer(glow::PIXEL_PACK_BUFFER, None);
            if let Err(error) = self.check_allocation("transfer buffer") {
                gl.delete_buffer(buffer);
                return Err(error);
            }
            Ok(buffer_handle(buffer))
        }
    }

    fn destroy_transfer_buffer(&self, buffer: u64) {
        match buffer_name(buffer) {
            Ok(buffer) => unsafe { self.gl.delete_buffer(buffer) },
            Err(_) => bridge_warn!(
                "framelink::gl",
                "Ignoring destroy of invalid buffer handle {:#x}",
                buffer
            ),
        }
    }

    fn enqueue_readback(
        &self,
        texture: u64,
        size: UVec2,
        format: PixelFormat,
        buffer: u64,
    ) -> Result<()> {
        let fbo = self.readback_fbo.ok_or_else(|| {
            Error::BackendError("pixel readback needs GL 3.0 or later".to_string())
        })?;
        let texture = texture_name(texture)?;
        let buffer = buffer_name(buffer)?;
        let gl = &self.gl;
        unsafe {
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(
                glow::READ_FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            let status = gl.check_framebuffer_status(glow::READ_FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.framebuffer_texture_2d(
                    glow::READ_FRAMEBUFFER,
                    glow::COLOR_ATTACHMENT0,
                    glow::TEXTURE_2D,
                    None,
                    0,
                );
                gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
                return Err(bridge_err!(
                    "framelink::gl",
                    "Readback framebuffer incomplete: {:#x}",
                    status
                ));
            }
            // With a pack buffer bound, glReadPixels becomes an asynchronous
            // GPU copy into the buffer at offset 0.
            gl.bind_buffer(glow::PIXEL_PACK_BUFFER, Some(buffer));
            gl.read_pixels(
                0,
                0,
                size.x as i32,
                size.y as i32,
                gl_format(format),
                glow::UNSIGNED_BYTE,
                PixelPackData::BufferOffset(0),
            );
            gl.bind_buffer(glow::PIXEL_PACK_BUFFER, None);
            gl.framebuffer_texture_2d(
                glow::READ_FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                None,
                0,
            );
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
        }
        Ok(())
    }

    fn map_transfer_buffer(&self, buffer: u64, len: usize) -> Result<*const u8> {
        let size = byte_count(len)?;
        let buffer = buffer_name(buffer)?;
        let gl = &self.gl;
        unsafe {
            gl.bind_buffer(glow::PIXEL_PACK_BUFFER, Some(buffer));
            let ptr = gl.map_buffer_range(glow::PIXEL_PACK_BUFFER, 0, size, glow::MAP_READ_BIT);
            gl.bind_buffer(glow::PIXEL_PACK_BUFFER, None);
            if ptr.is_null() {
                return Err(bridge_err!(
                    "framelink::gl",
                    "glMapBufferRange returned null for buffer {:#x}",
                    buffer_handle(buffer)
                ));
            }
            Ok(ptr as *const u8)
        }
    }

    fn unmap_transfer_buffer(&self, buffer: u64) {
        match buffer_name(buffer) {
            Ok(buffer) => unsafe {
                let gl = &self.gl;
                gl.bind_buffer(glow::PIXEL_PACK_BUFFER, Some(buffer));
                gl.unmap_buffer(glow::PIXEL_PACK_BUFFER);
                gl.bind_buffer(glow::PIXEL_PACK_BUFFER, None);
            },
            Err(_) => bridge_warn!(
                "framelink::gl",
                "Ignoring unmap of invalid buffer handle {:#x}",
                buffer
            ),
        }
    }

    fn open_shared_texture(&self, share_handle: u64, _size: UVec2) -> Result<u64> {
        // Share handles flow out of GL (through NV_DX_interop), never in;
        // negotiation never offers SharedHandle to a GL consumer.
        Err(bridge_err!(
            "framelink::gl",
            "The OpenGL provider cannot import share handle {:#x}",
            share_handle
        ))
    }

    fn create_fence(&self) -> Result<Box<dyn GpuFence>> {
        if !self.has_fences {
            return Ok(Box::new(NoopFence::new()));
        }
        let sync = unsafe { self.gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0) }
            .map_err(|message| bridge_err!("framelink::gl", "glFenceSync failed: {}", message))?;
        Ok(Box::new(GlFence::new(Arc::clone(&self.gl), sync)))
    }

    fn flush(&self) {
        unsafe { self.gl.flush() }
    }
}

/// GL client format for a swapchain pixel format (internal storage is RGBA8)
fn gl_format(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Rgba8 => glow::RGBA,
        PixelFormat::Bgra8 => glow::BGRA,
    }
}

fn texture_name(texture: u64) -> Result<glow::NativeTexture> {
    NonZeroU32::new(texture as u32)
        .map(glow::NativeTexture)
        .ok_or_else(|| Error::InvalidResource(format!("{:#x} is not a GL texture name", texture)))
}

fn texture_handle(texture: glow::NativeTexture) -> u64 {
    u64::from(texture.0.get())
}

fn buffer_name(buffer: u64) -> Result<glow::NativeBuffer> {
    NonZeroU32::new(buffer as u32)
        .map(glow::NativeBuffer)
        .ok_or_else(|| Error::InvalidResource(format!("{:#x} is not a GL buffer name", buffer)))
}

fn buffer_handle(buffer: glow::NativeBuffer) -> u64 {
    u64::from(buffer.0.get())
}

fn byte_count(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        Error::InvalidResource(format!("transfer of {} bytes exceeds the GL buffer limit", len))
    })
}
