/// GlContext - OpenGL implementation of the GpuContext seam

use frame_link::framelink::context::{
    ContextCaps, ContextConfig, ContextKind, GpuContext, GpuDevice, InteropDevice,
};
use frame_link::framelink::{Error, Result};
use frame_link::{bridge_debug, bridge_info};
use glow::HasContext;
use std::ops::Deref;
use std::sync::Arc;

use crate::debug;
use crate::gl_device::GlDevice;
#[cfg(target_os = "windows")]
use crate::wgl_interop::WglInterop;

/// Shared handle to the glow function table
///
/// The table is loaded once at context creation and then referenced by the
/// device, fences and debug output.
pub(crate) struct SharedGl(glow::Context);

// Safety: the function table itself is position-independent data. Every GL
// entry point is invoked on the thread where the host made the native
// context current (device calls are marshaled there by the swapchain
// executor); the wrapper is shared across threads only to route calls.
unsafe impl Send for SharedGl {}
unsafe impl Sync for SharedGl {}

impl Deref for SharedGl {
    type Target = glow::Context;

    fn deref(&self) -> &glow::Context {
        &self.0
    }
}

/// OpenGL context wrapper
///
/// Wraps a host-owned OpenGL context. The host keeps ownership of the native
/// context and its lifetime; this wrapper only loads the function table and
/// exposes the device seam over it.
pub struct GlContext {
    /// Capabilities detected at creation time
    caps: ContextCaps,
    /// Resource device over the shared function table
    device: Arc<GlDevice>,
    /// NV_DX_interop device (Windows only, when the extension is present)
    interop: Option<Arc<dyn InteropDevice>>,
}

impl GlContext {
    /// Wrap the current OpenGL context
    ///
    /// Must be called on the thread where the native context is current; the
    /// function table and version query happen here. `config.loader` is
    /// required (the host's `wglGetProcAddress`/`glXGetProcAddress` wrapper).
    ///
    /// Texture aliasing assumes the host created producer and consumer
    /// contexts in one share group, which is how GL-to-GL presentation
    /// works on every platform this provider targets.
    pub fn create(config: &ContextConfig) -> Result<Arc<dyn GpuContext>> {
        let loader = config.loader.as_ref().ok_or_else(|| {
            Error::InitializationFailed(
                "the OpenGL provider needs a proc-address loader".to_string(),
            )
        })?;

        // Safety: the host guarantees the native context is current on this
        // thread and the loader resolves its entry points.
        let mut gl = unsafe { glow::Context::from_loader_function(|symbol| loader(symbol)) };

        if config.enable_debug {
            debug::install(&mut gl);
        }

        let (major, minor, embedded) = {
            let version = gl.version();
            (version.major, version.minor, version.is_embedded)
        };
        // Fence sync objects arrived in GL 3.2 / GLES 3.0; pixel-pack
        // buffers with mapped reads in GL 3.0 / GLES 3.0.
        let has_fences = if embedded {
            major >= 3
        } else {
            major > 3 || (major == 3 && minor >= 2)
        };
        let has_readback = major >= 3;

        if !has_fences {
            bridge_debug!(
                "framelink::gl",
                "GL {}.{} has no fence sync, presents fall back to no-op fences",
                major,
                minor
            );
        }

        let gl = Arc::new(SharedGl(gl));
        let device = Arc::new(GlDevice::new(Arc::clone(&gl), has_fences, has_readback)?);

        #[cfg(target_os = "windows")]
        let interop = match WglInterop::open(loader) {
            Ok(interop) => Some(Arc::new(interop) as Arc<dyn InteropDevice>),
            Err(error) => {
                bridge_debug!("framelink::gl", "NV_DX_interop unavailable: {}", error);
                None
            }
        };
        #[cfg(not(target_os = "windows"))]
        let interop: Option<Arc<dyn InteropDevice>> = None;

        let mut caps = ContextCaps::TEXTURE_ALIAS;
        if has_readback {
            caps |= ContextCaps::PIXEL_READBACK;
        }
        if has_fences {
            caps |= ContextCaps::GPU_FENCES;
        }
        if interop.is_some() {
            caps |= ContextCaps::SHARE_EXPORT;
        }

        bridge_info!(
            "framelink::gl",
            "Wrapped OpenGL{} {}.{} context ({:?})",
            if embedded { " ES" } else { "" },
            major,
            minor,
            caps
        );

        Ok(Arc::new(Self {
            caps,
            device,
            interop,
        }))
    }
}

impl GpuContext for GlContext {
    fn kind(&self) -> ContextKind {
        ContextKind::OpenGl
    }

    fn caps(&self) -> ContextCaps {
        self.caps
    }

    fn device(&self) -> Arc<dyn GpuDevice> {
        self.device.clone()
    }

    fn interop(&self) -> Option<Arc<dyn InteropDevice>> {
        self.interop.clone()
    }
}
