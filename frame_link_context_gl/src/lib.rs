/*!
# FrameLink - OpenGL Context Provider

OpenGL implementation of the FrameLink context seam.

This crate wraps a host-owned OpenGL context behind the `GpuContext` and
`GpuDevice` traits using the glow bindings. The host supplies a proc-address
loader (`wglGetProcAddress`, `glXGetProcAddress` or equivalent); the provider
never creates or owns a native context itself.

On Windows the provider can additionally export producer textures as
platform share handles through the NV_DX_interop extension, which lets a
Direct3D consumer display producer images without a pixel copy.

The provider registers under the name "opengl".
*/

// OpenGL implementation modules
mod debug;
mod gl_context;
mod gl_device;
mod gl_fence;
#[cfg(target_os = "windows")]
mod wgl_interop;

pub use gl_context::GlContext;
pub use gl_device::GlDevice;
pub use gl_fence::GlFence;

// Re-export debug utilities
pub use debug::{debug_message_stats, print_debug_message_report, DebugMessageStats};

/// Register the OpenGL provider with the context registry
///
/// # Example
///
/// ```no_run
/// use frame_link::framelink::context::{ContextConfig, ProcLoader};
/// use frame_link::framelink::Bridge;
/// use std::sync::Arc;
///
/// frame_link_context_gl::register();
///
/// // The host wraps its native loader (wglGetProcAddress, glXGetProcAddress, ...)
/// let loader: ProcLoader = Arc::new(|_name| std::ptr::null());
///
/// let config = ContextConfig::new("opengl").with_loader(loader);
/// let context = Bridge::create_context(&config)?;
/// # Ok::<(), frame_link::framelink::Error>(())
/// ```
pub fn register() {
    frame_link::framelink::context::register_context_provider("opengl", |config| {
        GlContext::create(config)
    });
}
