/*!
# Frame Link

Core types and traits for cross-context GPU frame sharing.

This crate moves rendered frames from a producer graphics context into a
consumer context living in another thread or API, using trait-based dynamic
polymorphism over the native resources involved. Backend implementations
(OpenGL, Direct3D, etc.) are registered at runtime via the provider system.

## Architecture

- **Bridge**: entry point for creating contexts and installing the logger
- **GpuContext / GpuDevice**: native context, resource, and fence seams
- **SwapImage**: pooled image with a per-backend sharing strategy
- **BackendSwapchain**: producer half; acquire/present over a fixed pool
- **FrontendSwapchain**: consumer half; mailbox of the newest presentable frame
- **Transport**: bidirectional command channel linking the halves

Backend implementations provide concrete types that implement the context
traits and register a `ContextProvider`.
*/

// Internal modules
mod error;
mod bridge;
pub mod log;
pub mod context;
pub mod image;
pub mod swapchain;
pub mod transport;
pub mod surface;

// Main framelink namespace module
pub mod framelink {
    // Error types
    pub use crate::error::{Error, Result};

    // Bridge facade
    pub use crate::bridge::Bridge;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // Note: bridge_* macros are NOT re-exported here - they are internal only
    }

    // Context sub-module with the backend seams
    pub mod context {
        pub use crate::context::*;
    }

    // Image sub-module
    pub mod image {
        pub use crate::image::*;
    }

    // Swapchain sub-module with both halves
    pub mod swapchain {
        pub use crate::swapchain::*;
    }

    // Transport sub-module
    pub mod transport {
        pub use crate::transport::*;
    }

    // Surface geometry sub-module
    pub mod surface {
        pub use crate::surface::*;
    }
}

// Re-export math library at crate root
pub use glam;
