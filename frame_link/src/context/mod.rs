/// Context module - native context and device seams between the swapchain
/// core and backend plugins

// Module declarations
pub mod device;
pub mod fence;
pub mod provider;
pub mod executor;

// Mock backend for unit tests (no GPU required)
#[cfg(test)]
pub mod mock_context;

// Re-export everything from the seam modules
pub use device::*;
pub use fence::*;
pub use provider::*;
pub use executor::*;
