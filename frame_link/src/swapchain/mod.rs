/// Swapchain module - producer and consumer halves of the frame exchange

// Module declarations
pub mod config;
pub mod mailbox;
pub mod pool;
pub mod backend;
pub mod frontend;

// Re-export everything from config.rs
pub use config::*;

// Re-export from the other modules
pub use mailbox::*;
pub use pool::*;
pub use backend::*;
pub use frontend::*;
