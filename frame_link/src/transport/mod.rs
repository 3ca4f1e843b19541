/// Transport module - the command channel between the swapchain halves

// Module declarations
pub mod command;
pub mod transport;

// Re-export everything from command.rs
pub use command::*;

// Re-export from transport.rs
pub use transport::*;
