/// Surface module - host-surface geometry helpers

// Module declarations
pub mod placement;

// Re-export everything from placement.rs
pub use placement::*;
