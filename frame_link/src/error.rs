//! Error types for the FrameLink library
//!
//! This module defines the error types used throughout the library,
//! covering context creation, resource allocation, and the
//! backend/frontend presentation protocol.

use std::fmt;

/// Result type for FrameLink operations
pub type Result<T> = std::result::Result<T, Error>;

/// FrameLink errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (OpenGL, Direct3D, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (image, fence, transfer buffer, etc.)
    InvalidResource(String),

    /// Initialization failed (context provider, swapchain construction)
    InitializationFailed(String),

    /// The remote side of the transport sent a command that violates the
    /// presentation protocol (e.g. releasing an image that is not in flight)
    ProtocolViolation(String),

    /// Operation attempted on a swapchain that was disposed, locally or by
    /// the remote side
    Disposed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            Error::Disposed => write!(f, "Swapchain disposed"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
