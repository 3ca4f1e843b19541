//! GPU fence abstraction
//!
//! A fence marks a position in the producer's command stream. The backend
//! swapchain creates one fence per present, waits on it once, then disposes
//! it. Backends without real fences supply `NoopFence`, which is correct
//! only when their sharing strategy serializes access some other way (the
//! interop lock/unlock pair).

use std::time::Duration;

use crate::error::{Error, Result};

/// Outcome of a CPU-side fence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The fence was already signaled when the wait started
    AlreadySignaled,
    /// The fence signaled during the wait
    Satisfied,
    /// The timeout elapsed before the fence signaled
    TimedOut,
    /// The wait itself failed
    Failed,
}

impl WaitStatus {
    /// Whether the guarded GPU work is known to be complete
    ///
    /// `TimedOut` and `Failed` are both "not yet safe": a failed wait must
    /// never be read as completion.
    pub fn is_safe(self) -> bool {
        matches!(self, WaitStatus::AlreadySignaled | WaitStatus::Satisfied)
    }
}

/// One-shot GPU synchronization point
///
/// Created per present by `GpuDevice::create_fence`, consumed by a single
/// `client_wait` or `server_wait`, then disposed. Any call after `dispose`
/// fails immediately with `Error::InvalidResource`.
pub trait GpuFence: Send {
    /// Block the calling CPU thread until the fence signals or `timeout`
    /// elapses
    fn client_wait(&mut self, timeout: Duration) -> Result<WaitStatus>;

    /// Insert a GPU-side wait into the current command queue
    ///
    /// The queue stalls until the fence position is reached; no CPU thread
    /// blocks. Only meaningful between contexts that can see each other's
    /// sync objects.
    fn server_wait(&mut self) -> Result<()>;

    /// Release the fence object
    fn dispose(&mut self);
}

/// Error used by fence implementations for calls after `dispose`
pub(crate) fn fence_disposed_error() -> Error {
    Error::InvalidResource("fence used after dispose".to_string())
}

/// Always-signaled fence for backends whose sharing strategy orders access
/// without GPU sync objects
pub struct NoopFence {
    disposed: bool,
}

impl NoopFence {
    pub fn new() -> Self {
        Self { disposed: false }
    }
}

impl Default for NoopFence {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuFence for NoopFence {
    fn client_wait(&mut self, _timeout: Duration) -> Result<WaitStatus> {
        if self.disposed {
            return Err(fence_disposed_error());
        }
        Ok(WaitStatus::AlreadySignaled)
    }

    fn server_wait(&mut self) -> Result<()> {
        if self.disposed {
            return Err(fence_disposed_error());
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }
}

#[cfg(test)]
#[path = "fence_tests.rs"]
mod tests;
