/// GlFence - one-shot fence over GL sync objects

use frame_link::framelink::context::{GpuFence, WaitStatus};
use frame_link::framelink::{Error, Result};
use glow::HasContext;
use std::sync::Arc;
use std::time::Duration;

use crate::gl_context::SharedGl;

/// glClientWaitSync takes a signed nanosecond timeout; longer waits loop.
const MAX_WAIT_SLICE_NS: u128 = i32::MAX as u128;

/// Timeout value glWaitSync requires
const TIMEOUT_IGNORED: u64 = u64::MAX;

/// Fence over a glFenceSync object
pub struct GlFence {
    gl: Arc<SharedGl>,
    sync: Option<glow::NativeFence>,
}

// Safety: sync objects belong to the share group, not a thread. The handle
// travels with the fence; waits themselves run on a thread where a context
// of that share group is current.
unsafe impl Send for GlFence {}

impl GlFence {
    pub(crate) fn new(gl: Arc<SharedGl>, sync: glow::NativeFence) -> Self {
        Self {
            gl,
            sync: Some(sync),
        }
    }
}

impl GpuFence for GlFence {
    fn client_wait(&mut self, timeout: Duration) -> Result<WaitStatus> {
        let sync = self.sync.ok_or_else(fence_disposed_error)?;
        let mut remaining = timeout.as_nanos();
        loop {
            let slice = remaining.min(MAX_WAIT_SLICE_NS) as i32;
            let status =
                unsafe { self.gl.client_wait_sync(sync, glow::SYNC_FLUSH_COMMANDS_BIT, slice) };
            match status {
                glow::ALREADY_SIGNALED => return Ok(WaitStatus::AlreadySignaled),
                glow::CONDITION_SATISFIED => return Ok(WaitStatus::Satisfied),
                glow::TIMEOUT_EXPIRED => {
                    remaining = remaining.saturating_sub(slice as u128);
                    if remaining == 0 {
                        return Ok(WaitStatus::TimedOut);
                    }
                }
                _ => return Ok(WaitStatus::Failed),
            }
        }
    }

    fn server_wait(&mut self) -> Result<()> {
        let sync = self.sync.ok_or_else(fence_disposed_error)?;
        unsafe { self.gl.wait_sync(sync, 0, TIMEOUT_IGNORED) };
        Ok(())
    }

    fn dispose(&mut self) {
        if let Some(sync) = self.sync.take() {
            unsafe { self.gl.delete_sync(sync) };
        }
    }
}

fn fence_disposed_error() -> Error {
    Error::InvalidResource("fence used after dispose".to_string())
}
