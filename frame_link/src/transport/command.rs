//! Command set exchanged between the two swapchain halves
//!
//! Commands are the only way one side affects the other's bookkeeping.
//! Payloads are plain data; each side resolves ids against its own state
//! and treats unknown ids as protocol errors.

use std::fmt;

use crate::image::{ImageData, ImageId};

/// Swapchain identity, unique within one transport link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SwapchainId(u64);

impl SwapchainId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SwapchainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "swapchain {}", self.0)
    }
}

/// One cross-context message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Backend to frontend: a newly presented frame
    Present {
        swapchain: SwapchainId,
        data: ImageData,
    },
    /// Frontend to backend: the consumer pipeline is done with an image
    Release {
        swapchain: SwapchainId,
        image: ImageId,
    },
    /// Either direction: the sending half tore down; idempotent on receipt
    SwapchainDisposed { swapchain: SwapchainId },
    /// Frontend to backend: consumer-side resource resolution finished
    AllocateAck { swapchain: SwapchainId },
    /// Frontend to backend: consumer-side teardown finished
    DisposeAck { swapchain: SwapchainId },
}

impl Command {
    /// The swapchain this command addresses
    pub fn swapchain(&self) -> SwapchainId {
        match self {
            Command::Present { swapchain, .. }
            | Command::Release { swapchain, .. }
            | Command::SwapchainDisposed { swapchain }
            | Command::AllocateAck { swapchain }
            | Command::DisposeAck { swapchain } => *swapchain,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Present { swapchain, data } => {
                write!(f, "Present({}, {})", swapchain, data.id)
            }
            Command::Release { swapchain, image } => {
                write!(f, "Release({}, {})", swapchain, image)
            }
            Command::SwapchainDisposed { swapchain } => {
                write!(f, "SwapchainDisposed({})", swapchain)
            }
            Command::AllocateAck { swapchain } => write!(f, "AllocateAck({})", swapchain),
            Command::DisposeAck { swapchain } => write!(f, "DisposeAck({})", swapchain),
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
