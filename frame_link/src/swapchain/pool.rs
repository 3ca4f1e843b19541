//! Fixed-size image pool with ownership bookkeeping
//!
//! The pool is built once per swapchain and never grows. Ids are dense,
//! doubling as indices. State transitions are validated here so protocol
//! errors (a remote releasing an image it does not own) surface as errors
//! instead of silently corrupting ownership.

use std::sync::Arc;

use crate::bridge_debug;
use crate::context::{GpuDevice, InteropDevice};
use crate::error::{Error, Result};
use crate::image::{create_swap_image, ImageData, ImageId, ImageState, SwapImage};
use crate::swapchain::config::{SwapchainConfig, TransferMode};

struct PoolEntry {
    image: Box<dyn SwapImage>,
    state: ImageState,
}

pub struct ImagePool {
    entries: Vec<PoolEntry>,
}

impl ImagePool {
    /// Allocate `config.image_count` images under the given strategy
    ///
    /// All-or-nothing: a failed allocation releases the images already
    /// allocated and propagates the error.
    pub fn build(
        mode: TransferMode,
        device: &Arc<dyn GpuDevice>,
        interop: Option<&Arc<dyn InteropDevice>>,
        config: &SwapchainConfig,
    ) -> Result<Self> {
        let mut entries: Vec<PoolEntry> = Vec::with_capacity(config.image_count as usize);
        for raw in 0..config.image_count {
            let id = ImageId::new(raw);
            let mut image = create_swap_image(mode, device, interop, id, config.size, config.format)?;
            if let Err(e) = image.allocate() {
                for entry in &mut entries {
                    entry.image.release();
                }
                return Err(e);
            }
            entries.push(PoolEntry {
                image,
                state: ImageState::Free,
            });
        }
        bridge_debug!(
            "framelink::swapchain",
            "Built pool of {} images ({:?}, {}x{})",
            entries.len(),
            mode,
            config.size.x,
            config.size.y
        );
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: ImageId) -> Result<&PoolEntry> {
        self.entries
            .get(id.raw() as usize)
            .ok_or_else(|| Error::InvalidResource(format!("{} outside pool", id)))
    }

    fn entry_mut(&mut self, id: ImageId) -> Result<&mut PoolEntry> {
        self.entries
            .get_mut(id.raw() as usize)
            .ok_or_else(|| Error::InvalidResource(format!("{} outside pool", id)))
    }

    pub fn state(&self, id: ImageId) -> Result<ImageState> {
        Ok(self.entry(id)?.state)
    }

    pub fn image_mut(&mut self, id: ImageId) -> Result<&mut dyn SwapImage> {
        Ok(self.entry_mut(id)?.image.as_mut())
    }

    pub fn data(&self, id: ImageId) -> Result<ImageData> {
        self.entry(id)?.image.data()
    }

    pub fn render_target(&self, id: ImageId) -> Result<u64> {
        self.entry(id)?.image.render_target()
    }

    /// Number of images currently in `state`
    pub fn count(&self, state: ImageState) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.state == state)
            .count()
    }

    /// Images owned by either side (Acquired or InFlight)
    pub fn non_free(&self) -> usize {
        self.count(ImageState::Acquired) + self.count(ImageState::InFlight)
    }

    /// Claim the first Free image for the producer
    pub fn acquire_free(&mut self) -> Option<ImageId> {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.state == ImageState::Free {
                entry.state = ImageState::Acquired;
                return Some(ImageId::new(index as u32));
            }
        }
        None
    }

    /// Undo an acquire that could not be completed
    pub fn revert_to_free(&mut self, id: ImageId) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.state != ImageState::Acquired {
            return Err(Error::InvalidResource(format!(
                "{} reverted while {:?}",
                id, entry.state
            )));
        }
        entry.state = ImageState::Free;
        Ok(())
    }

    /// Hand an Acquired image to the consumer pipeline
    pub fn mark_in_flight(&mut self, id: ImageId) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.state != ImageState::Acquired {
            return Err(Error::InvalidResource(format!(
                "{} presented while {:?}",
                id, entry.state
            )));
        }
        entry.state = ImageState::InFlight;
        Ok(())
    }

    /// Return an InFlight image to the Free pool
    ///
    /// Driven by the remote side's Release command; anything but InFlight
    /// means the remote released an image it does not own.
    pub fn release_in_flight(&mut self, id: ImageId) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.state != ImageState::InFlight {
            return Err(Error::ProtocolViolation(format!(
                "release of {} in state {:?}",
                id, entry.state
            )));
        }
        entry.state = ImageState::Free;
        Ok(())
    }

    /// Pull every owned image back to Free, returning how many were taken
    ///
    /// Disposal fallback after the grace period expires.
    pub fn force_reclaim(&mut self) -> usize {
        let mut reclaimed = 0;
        for entry in &mut self.entries {
            if entry.state == ImageState::Acquired || entry.state == ImageState::InFlight {
                entry.state = ImageState::Free;
                reclaimed += 1;
            }
        }
        reclaimed
    }

    /// Release all GPU resources and mark every image Disposed
    ///
    /// Safe to call more than once.
    pub fn dispose_all(&mut self) {
        for entry in &mut self.entries {
            if entry.state != ImageState::Disposed {
                entry.image.release();
                entry.state = ImageState::Disposed;
            }
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
