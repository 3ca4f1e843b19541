//! Main-memory fallback strategy
//!
//! Works between any pair of backends: the producer downloads each frame
//! into a pinned host buffer through an asynchronous readback, the consumer
//! re-uploads into its own texture. Two transfer buffers alternate per
//! present so the copy of frame N overlaps the CPU harvest of frame N-1,
//! and every copy is guarded by its own fence. The consumer therefore sees
//! this image's previous present, one present late by construction.

use glam::UVec2;
use std::sync::Arc;
use std::time::Duration;

use crate::{bridge_debug, bridge_warn};
use crate::context::{GpuDevice, GpuFence, PixelFormat, TransferMapping};
use crate::error::{Error, Result};
use crate::image::image::{ImageData, ImageHandle, ImageId, SwapImage};

/// Bound on the wait for the previous copy before harvesting it
const COPY_WAIT: Duration = Duration::from_millis(100);

pub struct ReadbackImage {
    id: ImageId,
    size: UVec2,
    format: PixelFormat,
    device: Arc<dyn GpuDevice>,
    texture: Option<u64>,
    transfer: [Option<u64>; 2],
    copy_fences: [Option<Box<dyn GpuFence>>; 2],
    /// Pinned host frame; its address travels in the image descriptor and
    /// must stay put for the pool's lifetime.
    host: Option<Box<[u8]>>,
    slot: usize,
}

impl ReadbackImage {
    pub fn new(device: Arc<dyn GpuDevice>, id: ImageId, size: UVec2, format: PixelFormat) -> Self {
        Self {
            id,
            size,
            format,
            device,
            texture: None,
            transfer: [None, None],
            copy_fences: [None, None],
            host: None,
            slot: 0,
        }
    }

    fn byte_len(&self) -> usize {
        self.format.byte_len(self.size)
    }

    /// Wait for the previous present's copy and move it into the host frame
    fn harvest_slot(&mut self, slot: usize) {
        // First cycle of this buffer has nothing downloaded yet.
        let mut fence = match self.copy_fences[slot].take() {
            Some(fence) => fence,
            None => return,
        };
        let safe = match fence.client_wait(COPY_WAIT) {
            Ok(status) => status.is_safe(),
            Err(e) => {
                bridge_warn!(
                    "framelink::image",
                    "Copy fence wait for {} failed: {}",
                    self.id,
                    e
                );
                false
            }
        };
        fence.dispose();

        if !safe {
            // Keep the previous host frame; stale beats torn.
            bridge_warn!(
                "framelink::image",
                "Readback copy for {} not complete in time, keeping previous frame",
                self.id
            );
            return;
        }

        let len = self.byte_len();
        let buffer = match self.transfer[slot] {
            Some(buffer) => buffer,
            None => return,
        };
        let host = match self.host.as_mut() {
            Some(host) => host,
            None => return,
        };
        match TransferMapping::map(self.device.as_ref(), buffer, len) {
            Ok(mapping) => host.copy_from_slice(mapping.bytes()),
            Err(e) => {
                bridge_warn!(
                    "framelink::image",
                    "Mapping transfer buffer for {} failed: {}",
                    self.id,
                    e
                );
            }
        }
    }
}

impl SwapImage for ReadbackImage {
    fn id(&self) -> ImageId {
        self.id
    }

    fn size(&self) -> UVec2 {
        self.size
    }

    fn allocate(&mut self) -> Result<()> {
        let len = self.byte_len();
        let texture = self.device.create_texture(self.size, self.format)?;

        let mut transfer = [None, None];
        for slot in &mut transfer {
            match self.device.create_transfer_buffer(len) {
                Ok(buffer) => *slot = Some(buffer),
                Err(e) => {
                    for created in transfer.iter().flatten() {
                        self.device.destroy_transfer_buffer(*created);
                    }
                    self.device.destroy_texture(texture);
                    return Err(e);
                }
            }
        }

        self.host = Some(vec![0u8; len].into_boxed_slice());
        self.texture = Some(texture);
        self.transfer = transfer;
        bridge_debug!(
            "framelink::image",
            "Allocated readback {} ({}x{}, {} B host frame)",
            self.id,
            self.size.x,
            self.size.y,
            len
        );
        Ok(())
    }

    fn release(&mut self) {
        for fence in &mut self.copy_fences {
            if let Some(mut fence) = fence.take() {
                fence.dispose();
            }
        }
        for buffer in &mut self.transfer {
            if let Some(buffer) = buffer.take() {
                self.device.destroy_transfer_buffer(buffer);
            }
        }
        if let Some(texture) = self.texture.take() {
            self.device.destroy_texture(texture);
            bridge_debug!("framelink::image", "Released readback {}", self.id);
        }
        self.host = None;
    }

    fn on_acquire(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_present(&mut self) -> Result<()> {
        let texture = self
            .texture
            .ok_or_else(|| Error::InvalidResource(format!("{} not allocated", self.id)))?;
        let slot = self.slot;
        let buffer = self.transfer[slot]
            .ok_or_else(|| Error::InvalidResource(format!("{} has no transfer buffer", self.id)))?;

        // Queue this frame's download and fence it; it gets harvested on
        // this image's next present.
        self.device
            .enqueue_readback(texture, self.size, self.format, buffer)?;
        self.copy_fences[slot] = Some(self.device.create_fence()?);

        // Harvest the other buffer's copy from the previous present.
        self.harvest_slot(slot ^ 1);
        self.slot = slot ^ 1;
        Ok(())
    }

    fn data(&self) -> Result<ImageData> {
        let host = self
            .host
            .as_ref()
            .ok_or_else(|| Error::InvalidResource(format!("{} not allocated", self.id)))?;
        Ok(ImageData {
            id: self.id,
            size: self.size,
            format: self.format,
            handle: ImageHandle::HostMemory {
                address: host.as_ptr() as u64,
                len: host.len() as u64,
            },
        })
    }

    fn render_target(&self) -> Result<u64> {
        self.texture
            .ok_or_else(|| Error::InvalidResource(format!("{} not allocated", self.id)))
    }
}

#[cfg(test)]
#[path = "readback_image_tests.rs"]
mod tests;
