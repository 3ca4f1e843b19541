//! Cross-API interop strategy
//!
//! The producer texture is registered with the platform interop device and
//! exposed to the consumer's API through a share handle. Producer access is
//! bracketed by the device-level lock: `on_acquire` locks, `on_present`
//! unlocks. That lock is the ordering mechanism; the interop contract wants
//! explicit lock ownership, not a wait-for-timestamp fence.

use glam::UVec2;
use std::sync::Arc;

use crate::{bridge_debug, bridge_warn};
use crate::context::{GpuDevice, InteropDevice, InteropRegistration, PixelFormat};
use crate::error::{Error, Result};
use crate::image::image::{ImageData, ImageHandle, ImageId, SwapImage};

pub struct InteropImage {
    id: ImageId,
    size: UVec2,
    format: PixelFormat,
    device: Arc<dyn GpuDevice>,
    interop: Arc<dyn InteropDevice>,
    texture: Option<u64>,
    registration: Option<InteropRegistration>,
    locked: bool,
}

impl InteropImage {
    pub fn new(
        device: Arc<dyn GpuDevice>,
        interop: Arc<dyn InteropDevice>,
        id: ImageId,
        size: UVec2,
        format: PixelFormat,
    ) -> Self {
        Self {
            id,
            size,
            format,
            device,
            interop,
            texture: None,
            registration: None,
            locked: false,
        }
    }

    fn registration(&self) -> Result<InteropRegistration> {
        self.registration
            .ok_or_else(|| Error::InvalidResource(format!("{} not registered", self.id)))
    }
}

impl SwapImage for InteropImage {
    fn id(&self) -> ImageId {
        self.id
    }

    fn size(&self) -> UVec2 {
        self.size
    }

    fn allocate(&mut self) -> Result<()> {
        let texture = self.device.create_texture(self.size, self.format)?;

        // A failed registration leaves the image unusable; undo the texture
        // and propagate.
        let registration = match self.interop.register_texture(texture, self.size) {
            Ok(registration) => registration,
            Err(e) => {
                self.device.destroy_texture(texture);
                return Err(e);
            }
        };

        bridge_debug!(
            "framelink::image",
            "Allocated interop {} (texture {}, share handle {:#x})",
            self.id,
            texture,
            registration.share_handle
        );
        self.texture = Some(texture);
        self.registration = Some(registration);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(registration) = self.registration.take() {
            if self.locked {
                // Best effort: a stuck lock must not leak the registration.
                if let Err(e) = self.interop.unlock(registration.object) {
                    bridge_warn!(
                        "framelink::image",
                        "Unlock during release of {} failed: {}",
                        self.id,
                        e
                    );
                }
                self.locked = false;
            }
            self.interop.unregister_texture(registration.object);
        }
        if let Some(texture) = self.texture.take() {
            self.device.destroy_texture(texture);
            bridge_debug!("framelink::image", "Released interop {}", self.id);
        }
    }

    fn on_acquire(&mut self) -> Result<()> {
        let registration = self.registration()?;
        self.interop.lock(registration.object)?;
        self.locked = true;
        Ok(())
    }

    fn on_present(&mut self) -> Result<()> {
        let registration = self.registration()?;
        self.interop.unlock(registration.object)?;
        self.locked = false;
        Ok(())
    }

    fn data(&self) -> Result<ImageData> {
        let name = self
            .texture
            .ok_or_else(|| Error::InvalidResource(format!("{} not allocated", self.id)))?;
        let registration = self.registration()?;
        Ok(ImageData {
            id: self.id,
            size: self.size,
            format: self.format,
            handle: ImageHandle::SharedTexture {
                name,
                share_handle: registration.share_handle,
            },
        })
    }

    fn render_target(&self) -> Result<u64> {
        self.texture
            .ok_or_else(|| Error::InvalidResource(format!("{} not allocated", self.id)))
    }
}

#[cfg(test)]
#[path = "interop_image_tests.rs"]
mod tests;
