//! Same-API texture aliasing strategy
//!
//! Producer and consumer run the same native API with shared object names,
//! so the consumer draws the producer's texture directly. No copy and no
//! lock; ordering comes from the present fence alone (the consumer is only
//! told about the image after the producer's writes are known visible).

use glam::UVec2;
use std::sync::Arc;

use crate::bridge_debug;
use crate::context::{GpuDevice, PixelFormat};
use crate::error::{Error, Result};
use crate::image::image::{ImageData, ImageHandle, ImageId, SwapImage};

pub struct AliasImage {
    id: ImageId,
    size: UVec2,
    format: PixelFormat,
    device: Arc<dyn GpuDevice>,
    texture: Option<u64>,
}

impl AliasImage {
    pub fn new(device: Arc<dyn GpuDevice>, id: ImageId, size: UVec2, format: PixelFormat) -> Self {
        Self {
            id,
            size,
            format,
            device,
            texture: None,
        }
    }
}

impl SwapImage for AliasImage {
    fn id(&self) -> ImageId {
        self.id
    }

    fn size(&self) -> UVec2 {
        self.size
    }

    fn allocate(&mut self) -> Result<()> {
        let texture = self.device.create_texture(self.size, self.format)?;
        bridge_debug!(
            "framelink::image",
            "Allocated alias {} (texture {}, {}x{})",
            self.id,
            texture,
            self.size.x,
            self.size.y
        );
        self.texture = Some(texture);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(texture) = self.texture.take() {
            self.device.destroy_texture(texture);
            bridge_debug!("framelink::image", "Released alias {}", self.id);
        }
    }

    fn on_acquire(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_present(&mut self) -> Result<()> {
        // Push queued producer commands towards the GPU; the present fence
        // then observes their completion.
        self.device.flush();
        Ok(())
    }

    fn data(&self) -> Result<ImageData> {
        let name = self
            .texture
            .ok_or_else(|| Error::InvalidResource(format!("{} not allocated", self.id)))?;
        Ok(ImageData {
            id: self.id,
            size: self.size,
            format: self.format,
            handle: ImageHandle::Texture { name },
        })
    }

    fn render_target(&self) -> Result<u64> {
        self.texture
            .ok_or_else(|| Error::InvalidResource(format!("{} not allocated", self.id)))
    }
}

#[cfg(test)]
#[path = "alias_image_tests.rs"]
mod tests;
