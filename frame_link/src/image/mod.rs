/// Image module - pooled swapchain images and their sharing strategies

// Module declarations
pub mod image;
pub mod alias_image;
pub mod interop_image;
pub mod readback_image;

// Re-export everything from image.rs
pub use image::*;

// Re-export the strategy implementations
pub use alias_image::AliasImage;
pub use interop_image::InteropImage;
pub use readback_image::ReadbackImage;

use glam::UVec2;
use std::sync::Arc;

use crate::context::{GpuDevice, InteropDevice, PixelFormat};
use crate::error::{Error, Result};
use crate::swapchain::TransferMode;

/// Create one pooled image under the selected sharing strategy
///
/// The mode was fixed when the swapchain was created; every image of a pool
/// uses the same strategy.
pub fn create_swap_image(
    mode: TransferMode,
    device: &Arc<dyn GpuDevice>,
    interop: Option<&Arc<dyn InteropDevice>>,
    id: ImageId,
    size: UVec2,
    format: PixelFormat,
) -> Result<Box<dyn SwapImage>> {
    match mode {
        TransferMode::TextureAlias => Ok(Box::new(AliasImage::new(
            Arc::clone(device),
            id,
            size,
            format,
        ))),
        TransferMode::SharedHandle => {
            let interop = interop.ok_or_else(|| {
                Error::InitializationFailed(
                    "shared-handle transfer requires an interop device".to_string(),
                )
            })?;
            Ok(Box::new(InteropImage::new(
                Arc::clone(device),
                Arc::clone(interop),
                id,
                size,
                format,
            )))
        }
        TransferMode::MainMemory => Ok(Box::new(ReadbackImage::new(
            Arc::clone(device),
            id,
            size,
            format,
        ))),
    }
}
