//! Swapchain configuration and transfer-mode selection
//!
//! A config is created by the consumer side when a display surface is
//! (re)configured and stays immutable for the swapchain's lifetime. The
//! transfer mode is picked once from the two contexts' capabilities; a
//! hint can steer the choice but never force an unsupported mode.

use glam::UVec2;

use crate::bridge_warn;
use crate::context::{ContextCaps, ContextKind, PixelFormat};
use crate::error::{Error, Result};

/// Presentation policy of a swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    /// Only the newest completed frame is displayable; older undisplayed
    /// frames are released automatically
    Mailbox,
    /// Every presented frame is displayed in order; the host advances the
    /// queue after drawing each frame
    Fifo,
}

/// How image contents travel from producer to consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Consumer aliases the producer's texture name (same API on both sides)
    TextureAlias,
    /// Consumer opens a platform share handle exported by the producer
    SharedHandle,
    /// Producer downloads to host memory, consumer re-uploads
    MainMemory,
}

impl TransferMode {
    /// Whether this mode can work between the given pair of contexts
    pub fn is_supported(
        self,
        producer_kind: ContextKind,
        producer_caps: ContextCaps,
        consumer_kind: ContextKind,
        consumer_caps: ContextCaps,
    ) -> bool {
        match self {
            TransferMode::TextureAlias => {
                producer_kind == consumer_kind
                    && producer_caps.contains(ContextCaps::TEXTURE_ALIAS)
                    && consumer_caps.contains(ContextCaps::TEXTURE_ALIAS)
            }
            TransferMode::SharedHandle => {
                producer_caps.contains(ContextCaps::SHARE_EXPORT)
                    && consumer_caps.contains(ContextCaps::SHARE_IMPORT)
            }
            TransferMode::MainMemory => true,
        }
    }

    /// Pick the transfer mode for a producer/consumer context pair
    ///
    /// A supported hint wins. Otherwise the fastest supported mode is
    /// chosen: aliasing, then shared handles, then the main-memory
    /// fallback (always available).
    pub fn select(
        producer_kind: ContextKind,
        producer_caps: ContextCaps,
        consumer_kind: ContextKind,
        consumer_caps: ContextCaps,
        hint: Option<TransferMode>,
    ) -> TransferMode {
        if let Some(hinted) = hint {
            if hinted.is_supported(producer_kind, producer_caps, consumer_kind, consumer_caps) {
                return hinted;
            }
            bridge_warn!(
                "framelink::swapchain",
                "Transfer hint {:?} unsupported between {:?} and {:?}, selecting automatically",
                hinted,
                producer_kind,
                consumer_kind
            );
        }

        if TransferMode::TextureAlias.is_supported(
            producer_kind,
            producer_caps,
            consumer_kind,
            consumer_caps,
        ) {
            TransferMode::TextureAlias
        } else if TransferMode::SharedHandle.is_supported(
            producer_kind,
            producer_caps,
            consumer_kind,
            consumer_caps,
        ) {
            TransferMode::SharedHandle
        } else {
            TransferMode::MainMemory
        }
    }
}

/// Swapchain configuration
///
/// Immutable for the swapchain's lifetime; a resized surface gets a new
/// swapchain with a new config.
#[derive(Debug, Clone)]
pub struct SwapchainConfig {
    /// Physical pixel size of every image in the pool
    pub size: UVec2,
    /// Number of pooled images (at least 2)
    pub image_count: u32,
    /// Presentation policy
    pub present_mode: PresentMode,
    /// Pixel format (chosen by the consumer)
    pub format: PixelFormat,
    /// Preferred transfer mode, if the host has an opinion
    pub transfer_hint: Option<TransferMode>,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            size: UVec2::new(1, 1),
            image_count: 2,
            present_mode: PresentMode::Mailbox,
            format: PixelFormat::Rgba8,
            transfer_hint: None,
        }
    }
}

impl SwapchainConfig {
    /// Check the config before pool allocation
    pub fn validate(&self) -> Result<()> {
        if self.image_count < 2 {
            return Err(Error::InitializationFailed(format!(
                "swapchain needs at least 2 images, got {}",
                self.image_count
            )));
        }
        if self.size.x == 0 || self.size.y == 0 {
            return Err(Error::InitializationFailed(format!(
                "swapchain size must be nonzero, got {}x{}",
                self.size.x, self.size.y
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
