//! Swapchain image identity, state, and the strategy trait
//!
//! An image is one GPU-resident buffer cycling through the pool. The
//! concrete sharing strategy (aliasing, interop handle, main-memory
//! readback) is selected once per swapchain and hidden behind `SwapImage`.

use glam::UVec2;
use std::fmt;

use crate::context::PixelFormat;
use crate::error::Result;

/// Image identity, unique within one swapchain
///
/// Ids are dense and monotonically increasing from 0 in allocation order,
/// so they double as pool indices and travel over the transport as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(u32);

impl ImageId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image {}", self.0)
    }
}

/// Ownership state of a pooled image
///
/// `Free -> Acquired -> InFlight -> Free` is the normal cycle; `Disposed`
/// is terminal. Exactly one owner at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    /// In the pool, available to the producer
    Free,
    /// Owned by the producer between acquire and present
    Acquired,
    /// Presented, owned by the consumer pipeline until released
    InFlight,
    /// Torn down with the swapchain
    Disposed,
}

/// Backend-native handle(s) of an image, as transmitted to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageHandle {
    /// Native texture name, aliased directly by a same-API consumer
    Texture { name: u64 },
    /// Producer texture plus the platform share handle a different-API
    /// consumer opens
    SharedTexture { name: u64, share_handle: u64 },
    /// Pinned host buffer holding the latest downloaded frame
    HostMemory { address: u64, len: u64 },
}

/// Transmissible image descriptor
///
/// Carries identity and native handle across the transport without exposing
/// the image object, so each side resolves the physical resource into its
/// own API-native handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageData {
    pub id: ImageId,
    pub size: UVec2,
    pub format: PixelFormat,
    pub handle: ImageHandle,
}

/// One pooled image under a backend-specific sharing strategy
///
/// Lifecycle calls all run on the producer's context thread. `allocate`
/// failures are fatal for the swapchain under construction; they are
/// propagated, never retried.
pub trait SwapImage: Send {
    /// Image identity within the swapchain
    fn id(&self) -> ImageId;

    /// Pixel size
    fn size(&self) -> UVec2;

    /// Create the GPU resources for this image
    fn allocate(&mut self) -> Result<()>;

    /// Destroy the GPU resources
    ///
    /// Safe to call on a never-allocated or already-released image.
    fn release(&mut self);

    /// Hook before producer rendering starts (e.g. take an interop lock)
    fn on_acquire(&mut self) -> Result<()>;

    /// Hook after producer rendering ends (e.g. drop the lock, kick off the
    /// readback copy)
    fn on_present(&mut self) -> Result<()>;

    /// Descriptor sent to the consumer side
    ///
    /// Only valid after a successful `allocate`.
    fn data(&self) -> Result<ImageData>;

    /// Texture the producer's render pass draws into
    ///
    /// Distinct from `data`: the readback strategy transmits a host buffer
    /// while rendering still targets a texture. Only valid after a
    /// successful `allocate`.
    fn render_target(&self) -> Result<u64>;
}
