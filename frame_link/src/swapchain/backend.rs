//! Producer-side swapchain
//!
//! Owns the image pool and its Free/Acquired/InFlight bookkeeping. The
//! producer's render loop drives `acquire`/`present`; the remote frontend
//! drives `receive`. Transport sends never happen while the pool lock is
//! held: the in-process transport dispatches the peer's handler on the
//! calling thread, and that handler may call straight back into this
//! swapchain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::context::{
    Completion, ContextCaps, ContextKind, GpuContext, GpuDevice, GpuFence, NoopFence,
};
use crate::error::{Error, Result};
use crate::image::{ImageData, ImageId};
use crate::swapchain::config::{SwapchainConfig, TransferMode};
use crate::swapchain::pool::ImagePool;
use crate::transport::{Command, CommandReceiver, SwapchainId, Transport};
use crate::{bridge_debug, bridge_error, bridge_info, bridge_warn};

/// Bound on the CPU wait for the present fence
const PRESENT_FENCE_WAIT: Duration = Duration::from_millis(100);

/// How long dispose waits for in-flight images to drain
const DISPOSE_GRACE: Duration = Duration::from_millis(500);

static NEXT_SWAPCHAIN_ID: AtomicU64 = AtomicU64::new(1);

/// Producer-owned image between `acquire` and `present`
///
/// Consumed by `present`, which is the only way to hand the image on. Every
/// acquire is expected to be followed by a present; an image whose token is
/// dropped instead stays out of the pool until disposal reclaims it.
pub struct AcquiredImage {
    id: ImageId,
    data: ImageData,
    render_target: u64,
}

impl AcquiredImage {
    pub fn id(&self) -> ImageId {
        self.id
    }

    /// Descriptor the consumer side will receive at present
    pub fn data(&self) -> ImageData {
        self.data
    }

    /// Texture the producer renders this frame into
    pub fn render_target(&self) -> u64 {
        self.render_target
    }
}

struct BackendState {
    pool: ImagePool,
    disposed: bool,
}

pub struct BackendSwapchain {
    id: SwapchainId,
    config: SwapchainConfig,
    mode: TransferMode,
    device: Arc<dyn GpuDevice>,
    caps: ContextCaps,
    transport: Arc<dyn Transport>,
    state: Mutex<BackendState>,
    /// Signaled whenever an image returns to Free (and on disposal)
    freed: Condvar,
    frontend_ready: Completion<()>,
    dispose_ack: Completion<()>,
}

impl BackendSwapchain {
    /// Build the pool and producer-side bookkeeping
    ///
    /// The transfer mode is selected here from the two contexts'
    /// capabilities and stays fixed for the swapchain's lifetime. The
    /// caller wires the returned swapchain to the transport's receiving
    /// side.
    pub fn create(
        context: &Arc<dyn GpuContext>,
        consumer_kind: ContextKind,
        consumer_caps: ContextCaps,
        config: SwapchainConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let mode = TransferMode::select(
            context.kind(),
            context.caps(),
            consumer_kind,
            consumer_caps,
            config.transfer_hint,
        );
        let device = context.device();
        let interop = context.interop();
        let pool = ImagePool::build(mode, &device, interop.as_ref(), &config)?;

        let id = SwapchainId::new(NEXT_SWAPCHAIN_ID.fetch_add(1, Ordering::SeqCst));
        bridge_info!(
            "framelink::swapchain",
            "Created {} ({:?}, {} images, {}x{})",
            id,
            mode,
            config.image_count,
            config.size.x,
            config.size.y
        );

        Ok(Arc::new(Self {
            id,
            config,
            mode,
            device,
            caps: context.caps(),
            transport,
            state: Mutex::new(BackendState {
                pool,
                disposed: false,
            }),
            freed: Condvar::new(),
            frontend_ready: Completion::new(),
            dispose_ack: Completion::new(),
        }))
    }

    pub fn id(&self) -> SwapchainId {
        self.id
    }

    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    /// Transfer mode selected at creation
    pub fn transfer_mode(&self) -> TransferMode {
        self.mode
    }

    /// Number of images currently available to `acquire`
    pub fn free_images(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.pool.count(crate::image::ImageState::Free)
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().unwrap().disposed
    }

    /// Block until the frontend acknowledged its resource resolution
    ///
    /// One-shot: the signal is consumed by the (single) host thread
    /// driving the swapchain setup.
    pub fn wait_frontend_ready(&self, timeout: Duration) -> bool {
        self.frontend_ready.wait_timeout(timeout).is_some()
    }

    /// Block until the frontend acknowledged its teardown (one-shot)
    pub fn wait_dispose_ack(&self, timeout: Duration) -> bool {
        self.dispose_ack.wait_timeout(timeout).is_some()
    }

    /// Block the producer until a pool image is free, then claim it
    pub fn acquire(&self) -> Result<AcquiredImage> {
        let mut state = self.state.lock().unwrap();
        let id = loop {
            if state.disposed {
                return Err(Error::Disposed);
            }
            if let Some(id) = state.pool.acquire_free() {
                break id;
            }
            state = self.freed.wait(state).unwrap();
        };
        self.finish_acquire(&mut state, id)
    }

    /// Claim a free image without blocking
    ///
    /// `None` means every image is owned; the producer skips this frame.
    pub fn try_acquire(&self) -> Result<Option<AcquiredImage>> {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return Err(Error::Disposed);
        }
        match state.pool.acquire_free() {
            Some(id) => self.finish_acquire(&mut state, id).map(Some),
            None => Ok(None),
        }
    }

    fn finish_acquire(&self, state: &mut BackendState, id: ImageId) -> Result<AcquiredImage> {
        if let Err(e) = state.pool.image_mut(id)?.on_acquire() {
            let _ = state.pool.revert_to_free(id);
            return Err(e);
        }
        let data = state.pool.data(id)?;
        let render_target = state.pool.render_target(id)?;
        Ok(AcquiredImage {
            id,
            data,
            render_target,
        })
    }

    /// Hand a rendered image to the consumer side
    ///
    /// Runs the image's present hook, waits for the producer's GPU work to
    /// be safe to expose, marks the image InFlight, and sends `Present`.
    /// On any failure the image returns to the Free pool and the error is
    /// propagated; the frame is simply not shown.
    pub fn present(&self, image: AcquiredImage) -> Result<()> {
        let id = image.id;

        let (data, mut fence) = {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                let _ = state.pool.revert_to_free(id);
                return Err(Error::Disposed);
            }
            if let Err(e) = state.pool.image_mut(id)?.on_present() {
                let _ = state.pool.revert_to_free(id);
                self.freed.notify_one();
                return Err(e);
            }
            let data = state.pool.data(id)?;
            let fence = match self.present_fence() {
                Ok(fence) => fence,
                Err(e) => {
                    let _ = state.pool.revert_to_free(id);
                    self.freed.notify_one();
                    return Err(e);
                }
            };
            (data, fence)
        };

        // Fence wait happens outside the lock; it can take a while and the
        // release path must stay responsive meanwhile.
        let safe = match fence.client_wait(PRESENT_FENCE_WAIT) {
            Ok(status) => status.is_safe(),
            Err(e) => {
                bridge_warn!(
                    "framelink::swapchain",
                    "Present fence wait for {} failed: {}",
                    id,
                    e
                );
                false
            }
        };
        fence.dispose();

        if !safe {
            self.return_to_pool(id);
            return Err(Error::BackendError(format!(
                "producer work for {} not complete in time",
                id
            )));
        }

        {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                return Err(Error::Disposed);
            }
            state.pool.mark_in_flight(id)?;
        }

        if let Err(e) = self.transport.send(Command::Present {
            swapchain: self.id,
            data,
        }) {
            bridge_warn!(
                "framelink::swapchain",
                "Present of {} not delivered: {}",
                id,
                e
            );
            let mut state = self.state.lock().unwrap();
            let _ = state.pool.release_in_flight(id);
            self.freed.notify_one();
            return Err(e);
        }

        bridge_debug!("framelink::swapchain", "Presented {} on {}", id, self.id);
        Ok(())
    }

    /// Fence guarding the present hand-off
    ///
    /// Aliasing is the only mode that relies on a real fence: the consumer
    /// reads the producer's texture directly. The interop mode orders
    /// access through its lock/unlock bracket and the readback mode
    /// through the per-copy fences inside the image.
    fn present_fence(&self) -> Result<Box<dyn GpuFence>> {
        if self.mode == TransferMode::TextureAlias && self.caps.contains(ContextCaps::GPU_FENCES) {
            self.device.create_fence()
        } else {
            Ok(Box::new(NoopFence::new()))
        }
    }

    fn return_to_pool(&self, id: ImageId) {
        let mut state = self.state.lock().unwrap();
        if !state.disposed {
            let _ = state.pool.revert_to_free(id);
            self.freed.notify_one();
        }
    }

    /// Tear down the swapchain
    ///
    /// Marks the swapchain disposed (waking blocked acquirers with
    /// `Error::Disposed`), notifies the frontend, waits up to the grace
    /// period for in-flight images to drain, then releases all GPU
    /// resources. Images that never came back are force-reclaimed and
    /// reported as an error; the teardown itself always completes. A
    /// second call is a no-op.
    pub fn dispose(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                return Ok(());
            }
            state.disposed = true;
            self.freed.notify_all();
        }

        if let Err(e) = self.transport.send(Command::SwapchainDisposed { swapchain: self.id }) {
            bridge_debug!(
                "framelink::swapchain",
                "Dispose notification for {} not delivered: {}",
                self.id,
                e
            );
        }

        // Drain window: releases still arriving return images to Free.
        let deadline = Instant::now() + DISPOSE_GRACE;
        let mut state = self.state.lock().unwrap();
        while state.pool.non_free() > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (next, _timeout) = self.freed.wait_timeout(state, deadline - now).unwrap();
            state = next;
        }

        let leaked = state.pool.force_reclaim();
        state.pool.dispose_all();
        drop(state);

        bridge_info!("framelink::swapchain", "Disposed {}", self.id);
        if leaked > 0 {
            return Err(Error::InvalidResource(format!(
                "{} images still owned at dispose of {}",
                leaked, self.id
            )));
        }
        Ok(())
    }

    /// Remote-initiated teardown (SwapchainDisposed received)
    ///
    /// No notification is sent back; the remote is already gone.
    fn dispose_from_remote(&self) {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.pool.force_reclaim();
        state.pool.dispose_all();
        self.freed.notify_all();
        drop(state);
        bridge_info!(
            "framelink::swapchain",
            "{} torn down by remote dispose",
            self.id
        );
    }
}

impl CommandReceiver for BackendSwapchain {
    fn receive(&self, command: Command) {
        if command.swapchain() != self.id {
            bridge_warn!(
                "framelink::swapchain",
                "{} received {} addressed elsewhere",
                self.id,
                command
            );
            return;
        }
        match command {
            Command::Release { image, .. } => {
                let mut state = self.state.lock().unwrap();
                let disposed = state.disposed;
                match state.pool.release_in_flight(image) {
                    Ok(()) => {
                        self.freed.notify_one();
                    }
                    Err(e) if disposed => {
                        // Releases racing a teardown are expected.
                        drop(state);
                        bridge_debug!(
                            "framelink::swapchain",
                            "Late release on {}: {}",
                            self.id,
                            e
                        );
                    }
                    Err(e) => {
                        drop(state);
                        bridge_error!(
                            "framelink::swapchain",
                            "Rejected release on {}: {}",
                            self.id,
                            e
                        );
                    }
                }
            }
            Command::SwapchainDisposed { .. } => self.dispose_from_remote(),
            Command::AllocateAck { .. } => {
                bridge_debug!("framelink::swapchain", "Frontend ready on {}", self.id);
                self.frontend_ready.complete(());
            }
            Command::DisposeAck { .. } => self.dispose_ack.complete(()),
            Command::Present { .. } => {
                bridge_warn!(
                    "framelink::swapchain",
                    "{} received a Present; backend is the presenting side",
                    self.id
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
