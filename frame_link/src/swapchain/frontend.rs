//! Consumer-side swapchain
//!
//! Mirrors the pool's images as consumer-native textures and exposes the
//! newest presentable one to the host's per-frame render callback. All
//! consumer-side GPU work (resolving handles, fallback uploads, teardown)
//! is marshaled onto the consumer's context thread through the executor;
//! the host pumps `run_pending` at the top of its frame callback, so the
//! callback's `get_current_image` stays side-effect-free.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use rustc_hash::FxHashMap;

use crate::context::{Completion, ContextExecutor, GpuContext, GpuDevice, PixelFormat};
use crate::error::{Error, Result};
use crate::image::{ImageData, ImageHandle, ImageId};
use crate::swapchain::config::PresentMode;
use crate::swapchain::mailbox::Mailbox;
use crate::transport::{Command, CommandReceiver, SwapchainId, Transport};
use crate::{bridge_debug, bridge_error, bridge_info, bridge_warn};

use glam::UVec2;

/// Consumer-side view of one pooled image
struct ResolvedImage {
    /// Texture the host draws; aliased, opened, or created depending on
    /// the handle kind
    texture: u64,
    /// Whether this side created the texture and must destroy it
    owned: bool,
    size: UVec2,
    format: PixelFormat,
}

struct FrontendState {
    resolved: FxHashMap<ImageId, ResolvedImage>,
    /// Pending frames in Fifo mode; unused in Mailbox mode
    fifo: VecDeque<ImageId>,
    disposed: bool,
}

pub struct FrontendSwapchain {
    id: SwapchainId,
    present_mode: PresentMode,
    device: Arc<dyn GpuDevice>,
    executor: Arc<dyn ContextExecutor>,
    transport: Arc<dyn Transport>,
    mailbox: Mailbox,
    state: Mutex<FrontendState>,
    /// Completed once consumer-side teardown has run
    disposal: Completion<()>,
    /// Set right after construction; executor jobs hold this so a dropped
    /// swapchain does not linger in the queue
    weak: OnceLock<Weak<FrontendSwapchain>>,
}

impl FrontendSwapchain {
    /// Connect the consumer half of a swapchain
    ///
    /// Schedules the connection handshake on the consumer executor; the
    /// returned completion is signaled (and `AllocateAck` sent) once it
    /// has run there. The caller wires the returned swapchain to the
    /// transport's receiving side.
    pub fn connect(
        id: SwapchainId,
        present_mode: PresentMode,
        context: &Arc<dyn GpuContext>,
        executor: Arc<dyn ContextExecutor>,
        transport: Arc<dyn Transport>,
    ) -> (Arc<Self>, Completion<()>) {
        let frontend = Arc::new(Self {
            id,
            present_mode,
            device: context.device(),
            executor,
            transport,
            mailbox: Mailbox::new(),
            state: Mutex::new(FrontendState {
                resolved: FxHashMap::default(),
                fifo: VecDeque::new(),
                disposed: false,
            }),
            disposal: Completion::new(),
            weak: OnceLock::new(),
        });
        let _ = frontend.weak.set(Arc::downgrade(&frontend));

        let ready = Completion::new();
        let ack = ready.clone();
        let weak = frontend.weak_ref();
        frontend.executor.submit(Box::new(move || {
            if let Some(frontend) = weak.upgrade() {
                if let Err(e) = frontend
                    .transport
                    .send(Command::AllocateAck { swapchain: frontend.id })
                {
                    bridge_debug!(
                        "framelink::swapchain",
                        "AllocateAck for {} not delivered: {}",
                        frontend.id,
                        e
                    );
                }
            }
            ack.complete(());
        }));

        bridge_info!(
            "framelink::swapchain",
            "Connected consumer half of {} ({:?})",
            id,
            present_mode
        );
        (frontend, ready)
    }

    pub fn id(&self) -> SwapchainId {
        self.id
    }

    fn weak_ref(&self) -> Weak<FrontendSwapchain> {
        self.weak.get().cloned().unwrap_or_default()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().unwrap().disposed
    }

    /// Image the host should draw this display frame
    ///
    /// Side-effect-free and idempotent: repeated reads within one display
    /// frame return the same image until the next present is integrated.
    /// The returned handle is always consumer-native
    /// (`ImageHandle::Texture`). `None` after disposal or before the
    /// first present.
    pub fn get_current_image(&self) -> Option<ImageData> {
        let state = self.state.lock().unwrap();
        if state.disposed {
            return None;
        }
        let id = match self.present_mode {
            PresentMode::Mailbox => self.mailbox.read()?,
            PresentMode::Fifo => state.fifo.front().copied()?,
        };
        let resolved = state.resolved.get(&id)?;
        Some(ImageData {
            id,
            size: resolved.size,
            format: resolved.format,
            handle: ImageHandle::Texture {
                name: resolved.texture,
            },
        })
    }

    /// Finish the current frame in Fifo mode, releasing it to the producer
    ///
    /// The host calls this after drawing; the next queued frame becomes
    /// current. A no-op in Mailbox mode (supersession releases instead).
    pub fn advance_frame(&self) {
        if self.present_mode != PresentMode::Fifo {
            return;
        }
        let released = {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                return;
            }
            state.fifo.pop_front()
        };
        if let Some(id) = released {
            self.send_release(id);
        }
    }

    /// Tear down the consumer half
    ///
    /// Pending frames are released to the producer immediately; texture
    /// teardown runs on the consumer executor and the remote is notified
    /// from there. The returned completion is signaled when teardown has
    /// run; it is already complete on a repeated call.
    pub fn dispose(&self) -> Completion<()> {
        let pending = {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                return self.disposal.clone();
            }
            state.disposed = true;
            let mut pending: Vec<ImageId> = state.fifo.drain(..).collect();
            pending.extend(self.mailbox.take());
            pending
        };
        for id in pending {
            self.send_release(id);
        }
        self.schedule_teardown(true);
        self.disposal.clone()
    }

    /// Remote-initiated teardown (SwapchainDisposed received)
    fn dispose_from_remote(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.fifo.clear();
            self.mailbox.take();
        }
        self.schedule_teardown(false);
        bridge_info!(
            "framelink::swapchain",
            "Consumer half of {} torn down by remote dispose",
            self.id
        );
    }

    /// Destroy consumer textures on the consumer thread, then notify
    ///
    /// A locally initiated dispose announces `SwapchainDisposed`; a
    /// remotely initiated one answers with `DisposeAck`.
    fn schedule_teardown(&self, locally_initiated: bool) {
        let weak = self.weak_ref();
        let done = self.disposal.clone();
        self.executor.submit(Box::new(move || {
            if let Some(frontend) = weak.upgrade() {
                frontend.destroy_owned_textures();
                let command = if locally_initiated {
                    Command::SwapchainDisposed {
                        swapchain: frontend.id,
                    }
                } else {
                    Command::DisposeAck {
                        swapchain: frontend.id,
                    }
                };
                if let Err(e) = frontend.transport.send(command) {
                    bridge_debug!(
                        "framelink::swapchain",
                        "Teardown notification for {} not delivered: {}",
                        frontend.id,
                        e
                    );
                }
            }
            done.complete(());
        }));
    }

    fn destroy_owned_textures(&self) {
        let owned: Vec<u64> = {
            let mut state = self.state.lock().unwrap();
            state
                .resolved
                .drain()
                .filter(|(_, resolved)| resolved.owned)
                .map(|(_, resolved)| resolved.texture)
                .collect()
        };
        for texture in owned {
            self.device.destroy_texture(texture);
        }
    }

    /// Queue integration of a presented frame onto the consumer thread
    fn handle_present(&self, data: ImageData) {
        if self.state.lock().unwrap().disposed {
            // Not displayable anymore; hand the image straight back.
            self.send_release(data.id);
            return;
        }
        let weak = self.weak_ref();
        self.executor.submit(Box::new(move || {
            if let Some(frontend) = weak.upgrade() {
                frontend.integrate_present(data);
            }
        }));
    }

    /// Resolve, upload, and publish one presented frame (consumer thread)
    fn integrate_present(&self, data: ImageData) {
        let superseded = {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                drop(state);
                self.send_release(data.id);
                return;
            }
            if let Err(e) = self.resolve_and_upload(&mut state, &data) {
                drop(state);
                bridge_error!(
                    "framelink::swapchain",
                    "Integrating {} on {} failed: {}",
                    data.id,
                    self.id,
                    e
                );
                self.send_release(data.id);
                return;
            }
            match self.present_mode {
                PresentMode::Mailbox => self.mailbox.publish(data.id),
                PresentMode::Fifo => {
                    state.fifo.push_back(data.id);
                    None
                }
            }
        };
        if let Some(previous) = superseded {
            if previous != data.id {
                self.send_release(previous);
            }
        }
    }

    /// Look up or create the consumer-native texture for `data`
    ///
    /// Fallback frames re-upload on every present; the other strategies
    /// resolve once and publish only.
    fn resolve_and_upload(&self, state: &mut FrontendState, data: &ImageData) -> Result<()> {
        if let Some(resolved) = state.resolved.get(&data.id) {
            if let ImageHandle::HostMemory { address, len } = data.handle {
                self.upload_host_frame(resolved.texture, data, address, len)?;
            }
            return Ok(());
        }

        let resolved = match data.handle {
            ImageHandle::Texture { name } => ResolvedImage {
                texture: name,
                owned: false,
                size: data.size,
                format: data.format,
            },
            ImageHandle::SharedTexture { share_handle, .. } => {
                let texture = self.device.open_shared_texture(share_handle, data.size)?;
                ResolvedImage {
                    texture,
                    owned: true,
                    size: data.size,
                    format: data.format,
                }
            }
            ImageHandle::HostMemory { address, len } => {
                let texture = self.device.create_texture(data.size, data.format)?;
                if let Err(e) = self.upload_host_frame(texture, data, address, len) {
                    self.device.destroy_texture(texture);
                    return Err(e);
                }
                ResolvedImage {
                    texture,
                    owned: true,
                    size: data.size,
                    format: data.format,
                }
            }
        };
        bridge_debug!(
            "framelink::swapchain",
            "Resolved {} into consumer texture {} on {}",
            data.id,
            resolved.texture,
            self.id
        );
        state.resolved.insert(data.id, resolved);
        Ok(())
    }

    fn upload_host_frame(
        &self,
        texture: u64,
        data: &ImageData,
        address: u64,
        len: u64,
    ) -> Result<()> {
        let expected = data.format.byte_len(data.size);
        if len as usize != expected {
            return Err(Error::InvalidResource(format!(
                "host frame of {} carries {} bytes, expected {}",
                data.id, len, expected
            )));
        }
        // Safety: the producer keeps the host frame alive at a stable
        // address until the image is released or its swapchain disposed;
        // presents stop being integrated here once this side is disposed.
        let pixels = unsafe { std::slice::from_raw_parts(address as *const u8, expected) };
        self.device.upload_texture(texture, data.size, data.format, pixels)
    }

    fn send_release(&self, id: ImageId) {
        if let Err(e) = self.transport.send(Command::Release {
            swapchain: self.id,
            image: id,
        }) {
            bridge_debug!(
                "framelink::swapchain",
                "Release of {} on {} not delivered: {}",
                id,
                self.id,
                e
            );
        }
    }
}

impl CommandReceiver for FrontendSwapchain {
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
            Command::Present { data, .. } => self.handle_present(data),
            Command::SwapchainDisposed { .. } => self.dispose_from_remote(),
            other => {
                bridge_warn!(
                    "framelink::swapchain",
                    "{} received {}; frontend is the consuming side",
                    self.id,
                    other
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "frontend_tests.rs"]
mod tests;
