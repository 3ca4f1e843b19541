//! Mock context backend for unit tests (no GPU required)
//!
//! The mock device stores real pixel bytes for its textures and transfer
//! buffers, so upload/readback round-trips are verifiable, and records every
//! operation as a string for assertions. Failure injection covers the error
//! paths: allocation failure, scripted fence wait outcomes, and interop
//! registration/lock rejection.

use glam::UVec2;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::device::{
    ContextCaps, ContextKind, GpuContext, GpuDevice, InteropDevice, InteropRegistration,
    PixelFormat,
};
use crate::context::fence::{fence_disposed_error, GpuFence, WaitStatus};
use crate::context::provider::register_context_provider;
use crate::error::{Error, Result};

// ============================================================================
// Mock Fence
// ============================================================================

/// Fence whose wait outcomes are scripted by the device
pub struct MockFence {
    script: Arc<Mutex<VecDeque<WaitStatus>>>,
    disposed: bool,
}

impl GpuFence for MockFence {
    fn client_wait(&mut self, _timeout: Duration) -> Result<WaitStatus> {
        if self.disposed {
            return Err(fence_disposed_error());
        }
        let status = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(WaitStatus::AlreadySignaled);
        Ok(status)
    }

    fn server_wait(&mut self) -> Result<()> {
        if self.disposed {
            return Err(fence_disposed_error());
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }
}

// ============================================================================
// Mock Device
// ============================================================================

struct MockTexture {
    size: UVec2,
    format: PixelFormat,
    pixels: Vec<u8>,
}

/// In-memory device: textures and transfer buffers are byte vectors
pub struct MockDevice {
    next_name: AtomicU64,
    textures: Mutex<FxHashMap<u64, MockTexture>>,
    buffers: Mutex<FxHashMap<u64, Vec<u8>>>,
    ops: Mutex<Vec<String>>,
    /// Some(n): the alloc after n more successful ones fails
    alloc_failure: Mutex<Option<usize>>,
    wait_script: Arc<Mutex<VecDeque<WaitStatus>>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            next_name: AtomicU64::new(1),
            textures: Mutex::new(FxHashMap::default()),
            buffers: Mutex::new(FxHashMap::default()),
            ops: Mutex::new(Vec::new()),
            alloc_failure: Mutex::new(None),
            wait_script: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }

    /// All recorded operations, in call order
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    /// Make the next create_texture/create_transfer_buffer call fail
    pub fn fail_next_allocation(&self) {
        *self.alloc_failure.lock().unwrap() = Some(0);
    }

    /// Let `successes` allocations succeed, then fail the one after
    pub fn fail_allocation_after(&self, successes: usize) {
        *self.alloc_failure.lock().unwrap() = Some(successes);
    }

    /// Script the outcomes of upcoming fence waits (in order)
    pub fn script_wait_statuses(&self, statuses: &[WaitStatus]) {
        self.wait_script.lock().unwrap().extend(statuses.iter().copied());
    }

    pub fn texture_count(&self) -> usize {
        self.textures.lock().unwrap().len()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }

    /// Current pixel bytes of a texture, if it exists
    pub fn texture_pixels(&self, texture: u64) -> Option<Vec<u8>> {
        self.textures
            .lock()
            .unwrap()
            .get(&texture)
            .map(|t| t.pixels.clone())
    }

    fn take_alloc_failure(&self) -> bool {
        let mut countdown = self.alloc_failure.lock().unwrap();
        match countdown.take() {
            Some(0) => true,
            Some(remaining) => {
                *countdown = Some(remaining - 1);
                false
            }
            None => false,
        }
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for MockDevice {
    fn create_texture(&self, size: UVec2, format: PixelFormat) -> Result<u64> {
        if self.take_alloc_failure() {
            self.record("create_texture FAILED".to_string());
            return Err(Error::OutOfMemory);
        }
        let name = self.next_name.fetch_add(1, Ordering::SeqCst);
        self.textures.lock().unwrap().insert(
            name,
            MockTexture {
                size,
                format,
                pixels: vec![0u8; format.byte_len(size)],
            },
        );
        self.record(format!("create_texture {} {}x{}", name, size.x, size.y));
        Ok(name)
    }

    fn destroy_texture(&self, texture: u64) {
        self.textures.lock().unwrap().remove(&texture);
        self.record(format!("destroy_texture {}", texture));
    }

    fn upload_texture(
        &self,
        texture: u64,
        size: UVec2,
        format: PixelFormat,
        pixels: &[u8],
    ) -> Result<()> {
        if pixels.len() != format.byte_len(size) {
            return Err(Error::InvalidResource(format!(
                "upload of {} bytes into {}x{} texture",
                pixels.len(),
                size.x,
                size.y
            )));
        }
        let mut textures = self.textures.lock().unwrap();
        let entry = textures
            .get_mut(&texture)
            .ok_or_else(|| Error::InvalidResource(format!("texture {} not found", texture)))?;
        if entry.size != size || entry.format != format {
            return Err(Error::InvalidResource(format!(
                "upload geometry {}x{} does not match texture {}",
                size.x, size.y, texture
            )));
        }
        entry.pixels.clear();
        entry.pixels.extend_from_slice(pixels);
        drop(textures);
        self.record(format!("upload_texture {}", texture));
        Ok(())
    }

    fn create_transfer_buffer(&self, len: usize) -> Result<u64> {
        if self.take_alloc_failure() {
            self.record("create_transfer_buffer FAILED".to_string());
            return Err(Error::OutOfMemory);
        }
        let name = self.next_name.fetch_add(1, Ordering::SeqCst);
        self.buffers.lock().unwrap().insert(name, vec![0u8; len]);
        self.record(format!("create_transfer_buffer {} ({} B)", name, len));
        Ok(name)
    }

    fn destroy_transfer_buffer(&self, buffer: u64) {
        self.buffers.lock().unwrap().remove(&buffer);
        self.record(format!("destroy_transfer_buffer {}", buffer));
    }

    fn enqueue_readback(
        &self,
        texture: u64,
        _size: UVec2,
        _format: PixelFormat,
        buffer: u64,
    ) -> Result<()> {
        let textures = self.textures.lock().unwrap();
        let source = textures
            .get(&texture)
            .ok_or_else(|| Error::InvalidResource(format!("texture {} not found", texture)))?;
        let mut buffers = self.buffers.lock().unwrap();
        let target = buffers
            .get_mut(&buffer)
            .ok_or_else(|| Error::InvalidResource(format!("buffer {} not found", buffer)))?;
        let len = target.len().min(source.pixels.len());
        target[..len].copy_from_slice(&source.pixels[..len]);
        drop(buffers);
        drop(textures);
        self.record(format!("enqueue_readback {} -> {}", texture, buffer));
        Ok(())
    }

    fn map_transfer_buffer(&self, buffer: u64, len: usize) -> Result<*const u8> {
        let buffers = self.buffers.lock().unwrap();
        let bytes = buffers
            .get(&buffer)
            .ok_or_else(|| Error::InvalidResource(format!("buffer {} not found", buffer)))?;
        if bytes.len() < len {
            return Err(Error::InvalidResource(format!(
                "mapping {} bytes of a {} byte buffer",
                len,
                bytes.len()
            )));
        }
        let ptr = bytes.as_ptr();
        drop(buffers);
        self.record(format!("map_transfer_buffer {}", buffer));
        Ok(ptr)
    }

    fn unmap_transfer_buffer(&self, buffer: u64) {
        self.record(format!("unmap_transfer_buffer {}", buffer));
    }

    fn open_shared_texture(&self, share_handle: u64, size: UVec2) -> Result<u64> {
        let name = self.next_name.fetch_add(1, Ordering::SeqCst);
        self.textures.lock().unwrap().insert(
            name,
            MockTexture {
                size,
                format: PixelFormat::Rgba8,
                pixels: vec![0u8; PixelFormat::Rgba8.byte_len(size)],
            },
        );
        self.record(format!("open_shared_texture {:#x} -> {}", share_handle, name));
        Ok(name)
    }

    fn create_fence(&self) -> Result<Box<dyn GpuFence>> {
        self.record("create_fence".to_string());
        Ok(Box::new(MockFence {
            script: Arc::clone(&self.wait_script),
            disposed: false,
        }))
    }

    fn flush(&self) {
        self.record("flush".to_string());
    }
}

// ============================================================================
// Mock Interop Device
// ============================================================================

/// Interop device tracking registrations and lock state
pub struct MockInteropDevice {
    next_object: AtomicU64,
    registered: Mutex<FxHashMap<u64, u64>>,
    locked: Mutex<FxHashSet<u64>>,
    ops: Mutex<Vec<String>>,
    fail_register: AtomicBool,
    fail_lock: AtomicBool,
}

impl MockInteropDevice {
    pub fn new() -> Self {
        Self {
            next_object: AtomicU64::new(1),
            registered: Mutex::new(FxHashMap::default()),
            locked: Mutex::new(FxHashSet::default()),
            ops: Mutex::new(Vec::new()),
            fail_register: AtomicBool::new(false),
            fail_lock: AtomicBool::new(false),
        }
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn fail_next_register(&self) {
        self.fail_register.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_lock(&self) {
        self.fail_lock.store(true, Ordering::SeqCst);
    }

    pub fn registered_count(&self) -> usize {
        self.registered.lock().unwrap().len()
    }

    pub fn locked_count(&self) -> usize {
        self.locked.lock().unwrap().len()
    }
}

impl Default for MockInteropDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl InteropDevice for MockInteropDevice {
    fn register_texture(&self, texture: u64, _size: UVec2) -> Result<InteropRegistration> {
        if self.fail_register.swap(false, Ordering::SeqCst) {
            self.record(format!("register_texture {} FAILED", texture));
            return Err(Error::BackendError(
                "interop registration rejected".to_string(),
            ));
        }
        let object = self.next_object.fetch_add(1, Ordering::SeqCst);
        self.registered.lock().unwrap().insert(object, texture);
        self.record(format!("register_texture {} -> object {}", texture, object));
        Ok(InteropRegistration {
            object,
            share_handle: 0x4000_0000 + object,
        })
    }

    fn lock(&self, object: u64) -> Result<()> {
        if self.fail_lock.swap(false, Ordering::SeqCst) {
            self.record(format!("lock {} FAILED", object));
            return Err(Error::BackendError("interop lock rejected".to_string()));
        }
        if !self.registered.lock().unwrap().contains_key(&object) {
            return Err(Error::InvalidResource(format!(
                "lock of unregistered object {}",
                object
            )));
        }
        if !self.locked.lock().unwrap().insert(object) {
            return Err(Error::InvalidResource(format!(
                "object {} already locked",
                object
            )));
        }
        self.record(format!("lock {}", object));
        Ok(())
    }

    fn unlock(&self, object: u64) -> Result<()> {
        if !self.locked.lock().unwrap().remove(&object) {
            return Err(Error::InvalidResource(format!(
                "unlock of unlocked object {}",
                object
            )));
        }
        self.record(format!("unlock {}", object));
        Ok(())
    }

    fn unregister_texture(&self, object: u64) {
        self.registered.lock().unwrap().remove(&object);
        self.locked.lock().unwrap().remove(&object);
        self.record(format!("unregister_texture {}", object));
    }
}

// ============================================================================
// Mock Context
// ============================================================================

/// Context wrapper bundling a mock device with configurable kind and caps
pub struct MockContext {
    kind: ContextKind,
    caps: ContextCaps,
    device: Arc<MockDevice>,
    interop: Option<Arc<MockInteropDevice>>,
}

impl MockContext {
    pub fn new(kind: ContextKind, caps: ContextCaps) -> Self {
        let interop = if caps.contains(ContextCaps::SHARE_EXPORT) {
            Some(Arc::new(MockInteropDevice::new()))
        } else {
            None
        };
        Self {
            kind,
            caps,
            device: Arc::new(MockDevice::new()),
            interop,
        }
    }

    /// OpenGL-shaped producer: aliasing, readback, and real fences
    pub fn gl_like() -> Self {
        Self::new(
            ContextKind::OpenGl,
            ContextCaps::TEXTURE_ALIAS | ContextCaps::PIXEL_READBACK | ContextCaps::GPU_FENCES,
        )
    }

    /// OpenGL-shaped producer that can also export share handles
    pub fn gl_with_interop() -> Self {
        Self::new(
            ContextKind::OpenGl,
            ContextCaps::TEXTURE_ALIAS
                | ContextCaps::PIXEL_READBACK
                | ContextCaps::GPU_FENCES
                | ContextCaps::SHARE_EXPORT,
        )
    }

    /// Direct3D-shaped consumer: imports share handles
    pub fn d3d_like() -> Self {
        Self::new(
            ContextKind::Direct3d,
            ContextCaps::SHARE_IMPORT | ContextCaps::GPU_FENCES,
        )
    }

    /// Software consumer: uploads only
    pub fn software() -> Self {
        Self::new(ContextKind::Software, ContextCaps::empty())
    }

    /// Typed device accessor for test assertions
    pub fn mock_device(&self) -> Arc<MockDevice> {
        Arc::clone(&self.device)
    }

    /// Typed interop accessor for test assertions
    pub fn mock_interop(&self) -> Option<Arc<MockInteropDevice>> {
        self.interop.as_ref().map(Arc::clone)
    }
}

impl GpuContext for MockContext {
    fn kind(&self) -> ContextKind {
        self.kind
    }

    fn caps(&self) -> ContextCaps {
        self.caps
    }

    fn device(&self) -> Arc<dyn GpuDevice> {
        Arc::clone(&self.device) as Arc<dyn GpuDevice>
    }

    fn interop(&self) -> Option<Arc<dyn InteropDevice>> {
        self.interop
            .as_ref()
            .map(|interop| Arc::clone(interop) as Arc<dyn InteropDevice>)
    }
}

/// Register the "mock" provider in the global registry
pub fn register_mock_provider() {
    register_context_provider("mock", |_config| {
        Ok(Arc::new(MockContext::gl_like()) as Arc<dyn GpuContext>)
    });
}

#[cfg(test)]
#[path = "mock_context_tests.rs"]
mod tests;
