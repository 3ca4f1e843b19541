//! Plugin system for registering context providers
//!
//! Backend crates register a factory under a well-known name ("opengl",
//! "mock") at startup; hosts then create contexts by name through
//! `Bridge::create_context`. The registry is process-global and the chosen
//! provider stays fixed for the process lifetime.

use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::context::device::GpuContext;
use crate::error::{Error, Result};

/// Loader resolving native API entry points by name
///
/// Supplied by the host, which owns the native context (e.g. a
/// `wglGetProcAddress`/`glXGetProcAddress` wrapper).
pub type ProcLoader = Arc<dyn Fn(&str) -> *const c_void + Send + Sync>;

/// Context creation configuration
#[derive(Clone)]
pub struct ContextConfig {
    /// Provider name (e.g. "opengl")
    pub backend: String,
    /// Native entry-point loader, required by GPU-backed providers
    pub loader: Option<ProcLoader>,
    /// Enable backend debug output where supported
    pub enable_debug: bool,
}

impl ContextConfig {
    /// Config for the named provider with default settings
    pub fn new(backend: &str) -> Self {
        Self {
            backend: backend.to_string(),
            loader: None,
            enable_debug: cfg!(debug_assertions),
        }
    }

    /// Attach a native entry-point loader
    pub fn with_loader(mut self, loader: ProcLoader) -> Self {
        self.loader = Some(loader);
        self
    }
}

impl fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextConfig")
            .field("backend", &self.backend)
            .field("loader", &self.loader.as_ref().map(|_| "..."))
            .field("enable_debug", &self.enable_debug)
            .finish()
    }
}

/// Context provider factory function type
type ContextProviderFactory =
    Box<dyn Fn(&ContextConfig) -> Result<Arc<dyn GpuContext>> + Send + Sync>;

/// Registry of context provider factories
pub struct ContextProviderRegistry {
    providers: HashMap<&'static str, ContextProviderFactory>,
}

impl ContextProviderRegistry {
    fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider
    ///
    /// # Arguments
    ///
    /// * `name` - Provider name (e.g. "opengl")
    /// * `factory` - Factory function creating the context wrapper
    pub fn register_provider<F>(&mut self, name: &'static str, factory: F)
    where
        F: Fn(&ContextConfig) -> Result<Arc<dyn GpuContext>> + Send + Sync + 'static,
    {
        self.providers.insert(name, Box::new(factory));
    }

    /// Create a context using a registered provider
    pub fn create_context(&self, config: &ContextConfig) -> Result<Arc<dyn GpuContext>> {
        self.providers
            .get(config.backend.as_str())
            .ok_or_else(|| {
                Error::InitializationFailed(format!("provider '{}' not found", config.backend))
            })?(config)
    }
}

static CONTEXT_REGISTRY: Mutex<Option<ContextProviderRegistry>> = Mutex::new(None);

/// Get the global context provider registry
pub fn context_provider_registry() -> &'static Mutex<Option<ContextProviderRegistry>> {
    // Initialize on first access
    let mut registry = CONTEXT_REGISTRY.lock().unwrap();
    if registry.is_none() {
        *registry = Some(ContextProviderRegistry::new());
    }
    drop(registry);
    &CONTEXT_REGISTRY
}

/// Register a context provider in the global registry
///
/// # Arguments
///
/// * `name` - Provider name
/// * `factory` - Factory function
pub fn register_context_provider<F>(name: &'static str, factory: F)
where
    F: Fn(&ContextConfig) -> Result<Arc<dyn GpuContext>> + Send + Sync + 'static,
{
    context_provider_registry()
        .lock()
        .unwrap()
        .as_mut()
        .unwrap()
        .register_provider(name, factory);
}
