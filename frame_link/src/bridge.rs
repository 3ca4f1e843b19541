//! FrameLink facade - global logging and context creation
//!
//! This module provides the process-wide entry points shared by both halves
//! of a swapchain: the logger storage used by the `bridge_*` macros and the
//! creation of native context wrappers through the provider registry.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::SystemTime;

use crate::bridge_info;
use crate::context::{ContextConfig, GpuContext, context_provider_registry};
use crate::error::Result;
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

/// Global logger (initialized with DefaultLogger on first use)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// FrameLink facade
///
/// Stateless entry point for the library-wide services: logging (consumed by
/// the `bridge_trace!`/`bridge_debug!`/`bridge_info!`/`bridge_warn!`/
/// `bridge_error!` macros) and context creation through registered providers.
///
/// # Example
///
/// ```no_run
/// use frame_link::framelink::Bridge;
/// use frame_link::framelink::context::ContextConfig;
///
/// frame_link_context_gl::register();
///
/// let config = ContextConfig::new("opengl");
/// let context = Bridge::create_context(&config)?;
/// # Ok::<(), frame_link::framelink::Error>(())
/// ```
pub struct Bridge;

impl Bridge {
    // ===== CONTEXT CREATION =====

    /// Create a native context wrapper using a registered provider
    ///
    /// # Arguments
    ///
    /// * `config` - Provider name and backend-specific settings
    ///
    /// # Returns
    ///
    /// A shared context handle, or `Error::InitializationFailed` when no
    /// provider with the configured name is registered.
    pub fn create_context(config: &ContextConfig) -> Result<Arc<dyn GpuContext>> {
        let context = context_provider_registry()
            .lock()
            .unwrap()
            .as_ref()
            .unwrap()
            .create_context(config)?;
        bridge_info!(
            "framelink::Bridge",
            "Created '{}' context ({:?})",
            config.backend,
            context.kind()
        );
        Ok(context)
    }

    // ===== LOGGING =====

    /// Replace the global logger
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(logger);
        }
    }

    /// Restore the default console logger
    pub fn reset_logger() {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Log a message through the global logger
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Log a message with source file and line information
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
