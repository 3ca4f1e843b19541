//! Internal logging system for FrameLink
//!
//! This module provides a flexible logging system with:
//! - Customizable logger via Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error)
//! - Colored console output by default
//! - Thread-safe logging with RwLock
//! - File and line information for detailed ERROR logs

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging implementations
///
/// Implement this trait to create custom loggers (file logging, host UI
/// log panes, etc.)
///
/// # Example
///
/// ```no_run
/// use frame_link::framelink::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::sync::Mutex<std::fs::File>,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         use std::io::Write;
///         if let Ok(mut file) = self.file.lock() {
///             let _ = writeln!(file, "{:?} {}", entry.severity, entry.message);
///         }
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level (Trace, Debug, Info, Warn, Error)
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source module (e.g., "framelink::backend", "framelink::gl::Device")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for detailed ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for detailed ERROR logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Very verbose debug information (typically disabled in release)
    Trace,

    /// Development/debugging information
    Debug,

    /// Important informational messages
    Info,

    /// Warning messages (potential issues)
    Warn,

    /// Error messages (critical issues with file:line details)
    Error,
}

/// Default logger implementation using colored console output
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Error: `[timestamp] [ERROR] [source] message (file:line)`
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        // Format timestamp as YYYY-MM-DD HH:MM:SS.mmm
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let severity_str = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            println!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp,
                severity_str,
                source,
                entry.message,
                file,
                line
            );
        } else {
            println!(
                "[{}] [{}] [{}] {}",
                timestamp,
                severity_str,
                source,
                entry.message
            );
        }
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message (very verbose, typically disabled)
///
/// # Example
///
/// ```no_run
/// use frame_link::bridge_trace;
///
/// bridge_trace!("framelink::backend", "Entering acquire()");
/// ```
#[macro_export]
macro_rules! bridge_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::framelink::Bridge::log(
            $crate::framelink::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message (development information)
///
/// # Example
///
/// ```no_run
/// use frame_link::bridge_debug;
///
/// let count = 3;
/// bridge_debug!("framelink::backend", "Pool allocated with {} images", count);
/// ```
#[macro_export]
macro_rules! bridge_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::framelink::Bridge::log(
            $crate::framelink::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message (important events)
///
/// # Example
///
/// ```no_run
/// use frame_link::bridge_info;
///
/// bridge_info!("framelink::backend", "Swapchain created");
/// ```
#[macro_export]
macro_rules! bridge_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::framelink::Bridge::log(
            $crate::framelink::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message (potential issues)
///
/// # Example
///
/// ```no_run
/// use frame_link::bridge_warn;
///
/// let ms = 100;
/// bridge_warn!("framelink::backend", "Fence wait timed out after {} ms", ms);
/// ```
#[macro_export]
macro_rules! bridge_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::framelink::Bridge::log(
            $crate::framelink::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
///
/// # Example
///
/// ```no_run
/// use frame_link::bridge_error;
///
/// let error = "out of device memory";
/// bridge_error!("framelink::backend", "Failed to allocate image: {}", error);
/// ```
#[macro_export]
macro_rules! bridge_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::framelink::Bridge::log_detailed(
            $crate::framelink::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR message and produce a backend `Error` value
///
/// Evaluates to `Error::BackendError` with the formatted message, so it can
/// be used directly inside `Err(...)` or `map_err` closures.
///
/// # Example
///
/// ```no_run
/// use frame_link::bridge_err;
/// use frame_link::framelink::Result;
///
/// fn lookup(texture: Option<u64>, id: u32) -> Result<u64> {
///     texture.ok_or_else(|| bridge_err!("framelink::gl", "Texture {} not found", id))
/// }
/// ```
#[macro_export]
macro_rules! bridge_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::framelink::Bridge::log_detailed(
            $crate::framelink::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::framelink::Error::BackendError(message)
    }};
}

/// Log an ERROR message and early-return it as `Err`
///
/// # Example
///
/// ```no_run
/// use frame_link::bridge_bail;
/// use frame_link::framelink::Result;
///
/// fn validate(width: u32) -> Result<()> {
///     if width == 0 {
///         bridge_bail!("framelink::backend", "Swapchain size must be non-zero");
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! bridge_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::bridge_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
