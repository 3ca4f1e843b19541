/// GL Debug Output - KHR_debug message callback with colored console output
///
/// Installed when a context is created with `enable_debug`. Messages are
/// printed with severity colors and grouped when the driver repeats itself;
/// counters survive for an end-of-run report.

use colored::*;
use frame_link::bridge_debug;
use glow::HasContext;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Global message statistics (thread-safe atomic counters)
static STATS: StatsTracker = StatsTracker::new();

/// Global tracker grouping identical messages
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Counts of GL debug messages received since the callback was installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageStats {
    /// High severity messages
    pub errors: u32,
    /// Medium and low severity messages
    pub warnings: u32,
    /// Notification severity messages
    pub notes: u32,
}

impl DebugMessageStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.notes
    }
}

/// Thread-safe statistics tracker
struct StatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    notes: AtomicU32,
}

impl StatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            notes: AtomicU32::new(0),
        }
    }

    fn get(&self) -> DebugMessageStats {
        DebugMessageStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            notes: self.notes.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.notes.store(0, Ordering::Relaxed);
    }
}

/// Install the debug callback on the wrapped context
pub(crate) fn install(gl: &mut glow::Context) {
    unsafe {
        if !gl.supports_debug() {
            bridge_debug!(
                "framelink::gl",
                "KHR_debug not supported, debug output stays off"
            );
            return;
        }
        STATS.reset();
        *MESSAGE_TRACKER.lock().unwrap() = Some(FxHashMap::default());
        gl.enable(glow::DEBUG_OUTPUT);
        gl.enable(glow::DEBUG_OUTPUT_SYNCHRONOUS);
        gl.debug_message_callback(handle_message);
        bridge_debug!("framelink::gl", "GL debug output enabled");
    }
}

/// Get current debug message statistics
pub fn debug_message_stats() -> DebugMessageStats {
    STATS.get()
}

/// Print a summary of the debug messages received so far
pub fn print_debug_message_report() {
    let stats = debug_message_stats();

    if stats.total() == 0 {
        println!("\n{}", "✓ No GL debug messages".green().bold());
        return;
    }

    println!("\n{}", "=== GL Debug Message Report ===".bright_blue().bold());

    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.notes > 0 {
        println!("  {} {}", "Notes:".bright_black(), stats.notes);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    let tracker_guard = MESSAGE_TRACKER.lock().unwrap();
    if let Some(tracker) = tracker_guard.as_ref() {
        let duplicate_count = tracker.values().filter(|&&count| count > 1).count();
        if duplicate_count > 0 {
            println!(
                "\n  {} {} message(s) appeared multiple times",
                "ℹ".cyan(),
                duplicate_count
            );
        }
    }

    println!("{}\n", "===============================".bright_blue().bold());
}

/// GL debug message callback
///
/// Called by the driver on the context thread (DEBUG_OUTPUT_SYNCHRONOUS).
fn handle_message(source: u32, message_type: u32, id: u32, severity: u32, message: &str) {
    // Increment statistics and pick the severity tag
    let severity_colored = match severity {
        glow::DEBUG_SEVERITY_HIGH => {
            STATS.errors.fetch_add(1, Ordering::Relaxed);
            "ERROR".red().bold()
        }
        glow::DEBUG_SEVERITY_MEDIUM => {
            STATS.warnings.fetch_add(1, Ordering::Relaxed);
            "WARNING".yellow().bold()
        }
        glow::DEBUG_SEVERITY_LOW => {
            STATS.warnings.fetch_add(1, Ordering::Relaxed);
            "WARNING".yellow()
        }
        _ => {
            // Notification chatter is counted but not printed
            STATS.notes.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let type_str = match message_type {
        glow::DEBUG_TYPE_ERROR => "Error",
        glow::DEBUG_TYPE_DEPRECATED_BEHAVIOR => "Deprecated",
        glow::DEBUG_TYPE_UNDEFINED_BEHAVIOR => "Undefined",
        glow::DEBUG_TYPE_PORTABILITY => "Portability",
        glow::DEBUG_TYPE_PERFORMANCE => "Performance",
        glow::DEBUG_TYPE_MARKER => "Marker",
        _ => "Other",
    };

    let source_str = match source {
        glow::DEBUG_SOURCE_API => "API",
        glow::DEBUG_SOURCE_WINDOW_SYSTEM => "Window System",
        glow::DEBUG_SOURCE_SHADER_COMPILER => "Shader Compiler",
        glow::DEBUG_SOURCE_THIRD_PARTY => "Third Party",
        glow::DEBUG_SOURCE_APPLICATION => "Application",
        _ => "Other",
    };

    // Track message for grouping
    let occurrence_count = {
        let mut tracker_guard = MESSAGE_TRACKER.lock().unwrap();
        let tracker = tracker_guard.get_or_insert_with(FxHashMap::default);
        let count = tracker.entry(message.to_string()).or_insert(0);
        *count += 1;
        *count
    };

    let repeat_indicator = if occurrence_count > 1 {
        format!(" [×{}]", occurrence_count)
    } else {
        String::new()
    };

    eprint!(
        "{} {} [{} / {} / id {}]{}\n  └─ {}\n",
        "[GL".bright_blue().bold(),
        format!("{}]", severity_colored).bright_blue().bold(),
        type_str.bright_black(),
        source_str.bright_black(),
        id,
        repeat_indicator.yellow(),
        message.white()
    );
}
