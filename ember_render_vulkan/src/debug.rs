/// Vulkan debug messenger - routes validation layer messages to the engine
/// logger and keeps per-severity statistics.

use ash::vk;
use colored::*;
use ember_render::{engine_debug, engine_error, engine_trace, engine_warn};
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// Set while a messenger exists; callbacks arriving after cleanup are dropped
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrences per message ID, for grouping repeated messages
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Snapshot of validation message counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Reset statistics and start accepting callbacks
pub fn init_debug_config() {
    VALIDATION_STATS.reset();
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(FxHashMap::default());
    }
    DEBUG_ENABLED.store(true, Ordering::Release);
}

/// Stop accepting callbacks (called before the messenger is destroyed)
pub fn cleanup_debug_config() {
    DEBUG_ENABLED.store(false, Ordering::Release);
}

/// Current validation statistics
pub fn validation_stats() -> ValidationStats {
    VALIDATION_STATS.snapshot()
}

/// Print validation statistics to stdout
pub fn print_validation_stats_report() {
    let stats = validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    if let Ok(tracker) = MESSAGE_TRACKER.lock() {
        let repeated = tracker
            .as_ref()
            .map(|messages| messages.values().filter(|&&count| count > 1).count())
            .unwrap_or(0);
        if repeated > 0 {
            println!("\n  {} message(s) appeared multiple times", repeated);
        }
    }

    println!("{}\n", "====================================".bright_blue().bold());
}

fn track_message(message_id: &str) -> u32 {
    let Ok(mut tracker) = MESSAGE_TRACKER.lock() else {
        return 1;
    };
    let messages = tracker.get_or_insert_with(FxHashMap::default);
    let count = messages.entry(message_id.to_string()).or_insert(0);
    *count += 1;
    *count
}

unsafe fn c_str_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> &'a str {
    if ptr.is_null() {
        fallback
    } else {
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap_or("Invalid UTF-8")
    }
}

/// Vulkan debug messenger callback
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if !DEBUG_ENABLED.load(Ordering::Acquire) || p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message_id = unsafe { c_str_or(callback_data.p_message_id_name, "Unknown") };
    let message = unsafe { c_str_or(callback_data.p_message, "No message") };

    let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    let occurrences = track_message(message_id);
    let repeat = if occurrences > 1 { format!(" [x{}]", occurrences) } else { String::new() };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        VALIDATION_STATS.errors.fetch_add(1, Ordering::Relaxed);
        engine_error!("ember::vulkan", "[{}]{} {}: {}", type_str, repeat, message_id, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        VALIDATION_STATS.warnings.fetch_add(1, Ordering::Relaxed);
        engine_warn!("ember::vulkan", "[{}]{} {}: {}", type_str, repeat, message_id, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        VALIDATION_STATS.info.fetch_add(1, Ordering::Relaxed);
        engine_debug!("ember::vulkan", "[{}] {}: {}", type_str, message_id, message);
    } else {
        VALIDATION_STATS.verbose.fetch_add(1, Ordering::Relaxed);
        engine_trace!("ember::vulkan", "[{}] {}: {}", type_str, message_id, message);
    }

    // Never abort the Vulkan call
    vk::FALSE
}
