//! Internal logging system for the Ember renderer
//!
//! This module provides:
//! - A pluggable logger via the Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error)
//! - Colored console output by default
//! - File and line information for ERROR logs
//! - `engine_err!` / `engine_bail!` to log and produce an `Error` in one step

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging implementations
///
/// # Example
///
/// ```no_run
/// use ember_render::ember::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::fs::File,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    ///
    /// # Arguments
    ///
    /// * `entry` - The log entry to process
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source component (e.g., "ember::swapchain", "ember::vulkan")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for ERROR logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Per-frame chatter, disabled in practice
    Trace,

    /// Development information
    Debug,

    /// Lifecycle events (construction, recreation, shutdown)
    Info,

    /// Recoverable anomalies (out-of-date swapchain, dropped lights)
    Warn,

    /// Fatal conditions, logged with file:line
    Error,
}

impl LogSeverity {
    /// Fixed-width label used by the default logger
    pub fn label(&self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }
}

/// Default logger implementation using colored console output
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Error: `[timestamp] [ERROR] [source] message (file:line)`
pub struct DefaultLogger;

impl DefaultLogger {
    /// Render an entry without color codes
    pub fn format_plain(entry: &LogEntry) -> String {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        match (entry.file, entry.line) {
            (Some(file), Some(line)) => format!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, entry.severity.label(), entry.source, entry.message, file, line
            ),
            _ => format!(
                "[{}] [{}] [{}] {}",
                timestamp, entry.severity.label(), entry.source, entry.message
            ),
        }
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let label = entry.severity.label();
        let severity_str = match entry.severity {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            eprintln!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, severity_str, source, entry.message, file, line
            );
        } else {
            println!("[{}] [{}] [{}] {}", timestamp, severity_str, source, entry.message);
        }
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message
///
/// ```no_run
/// # use ember_render::engine_trace;
/// # let (slot, image) = (0u32, 0u32);
/// engine_trace!("ember::sync", "Slot {} acquired image {}", slot, image);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::ember::Engine::log(
            $crate::ember::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::ember::Engine::log(
            $crate::ember::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message
///
/// ```no_run
/// # use ember_render::engine_info;
/// # let count = 3u32;
/// engine_info!("ember::swapchain", "Created swapchain with {} images", count);
/// ```
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::ember::Engine::log(
            $crate::ember::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::ember::Engine::log(
            $crate::ember::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
///
/// ```no_run
/// # use ember_render::engine_error;
/// # let result = "VK_ERROR_DEVICE_LOST";
/// engine_error!("ember::vulkan", "Failed to create fence: {:?}", result);
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::ember::Engine::log_detailed(
            $crate::ember::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR message and evaluate to an `Error`
///
/// Without a variant the message becomes an `Error::BackendError`:
///
/// ```no_run
/// # use ember_render::engine_err;
/// # let e = "VK_ERROR_MEMORY_MAP_FAILED";
/// let err = engine_err!("ember::vulkan", "Failed to map buffer: {:?}", e);
/// let err = engine_err!(InvalidOperation, "ember::recorder", "Not recording");
/// ```
#[macro_export]
macro_rules! engine_err {
    ($variant:ident, $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::ember::Engine::log_detailed(
            $crate::ember::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::ember::Error::$variant(message)
    }};
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::ember::Engine::log_detailed(
            $crate::ember::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::ember::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return early with the matching `Error`
///
/// ```no_run
/// # use ember_render::engine_bail;
/// # fn f() -> Result<(), ember_render::ember::Error> {
/// engine_bail!(InvalidOperation, "ember::frame_buffer", "No attachments");
/// # }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($variant:ident, $source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($variant, $source, $($arg)*))
    };
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
