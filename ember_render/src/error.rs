//! Error types for the Ember renderer
//!
//! Recoverable surface conditions (out-of-date or suboptimal swapchain) are
//! not errors: they travel as `AcquireResult` / `PresentResult` values.
//! Everything represented here is fatal to the frame loop.

use std::fmt;

/// Result type for Ember renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ember renderer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (buffer, texture, attachment, etc.)
    InvalidResource(String),

    /// Initialization failed (device, swapchain, pipeline construction)
    InitializationFailed(String),

    /// A call was made in a state that does not allow it
    /// (recording outside `Recording`, render pass before attachments, ...)
    InvalidOperation(String),

    /// The descriptor pool's static capacity was exceeded
    DescriptorPoolExhausted(String),

    /// The device was lost or a fence wait timed out
    DeviceLost(String),
}

impl Error {
    /// Whether the error must terminate the frame loop.
    ///
    /// Always true: a failed submit, acquire or allocation leaves the GPU
    /// resource graph in an unknown state. New variants must pick a side here.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::BackendError(_)
            | Error::OutOfMemory
            | Error::InvalidResource(_)
            | Error::InitializationFailed(_)
            | Error::InvalidOperation(_)
            | Error::DescriptorPoolExhausted(_)
            | Error::DeviceLost(_) => true,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Error::DescriptorPoolExhausted(msg) => write!(f, "Descriptor pool exhausted: {}", msg),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
