/// Renderer configuration
///
/// Passed explicitly to every component that needs it; there is no global
/// configuration singleton.

use std::time::Duration;
use crate::error::Result;
use crate::graphics_device::{DescriptorPoolDesc, PresentMode};
use crate::engine_bail;

/// Upper bound on frames in flight (sync slots, per-frame buffers)
pub const MAX_FRAMES_IN_FLIGHT: u32 = 3;

/// Capacity of each light array in the lighting uniform buffer
pub const MAX_LIGHTS: usize = 32;

/// Maximum push constant range usable by any stage, in bytes
pub const MAX_PUSH_CONSTANT_SIZE: u32 = 128;

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Application name (reported to the driver)
    pub app_name: String,
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Number of frames the CPU may record ahead of the GPU.
    /// Sizes every per-frame resource; independent of the swapchain image count.
    pub frames_in_flight: u32,
    /// Requested swapchain image count, clamped to surface capabilities
    pub requested_image_count: u32,
    /// Preferred presentation mode (FIFO is the fallback)
    pub preferred_present_mode: PresentMode,
    /// Fence wait timeout; expiry is treated as a lost device
    pub fence_timeout: Duration,
    /// Resolution of the offscreen G-buffer (square)
    pub offscreen_extent: u32,
    /// Shared descriptor pool sizing
    pub descriptor_pool: DescriptorPoolDesc,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            app_name: "Ember Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            frames_in_flight: 2,
            requested_image_count: 3,
            preferred_present_mode: PresentMode::Mailbox,
            fence_timeout: Duration::from_secs(5),
            offscreen_extent: 2048,
            descriptor_pool: DescriptorPoolDesc::default(),
        }
    }
}

impl RenderConfig {
    /// Check the configuration for values no component can work with
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            engine_bail!(InitializationFailed, "ember::config",
                "frames_in_flight must be in [1, {}], got {}",
                MAX_FRAMES_IN_FLIGHT, self.frames_in_flight);
        }
        if self.requested_image_count == 0 {
            engine_bail!(InitializationFailed, "ember::config",
                "requested_image_count must be at least 1");
        }
        if self.offscreen_extent == 0 {
            engine_bail!(InitializationFailed, "ember::config",
                "offscreen_extent must be non-zero");
        }
        if self.fence_timeout.is_zero() {
            engine_bail!(InitializationFailed, "ember::config",
                "fence_timeout must be non-zero");
        }
        if self.descriptor_pool.max_sets == 0 {
            engine_bail!(InitializationFailed, "ember::config",
                "descriptor pool must allow at least one set");
        }
        Ok(())
    }

    /// Fence timeout in nanoseconds, as the backends consume it
    pub fn fence_timeout_ns(&self) -> u64 {
        u64::try_from(self.fence_timeout.as_nanos()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
