/// Render context - explicit device and configuration handle
///
/// Handed by reference to every component constructor and per-frame call.
/// Holding a `RenderContext` proves a device exists.

use std::sync::Arc;
use crate::config::RenderConfig;
use crate::error::Result;
use crate::graphics_device::GraphicsDevice;

/// Device + configuration shared by all renderer components
#[derive(Clone)]
pub struct RenderContext {
    device: Arc<dyn GraphicsDevice>,
    config: RenderConfig,
}

impl RenderContext {
    /// Create a context after validating the configuration
    ///
    /// # Arguments
    ///
    /// * `device` - Backend graphics device
    /// * `config` - Renderer configuration
    pub fn new(device: Arc<dyn GraphicsDevice>, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { device, config })
    }

    /// The backend device
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The renderer configuration
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Number of copies of every per-frame resource
    pub fn frames_in_flight(&self) -> u32 {
        self.config.frames_in_flight
    }
}
