/*!
# Ember Render - Vulkan Backend

Vulkan implementation of the `ember_render` graphics device traits, built on
ash for the API bindings and gpu-allocator for memory management.

```no_run
use ember_render::ember::{RenderConfig, RenderContext};
use ember_render_vulkan::VulkanGraphicsDevice;
use std::sync::Arc;
# fn run(window: &winit::window::Window) -> ember_render::ember::Result<()> {
let config = RenderConfig::default();
let device = VulkanGraphicsDevice::new(window, &config)?;
let ctx = RenderContext::new(Arc::new(device), config)?;
# Ok(())
# }
```
*/

mod vulkan;
mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_render_pass;
mod vulkan_frame_buffer;
mod vulkan_descriptor_set;
mod vulkan_pipeline;
mod vulkan_command_buffer;
mod vulkan_sync;
mod vulkan_swapchain;
mod debug;

pub use vulkan::VulkanGraphicsDevice;

// Validation layer statistics
pub use debug::{print_validation_stats_report, validation_stats, ValidationStats};
