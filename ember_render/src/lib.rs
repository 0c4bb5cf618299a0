/*!
# Ember Render

Deferred multi-pass renderer core with explicit frame synchronization.

The crate is backend-agnostic: every GPU object is reached through the
traits of [`graphics_device`], implemented by a backend crate (Vulkan:
`ember_render_vulkan`) and, in tests, by a recording mock device.

## Architecture

- **SwapchainManager**: presentable images, acquire/present, recreation
- **FrameBuffer / Attachment**: privately owned render targets
- **CommandRecorder**: state-tracked command buffer recording
- **Subpass**: offscreen G-buffer fill, composite lighting, debug overlay, UI
- **RenderPipeline**: builds and drives the ordered subpass list
- **FrameSynchronizer**: per-frame-in-flight semaphores, fences and recorders
- **Renderer**: frame loop facade tying them together
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod context;
pub mod graphics_device;
pub mod frame_buffer;
pub mod command_recorder;
pub mod swapchain_manager;
pub mod scene;
pub mod subpass;
pub mod render_pipeline;
pub mod frame_synchronizer;
pub mod renderer;

#[cfg(test)]
mod test_support;

// Main ember namespace module
pub mod ember {
    // Error types
    pub use crate::error::{Error, Result};

    // Logger registry
    pub use crate::engine::Engine;

    // Configuration and context
    pub use crate::config::{RenderConfig, MAX_FRAMES_IN_FLIGHT, MAX_LIGHTS};
    pub use crate::context::RenderContext;

    // Frame loop
    pub use crate::renderer::Renderer;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Render sub-module with the pipeline building blocks
    pub mod render {
        pub use crate::command_recorder::{CommandRecorder, RecorderState, submit_one_time};
        pub use crate::frame_buffer::*;
        pub use crate::frame_synchronizer::{FrameInfo, FrameStatus, FrameSynchronizer, SlotState};
        pub use crate::render_pipeline::RenderPipeline;
        pub use crate::subpass::*;
        pub use crate::swapchain_manager::SwapchainManager;
    }

    // Backend traits and descriptors
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
