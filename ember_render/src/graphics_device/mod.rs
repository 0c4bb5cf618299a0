/// Graphics device module - backend-agnostic GPU abstraction

// Module declarations
pub mod graphics_device;
pub mod texture;
pub mod buffer;
pub mod sampler;
pub mod shader;
pub mod render_pass;
pub mod frame_buffer;
pub mod descriptor;
pub mod pipeline;
pub mod command_buffer;
pub mod sync;
pub mod swapchain;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use texture::*;
pub use buffer::*;
pub use sampler::*;
pub use shader::*;
pub use render_pass::*;
pub use frame_buffer::*;
pub use descriptor::*;
pub use pipeline::*;
pub use command_buffer::*;
pub use sync::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
