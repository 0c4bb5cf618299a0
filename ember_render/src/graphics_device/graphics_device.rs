/// GraphicsDevice trait - main factory interface of a backend
///
/// The device context owns the logical device, the graphics queue, the
/// presentation surface and memory allocation. Device selection happens in
/// the backend constructor, never in the renderer.

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, CommandBuffer, DescriptorPool, DescriptorPoolDesc,
    DescriptorSetLayout, DescriptorSetLayoutDesc, Fence, FenceWait, Framebuffer,
    FramebufferDesc, Pipeline, PipelineDesc, RenderPass, RenderPassDesc, Sampler,
    SamplerDesc, Semaphore, Shader, ShaderDesc, SubmitInfo, SurfaceCapabilities,
    Swapchain, SwapchainDesc, Texture, TextureDesc, TextureFormat,
};

/// Main graphics device trait
///
/// Implemented by backend-specific devices (e.g., VulkanGraphicsDevice).
pub trait GraphicsDevice: Send + Sync {
    // ===== PRESENTATION =====

    /// Query the presentation surface's capabilities
    fn surface_capabilities(&self) -> Result<SurfaceCapabilities>;

    /// Create a swapchain with fully resolved parameters
    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<Box<dyn Swapchain>>;

    // ===== RESOURCES =====

    /// Create a host-visible buffer
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a texture with its default view
    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Create a sampler
    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>>;

    /// Create a shader module
    fn create_shader(&self, desc: &ShaderDesc) -> Result<Arc<dyn Shader>>;

    /// Best depth/stencil format supported as an attachment
    fn supported_depth_format(&self) -> Result<TextureFormat>;

    // ===== RENDER STATE =====

    /// Create a render pass
    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    /// Create a framebuffer
    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>>;

    /// Create a descriptor set layout
    fn create_descriptor_set_layout(&self, desc: &DescriptorSetLayoutDesc) -> Result<Arc<dyn DescriptorSetLayout>>;

    /// Create a descriptor pool with static capacity
    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<Arc<dyn DescriptorPool>>;

    /// Create a graphics pipeline
    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    // ===== COMMANDS AND SYNCHRONIZATION =====

    /// Create a primary command buffer (with its own pool)
    fn create_command_buffer(&self) -> Result<Box<dyn CommandBuffer>>;

    /// Create a semaphore
    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>>;

    /// Create a fence
    ///
    /// # Arguments
    ///
    /// * `signaled` - Create the fence in the signaled state
    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>>;

    /// Block until `fence` is signaled or `timeout_ns` elapses
    fn wait_for_fence(&self, fence: &dyn Fence, timeout_ns: u64) -> Result<FenceWait>;

    /// Return `fence` to the unsignaled state
    fn reset_fence(&self, fence: &dyn Fence) -> Result<()>;

    /// Submit a batch to the graphics queue
    fn submit(&self, info: &SubmitInfo) -> Result<()>;

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;
}
