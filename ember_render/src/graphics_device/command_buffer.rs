/// CommandBuffer trait - raw GPU command recording
///
/// State tracking lives in `CommandRecorder`; backends only translate
/// calls to the native API.

use crate::error::Result;
use crate::graphics_device::{
    Buffer, DescriptorSet, Framebuffer, Pipeline, RenderPass, ShaderStageFlags,
};

/// Viewport for rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-target viewport with depth range [0, 1]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Rectangle for scissor and render areas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

/// Intended submission pattern for a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferUsage {
    /// Submitted once, then reset
    OneTimeSubmit,
    /// May be pending on the GPU more than once
    SimultaneousUse,
}

/// Command buffer trait
///
/// Backends own one command pool per command buffer, so buffers may be
/// reset individually.
pub trait CommandBuffer: Send + Sync {
    fn begin(&mut self, usage: CommandBufferUsage) -> Result<()>;

    fn end(&mut self) -> Result<()>;

    /// Return the buffer to its initial state. The GPU must be done with it.
    fn reset(&mut self) -> Result<()>;

    fn begin_render_pass(
        &mut self,
        render_pass: &dyn RenderPass,
        framebuffer: &dyn Framebuffer,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()>;

    fn end_render_pass(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()>;

    /// Bind a descriptor set at set index 0 of the pipeline's layout
    fn bind_descriptor_set(&mut self, pipeline: &dyn Pipeline, set: &dyn DescriptorSet) -> Result<()>;

    fn push_constants(
        &mut self,
        pipeline: &dyn Pipeline,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()>;

    fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, index_type: IndexType) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()>;

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()>;
}
