/// Graphics pipeline trait and descriptor

use std::sync::Arc;
use crate::graphics_device::{DescriptorSetLayout, RenderPass, Shader, ShaderStageFlags};

/// Graphics pipeline trait
pub trait Pipeline: Send + Sync {
    /// Debug label given at creation
    fn label(&self) -> &str;
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum VertexFormat {
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R8G8B8A8_UNORM,
}

/// One attribute within the vertex binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

/// Layout of the single per-vertex binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
}

/// Polygon rasterization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Winding considered front-facing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Depth comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessOrEqual,
    Always,
}

/// Rasterizer state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationState {
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub line_width: f32,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            line_width: 1.0,
        }
    }
}

/// Depth test state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    pub test_enable: bool,
    pub write_enable: bool,
    pub compare_op: CompareOp,
}

impl DepthState {
    pub fn disabled() -> Self {
        Self { test_enable: false, write_enable: false, compare_op: CompareOp::Always }
    }

    pub fn less() -> Self {
        Self { test_enable: true, write_enable: true, compare_op: CompareOp::Less }
    }
}

/// Color blending applied to every color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendState {
    /// Blending disabled, writes RGBA
    Opaque,
    /// src_alpha / one_minus_src_alpha
    AlphaBlend,
}

/// Push constant range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

/// Pipeline descriptor
///
/// Viewport and scissor are always dynamic state.
#[derive(Clone)]
pub struct PipelineDesc {
    /// Debug label
    pub label: String,
    pub vertex_shader: Arc<dyn Shader>,
    pub fragment_shader: Arc<dyn Shader>,
    /// Render pass the pipeline renders within (subpass 0)
    pub render_pass: Arc<dyn RenderPass>,
    pub descriptor_set_layouts: Vec<Arc<dyn DescriptorSetLayout>>,
    pub push_constant_ranges: Vec<PushConstantRange>,
    /// None for pipelines generating vertices in the shader
    pub vertex_layout: Option<VertexLayout>,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth: DepthState,
    pub blend: BlendState,
}
