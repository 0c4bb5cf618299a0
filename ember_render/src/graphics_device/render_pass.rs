/// Render pass trait and descriptors
///
/// A render pass describes how attachments are loaded, stored and
/// transitioned, and how its single subpass is ordered against work
/// outside the pass.

use bitflags::bitflags;
use crate::graphics_device::TextureFormat;

/// Render pass trait
pub trait RenderPass: Send + Sync {
    /// Number of color attachments referenced by the subpass
    fn color_attachment_count(&self) -> u32;

    /// Whether the subpass references a depth/stencil attachment
    fn has_depth_attachment(&self) -> bool;
}

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    /// Load existing content
    Load,
    /// Clear the content
    Clear,
    /// Don't care about existing content
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Store the rendered content
    Store,
    /// Don't care about storing the content
    DontCare,
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    /// Undefined layout (initial state)
    Undefined,
    /// Layout for color attachment
    ColorAttachment,
    /// Layout for depth/stencil attachment
    DepthStencilAttachment,
    /// Layout for sampling a depth/stencil attachment
    DepthStencilReadOnly,
    /// Layout for shader read-only access
    ShaderReadOnly,
    /// Layout for presenting to swapchain
    PresentSrc,
}

bitflags! {
    /// Pipeline stages named by subpass dependencies and semaphore waits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_SHADER = 1 << 1;
        const EARLY_FRAGMENT_TESTS = 1 << 2;
        const FRAGMENT_SHADER = 1 << 3;
        const LATE_FRAGMENT_TESTS = 1 << 4;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 5;
        const BOTTOM_OF_PIPE = 1 << 6;
    }
}

bitflags! {
    /// Memory access types named by subpass dependencies
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const SHADER_READ = 1 << 0;
        const COLOR_ATTACHMENT_READ = 1 << 1;
        const COLOR_ATTACHMENT_WRITE = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 3;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 4;
        const MEMORY_READ = 1 << 5;
        const MEMORY_WRITE = 1 << 6;
    }
}

/// One side of a subpass dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubpassRef {
    /// Work outside the render pass
    External,
    /// A subpass of this render pass
    Index(u32),
}

/// Execution and memory dependency between subpasses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubpassDependency {
    pub src_subpass: SubpassRef,
    pub dst_subpass: SubpassRef,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    /// Dependency is framebuffer-local
    pub by_region: bool,
}

/// Descriptor for a single attachment in a render pass
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentDescription {
    /// Pixel format
    pub format: TextureFormat,
    /// Number of samples (1 = no MSAA)
    pub samples: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    /// Layout the attachment is in when the pass begins
    pub initial_layout: ImageLayout,
    /// Layout the attachment is transitioned to when the pass ends
    pub final_layout: ImageLayout,
}

/// Descriptor for creating a single-subpass render pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDesc {
    /// All attachments, in framebuffer order
    pub attachments: Vec<AttachmentDescription>,
    /// Indices into `attachments` used as color outputs
    pub color_refs: Vec<u32>,
    /// Index into `attachments` used as depth/stencil output
    pub depth_ref: Option<u32>,
    /// Ordering against work outside the pass
    pub dependencies: Vec<SubpassDependency>,
}
