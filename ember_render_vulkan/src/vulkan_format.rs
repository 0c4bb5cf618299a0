/// Conversions between renderer descriptors and Vulkan enums
///
/// Pure functions, usable without a device.

use ash::vk;
use ember_render::ember::device::{
    AccessFlags, AddressMode, BlendState, BorderColor, BufferUsage, ColorSpace, CompareOp,
    CullMode, DescriptorType, Filter, FrontFace, ImageAspect, ImageLayout, IndexType, LoadOp,
    PipelineStages, PolygonMode, PresentMode, PrimitiveTopology, ShaderStage, ShaderStageFlags,
    StoreOp, SubpassRef, TextureFormat, TextureUsage, TextureViewType, VertexFormat,
};

// ===== FORMATS =====

pub fn format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::S8_UINT => vk::Format::S8_UINT,
        TextureFormat::D16_UNORM => vk::Format::D16_UNORM,
        TextureFormat::X8_D24_UNORM_PACK32 => vk::Format::X8_D24_UNORM_PACK32,
        TextureFormat::D32_SFLOAT => vk::Format::D32_SFLOAT,
        TextureFormat::D16_UNORM_S8_UINT => vk::Format::D16_UNORM_S8_UINT,
        TextureFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::D32_SFLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Reverse mapping for formats reported by the surface; None for formats
/// the renderer never uses
pub fn format_from_vk(format: vk::Format) -> Option<TextureFormat> {
    Some(match format {
        vk::Format::R8G8B8A8_UNORM => TextureFormat::R8G8B8A8_UNORM,
        vk::Format::R8G8B8A8_SRGB => TextureFormat::R8G8B8A8_SRGB,
        vk::Format::B8G8R8A8_UNORM => TextureFormat::B8G8R8A8_UNORM,
        vk::Format::B8G8R8A8_SRGB => TextureFormat::B8G8R8A8_SRGB,
        vk::Format::R16G16B16A16_SFLOAT => TextureFormat::R16G16B16A16_SFLOAT,
        vk::Format::R32G32B32A32_SFLOAT => TextureFormat::R32G32B32A32_SFLOAT,
        vk::Format::D16_UNORM => TextureFormat::D16_UNORM,
        vk::Format::X8_D24_UNORM_PACK32 => TextureFormat::X8_D24_UNORM_PACK32,
        vk::Format::D32_SFLOAT => TextureFormat::D32_SFLOAT,
        vk::Format::D16_UNORM_S8_UINT => TextureFormat::D16_UNORM_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT => TextureFormat::D24_UNORM_S8_UINT,
        vk::Format::D32_SFLOAT_S8_UINT => TextureFormat::D32_SFLOAT_S8_UINT,
        _ => return None,
    })
}

/// Depth formats probed by `supported_depth_format`, best first
pub const DEPTH_FORMAT_CANDIDATES: [TextureFormat; 5] = [
    TextureFormat::D32_SFLOAT_S8_UINT,
    TextureFormat::D32_SFLOAT,
    TextureFormat::D24_UNORM_S8_UINT,
    TextureFormat::D16_UNORM_S8_UINT,
    TextureFormat::D16_UNORM,
];

pub fn vertex_format_to_vk(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        VertexFormat::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
    }
}

pub fn color_space_from_vk(color_space: vk::ColorSpaceKHR) -> ColorSpace {
    if color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR {
        ColorSpace::SrgbNonLinear
    } else {
        ColorSpace::Other
    }
}

pub fn color_space_to_vk(color_space: ColorSpace) -> vk::ColorSpaceKHR {
    match color_space {
        // Surfaces reporting another space are never selected with it
        ColorSpace::SrgbNonLinear | ColorSpace::Other => vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }
}

// ===== IMAGES =====

pub fn aspect_to_vk(aspect: ImageAspect) -> vk::ImageAspectFlags {
    let mut flags = vk::ImageAspectFlags::empty();
    if aspect.contains(ImageAspect::COLOR) {
        flags |= vk::ImageAspectFlags::COLOR;
    }
    if aspect.contains(ImageAspect::DEPTH) {
        flags |= vk::ImageAspectFlags::DEPTH;
    }
    if aspect.contains(ImageAspect::STENCIL) {
        flags |= vk::ImageAspectFlags::STENCIL;
    }
    flags
}

pub fn texture_usage_to_vk(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsage::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::TRANSIENT_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::TRANSIENT_ATTACHMENT;
    }
    if usage.contains(TextureUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    flags
}

pub fn view_type_to_vk(view_type: TextureViewType) -> vk::ImageViewType {
    match view_type {
        TextureViewType::Tex2D => vk::ImageViewType::TYPE_2D,
        TextureViewType::Tex2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
    }
}

pub fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn load_op_to_vk(load_op: LoadOp) -> vk::AttachmentLoadOp {
    match load_op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub fn store_op_to_vk(store_op: StoreOp) -> vk::AttachmentStoreOp {
    match store_op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub fn sample_count_to_vk(samples: u32) -> vk::SampleCountFlags {
    match samples {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

// ===== SYNCHRONIZATION =====

pub fn pipeline_stages_to_vk(stages: PipelineStages) -> vk::PipelineStageFlags {
    const MAPPING: [(PipelineStages, vk::PipelineStageFlags); 7] = [
        (PipelineStages::TOP_OF_PIPE, vk::PipelineStageFlags::TOP_OF_PIPE),
        (PipelineStages::VERTEX_SHADER, vk::PipelineStageFlags::VERTEX_SHADER),
        (PipelineStages::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS),
        (PipelineStages::FRAGMENT_SHADER, vk::PipelineStageFlags::FRAGMENT_SHADER),
        (PipelineStages::LATE_FRAGMENT_TESTS, vk::PipelineStageFlags::LATE_FRAGMENT_TESTS),
        (PipelineStages::COLOR_ATTACHMENT_OUTPUT, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT),
        (PipelineStages::BOTTOM_OF_PIPE, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
    ];
    MAPPING
        .iter()
        .filter(|(stage, _)| stages.contains(*stage))
        .fold(vk::PipelineStageFlags::empty(), |acc, (_, flag)| acc | *flag)
}

pub fn access_flags_to_vk(access: AccessFlags) -> vk::AccessFlags {
    const MAPPING: [(AccessFlags, vk::AccessFlags); 7] = [
        (AccessFlags::SHADER_READ, vk::AccessFlags::SHADER_READ),
        (AccessFlags::COLOR_ATTACHMENT_READ, vk::AccessFlags::COLOR_ATTACHMENT_READ),
        (AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::COLOR_ATTACHMENT_WRITE),
        (AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ),
        (AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
        (AccessFlags::MEMORY_READ, vk::AccessFlags::MEMORY_READ),
        (AccessFlags::MEMORY_WRITE, vk::AccessFlags::MEMORY_WRITE),
    ];
    MAPPING
        .iter()
        .filter(|(flag, _)| access.contains(*flag))
        .fold(vk::AccessFlags::empty(), |acc, (_, vk_flag)| acc | *vk_flag)
}

pub fn subpass_ref_to_vk(subpass: SubpassRef) -> u32 {
    match subpass {
        SubpassRef::External => vk::SUBPASS_EXTERNAL,
        SubpassRef::Index(index) => index,
    }
}

// ===== PIPELINE STATE =====

pub fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
    }
}

pub fn stage_flags_to_vk(flags: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut vk_flags = vk::ShaderStageFlags::empty();
    if flags.contains(ShaderStageFlags::VERTEX) {
        vk_flags |= vk::ShaderStageFlags::VERTEX;
    }
    if flags.contains(ShaderStageFlags::FRAGMENT) {
        vk_flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    vk_flags
}

pub fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

pub fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
    }
}

pub fn polygon_mode_to_vk(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
    }
}

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

/// Blend attachment state shared by every color attachment of a pipeline
pub fn blend_attachment_to_vk(blend: BlendState) -> vk::PipelineColorBlendAttachmentState {
    let attachment = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA);
    match blend {
        BlendState::Opaque => attachment.blend_enable(false),
        BlendState::AlphaBlend => attachment
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .alpha_blend_op(vk::BlendOp::ADD),
    }
}

// ===== SAMPLERS =====

pub fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub fn mipmap_mode_to_vk(filter: Filter) -> vk::SamplerMipmapMode {
    match filter {
        Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
        Filter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub fn border_color_to_vk(color: BorderColor) -> vk::BorderColor {
    match color {
        BorderColor::TransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        BorderColor::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        BorderColor::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

// ===== BUFFERS AND PRESENTATION =====

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    match usage {
        BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
        BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
    }
}

pub fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

pub fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

pub fn present_mode_from_vk(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
