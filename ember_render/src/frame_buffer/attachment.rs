/// Attachment - one GPU image owned by a FrameBuffer
///
/// Usage decides the view aspect, the final layout (shader-read vs
/// depth-read) and the store policy (sampled attachments are stored).

use std::sync::Arc;
use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::{
    AttachmentDescription, ClearValue, GraphicsDevice, ImageAspect, ImageLayout, LoadOp,
    StoreOp, Texture, TextureDesc, TextureFormat, TextureUsage, TextureViewType,
};

/// Parameters of one attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentCreateInfo {
    pub width: u32,
    pub height: u32,
    pub layer_count: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl AttachmentCreateInfo {
    /// Single-layer color attachment
    pub fn color(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self { width, height, layer_count: 1, format, usage: usage | TextureUsage::COLOR_ATTACHMENT }
    }

    /// Single-layer depth/stencil attachment
    pub fn depth(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self { width, height, layer_count: 1, format, usage: usage | TextureUsage::DEPTH_STENCIL_ATTACHMENT }
    }
}

/// Subresource range covered by an attachment's view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceRange {
    pub aspect: ImageAspect,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

/// Aspect mask derived from attachment usage
pub fn aspect_for(format: TextureFormat, usage: TextureUsage) -> ImageAspect {
    if usage.contains(TextureUsage::COLOR_ATTACHMENT) {
        return ImageAspect::COLOR;
    }
    let mut aspect = ImageAspect::empty();
    if format.is_depth() {
        aspect |= ImageAspect::DEPTH;
    }
    if format.has_stencil() {
        aspect |= ImageAspect::STENCIL;
    }
    aspect
}

/// Render pass description derived from attachment usage
pub fn describe_attachment(format: TextureFormat, usage: TextureUsage) -> AttachmentDescription {
    let store_op = if usage.contains(TextureUsage::SAMPLED) {
        StoreOp::Store
    } else {
        StoreOp::DontCare
    };
    let final_layout = if format.is_depth_stencil() {
        ImageLayout::DepthStencilReadOnly
    } else {
        ImageLayout::ShaderReadOnly
    };

    AttachmentDescription {
        format,
        samples: 1,
        load_op: LoadOp::Clear,
        store_op,
        stencil_load_op: LoadOp::DontCare,
        stencil_store_op: StoreOp::DontCare,
        initial_layout: ImageLayout::Undefined,
        final_layout,
    }
}

/// An allocated attachment (image + memory + view)
pub struct Attachment {
    info: AttachmentCreateInfo,
    texture: Arc<dyn Texture>,
    description: AttachmentDescription,
    subresource_range: SubresourceRange,
}

impl Attachment {
    /// Allocate the image, memory and view for `info`
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` when the usage is neither color nor
    /// depth/stencil, or does not match the format.
    pub fn new(device: &dyn GraphicsDevice, info: AttachmentCreateInfo) -> Result<Self> {
        let is_color = info.usage.contains(TextureUsage::COLOR_ATTACHMENT);
        let is_depth = info.usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT);

        if is_color == is_depth {
            engine_bail!(InvalidOperation, "ember::attachment",
                "Attachment usage must be exactly one of color or depth/stencil, got {:?}", info.usage);
        }
        if is_depth != info.format.is_depth_stencil() {
            engine_bail!(InvalidOperation, "ember::attachment",
                "Format {:?} does not match attachment usage {:?}", info.format, info.usage);
        }
        if info.width == 0 || info.height == 0 || info.layer_count == 0 {
            engine_bail!(InvalidOperation, "ember::attachment",
                "Attachment extent {}x{}x{} is empty", info.width, info.height, info.layer_count);
        }

        let texture = device.create_texture(&TextureDesc {
            width: info.width,
            height: info.height,
            array_layers: info.layer_count,
            format: info.format,
            usage: info.usage,
        })?;

        Ok(Self {
            info,
            texture,
            description: describe_attachment(info.format, info.usage),
            subresource_range: SubresourceRange {
                aspect: aspect_for(info.format, info.usage),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: info.layer_count,
            },
        })
    }

    pub fn create_info(&self) -> &AttachmentCreateInfo {
        &self.info
    }

    pub fn texture(&self) -> &Arc<dyn Texture> {
        &self.texture
    }

    pub fn description(&self) -> &AttachmentDescription {
        &self.description
    }

    pub fn subresource_range(&self) -> &SubresourceRange {
        &self.subresource_range
    }

    pub fn format(&self) -> TextureFormat {
        self.info.format
    }

    pub fn is_depth_stencil(&self) -> bool {
        self.info.usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT)
    }

    pub fn has_stencil(&self) -> bool {
        self.info.format.has_stencil()
    }

    pub fn is_sampled(&self) -> bool {
        self.info.usage.contains(TextureUsage::SAMPLED)
    }

    pub fn view_type(&self) -> TextureViewType {
        TextureViewType::for_layers(self.info.layer_count)
    }

    /// Clear value used when the attachment is loaded with `LoadOp::Clear`
    pub fn clear_value(&self) -> ClearValue {
        if self.is_depth_stencil() {
            ClearValue::DepthStencil { depth: 1.0, stencil: 0 }
        } else {
            ClearValue::Color([0.0, 0.0, 0.0, 0.0])
        }
    }
}
