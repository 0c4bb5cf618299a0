/// Texture trait and descriptors
///
/// A texture is a GPU image together with its default view. Attachments,
/// swapchain images and material textures are all textures.

use bitflags::bitflags;

/// 2D extent in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero (minimized window)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Texture pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,
    S8_UINT,
    D16_UNORM,
    X8_D24_UNORM_PACK32,
    D32_SFLOAT,
    D16_UNORM_S8_UINT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,
}

impl TextureFormat {
    /// Whether the format carries a depth component
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM
                | TextureFormat::X8_D24_UNORM_PACK32
                | TextureFormat::D32_SFLOAT
                | TextureFormat::D16_UNORM_S8_UINT
                | TextureFormat::D24_UNORM_S8_UINT
                | TextureFormat::D32_SFLOAT_S8_UINT
        )
    }

    /// Whether the format carries a stencil component
    pub fn has_stencil(&self) -> bool {
        matches!(
            self,
            TextureFormat::S8_UINT
                | TextureFormat::D16_UNORM_S8_UINT
                | TextureFormat::D24_UNORM_S8_UINT
                | TextureFormat::D32_SFLOAT_S8_UINT
        )
    }

    /// Depth or stencil format (usable as a depth/stencil attachment)
    pub fn is_depth_stencil(&self) -> bool {
        self.is_depth() || self.has_stencil()
    }

    /// Aspect of the format's default view
    pub fn aspect(&self) -> ImageAspect {
        let mut aspect = ImageAspect::empty();
        if self.is_depth() {
            aspect |= ImageAspect::DEPTH;
        }
        if self.has_stencil() {
            aspect |= ImageAspect::STENCIL;
        }
        if aspect.is_empty() {
            aspect = ImageAspect::COLOR;
        }
        aspect
    }
}

bitflags! {
    /// How a texture will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Rendered to as a color attachment
        const COLOR_ATTACHMENT = 1 << 0;
        /// Rendered to as a depth/stencil attachment
        const DEPTH_STENCIL_ATTACHMENT = 1 << 1;
        /// Read by shaders through a sampler
        const SAMPLED = 1 << 2;
        /// Contents never leave the render pass
        const TRANSIENT_ATTACHMENT = 1 << 3;
        /// Written by transfer operations (uploads)
        const TRANSFER_DST = 1 << 4;
    }
}

bitflags! {
    /// Image aspects covered by a view
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspect: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Dimensionality of a texture's default view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureViewType {
    Tex2D,
    Tex2DArray,
}

impl TextureViewType {
    /// 2D for a single layer, 2D array otherwise
    pub fn for_layers(array_layers: u32) -> Self {
        if array_layers <= 1 {
            TextureViewType::Tex2D
        } else {
            TextureViewType::Tex2DArray
        }
    }
}

/// Descriptor for creating a texture
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    /// Number of array layers (1 for a plain 2D texture)
    pub array_layers: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

/// Read-only properties of a created texture
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub array_layers: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub aspect: ImageAspect,
    pub view_type: TextureViewType,
}

impl TextureInfo {
    /// Derive the info a backend reports for `desc`
    pub fn from_desc(desc: &TextureDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            array_layers: desc.array_layers,
            format: desc.format,
            usage: desc.usage,
            aspect: desc.format.aspect(),
            view_type: TextureViewType::for_layers(desc.array_layers),
        }
    }
}

/// Texture resource trait
///
/// Implemented by backend-specific textures. Dropping the last reference
/// destroys the image, its view and its memory.
pub trait Texture: Send + Sync {
    /// Get texture properties
    fn info(&self) -> &TextureInfo;
}
