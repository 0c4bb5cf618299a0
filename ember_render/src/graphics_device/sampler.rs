/// Sampler trait and descriptor

/// Texel filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Addressing outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// Border color used by `AddressMode::ClampToBorder`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Sampler descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_filter: Filter,
    /// Applied to U, V and W
    pub address_mode: AddressMode,
    pub max_lod: f32,
    pub border_color: BorderColor,
}

impl SamplerDesc {
    /// Sampler for reading render attachments: linear mips, one LOD,
    /// opaque white border.
    pub fn for_attachments(filter: Filter, address_mode: AddressMode) -> Self {
        Self {
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: Filter::Linear,
            address_mode,
            max_lod: 1.0,
            border_color: BorderColor::OpaqueWhite,
        }
    }
}

/// Sampler resource trait
pub trait Sampler: Send + Sync {
    /// Get the descriptor the sampler was created from
    fn desc(&self) -> &SamplerDesc;
}
