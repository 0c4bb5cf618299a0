/// Shader module trait
///
/// Shaders are compiled and reflected elsewhere; the renderer only needs
/// the module handle and its stage.

use bitflags::bitflags;

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

bitflags! {
    /// Set of shader stages (descriptor visibility, push constant ranges)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
    }
}

impl From<ShaderStage> for ShaderStageFlags {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
        }
    }
}

/// Descriptor for creating a shader module
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub stage: ShaderStage,
    /// SPIR-V words
    pub code: Vec<u32>,
    pub entry_point: String,
}

/// Compiled shader module trait
pub trait Shader: Send + Sync {
    /// Stage this module is compiled for
    fn stage(&self) -> ShaderStage;
}
