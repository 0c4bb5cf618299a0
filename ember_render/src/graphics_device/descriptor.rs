/// Descriptor set layouts, pools and sets

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{Buffer, Sampler, ShaderStageFlags, Texture};

/// Type of resource bound at a descriptor binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    CombinedImageSampler,
}

/// One binding slot of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStageFlags,
}

impl DescriptorBinding {
    pub fn uniform_buffer(binding: u32, stages: ShaderStageFlags) -> Self {
        Self { binding, descriptor_type: DescriptorType::UniformBuffer, count: 1, stages }
    }

    pub fn combined_image_sampler(binding: u32, stages: ShaderStageFlags) -> Self {
        Self { binding, descriptor_type: DescriptorType::CombinedImageSampler, count: 1, stages }
    }
}

/// Descriptor for creating a descriptor set layout
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorSetLayoutDesc {
    pub bindings: Vec<DescriptorBinding>,
}

/// Descriptor set layout trait
pub trait DescriptorSetLayout: Send + Sync {
    /// Bindings of the layout
    fn bindings(&self) -> &[DescriptorBinding];
}

/// Static sizing of a descriptor pool
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorPoolDesc {
    /// Maximum number of descriptor sets allocated from the pool
    pub max_sets: u32,
    /// Descriptor count reserved per descriptor type
    pub pool_sizes: Vec<(DescriptorType, u32)>,
}

impl Default for DescriptorPoolDesc {
    fn default() -> Self {
        Self {
            max_sets: 1024,
            pool_sizes: vec![
                (DescriptorType::UniformBuffer, 1024),
                (DescriptorType::CombinedImageSampler, 4096),
            ],
        }
    }
}

/// Descriptor pool trait
///
/// The pool size is a static upper bound; exceeding it returns
/// `Error::DescriptorPoolExhausted`.
pub trait DescriptorPool: Send + Sync {
    /// Allocate one descriptor set with the given layout
    fn allocate(&self, layout: &Arc<dyn DescriptorSetLayout>) -> Result<Arc<dyn DescriptorSet>>;

    /// Number of sets currently allocated
    fn allocated_sets(&self) -> u32;

    /// Capacity in sets
    fn max_sets(&self) -> u32;
}

/// Descriptor set trait
///
/// Writes are immediate; callers must not rewrite a set the GPU may
/// still be reading.
pub trait DescriptorSet: Send + Sync {
    /// Bind a uniform buffer range at `binding`
    fn write_uniform_buffer(&self, binding: u32, buffer: &dyn Buffer, offset: u64, range: u64) -> Result<()>;

    /// Bind a texture view and sampler at `binding`
    fn write_combined_image_sampler(&self, binding: u32, texture: &dyn Texture, sampler: &dyn Sampler) -> Result<()>;
}
