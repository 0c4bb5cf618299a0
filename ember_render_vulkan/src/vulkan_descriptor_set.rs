/// Descriptor set layouts, pools and sets - Vulkan implementation
///
/// The pool is created once with a static capacity and FREE_DESCRIPTOR_SET;
/// each set goes back to its pool when dropped.

use ember_render::ember::Result;
use ember_render::ember::device::{
    Buffer as RendererBuffer, DescriptorBinding, DescriptorPool as RendererDescriptorPool,
    DescriptorSet as RendererDescriptorSet, DescriptorSetLayout as RendererDescriptorSetLayout,
    Sampler as RendererSampler, Texture as RendererTexture,
};
use ember_render::{engine_bail, engine_err, engine_trace, engine_warn};
use ash::vk;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_sampler::Sampler;
use crate::vulkan_texture::Texture;

// ===== LAYOUT =====

pub struct DescriptorSetLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::DescriptorSetLayout,
    bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, layout: vk::DescriptorSetLayout, bindings: Vec<DescriptorBinding>) -> Self {
        Self { ctx, layout, bindings }
    }
}

impl RendererDescriptorSetLayout for DescriptorSetLayout {
    fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

// ===== POOL =====

/// Pool handle shared by the pool and every set allocated from it
pub(crate) struct PoolHandle {
    ctx: Arc<GpuContext>,
    pool: vk::DescriptorPool,
    /// Live sets
    allocated: AtomicU32,
}

impl Drop for PoolHandle {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

pub struct DescriptorPool {
    handle: Arc<PoolHandle>,
    max_sets: u32,
}

impl DescriptorPool {
    pub(crate) fn new(ctx: Arc<GpuContext>, pool: vk::DescriptorPool, max_sets: u32) -> Self {
        Self {
            handle: Arc::new(PoolHandle { ctx, pool, allocated: AtomicU32::new(0) }),
            max_sets,
        }
    }
}

impl RendererDescriptorPool for DescriptorPool {
    fn allocate(&self, layout: &Arc<dyn RendererDescriptorSetLayout>) -> Result<Arc<dyn RendererDescriptorSet>> {
        let allocated = self.handle.allocated.load(Ordering::Acquire);
        if allocated >= self.max_sets {
            engine_bail!(DescriptorPoolExhausted, "ember::vulkan",
                "Descriptor pool exhausted ({} / {} sets)", allocated, self.max_sets);
        }

        let vk_layout = unsafe {
            &*(layout.as_ref() as *const dyn RendererDescriptorSetLayout as *const DescriptorSetLayout)
        };
        let layouts = [vk_layout.layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.handle.pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.handle.ctx.device.allocate_descriptor_sets(&allocate_info) }
            .map_err(|e| match e {
                vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                    engine_err!(DescriptorPoolExhausted, "ember::vulkan",
                        "Descriptor pool out of descriptors after {} sets: {:?}", allocated, e)
                }
                _ => engine_err!("ember::vulkan", "Failed to allocate descriptor set: {:?}", e),
            })?;

        self.handle.allocated.fetch_add(1, Ordering::AcqRel);
        engine_trace!("ember::vulkan", "Descriptor set {} / {} allocated", allocated + 1, self.max_sets);

        Ok(Arc::new(DescriptorSet {
            pool: Arc::clone(&self.handle),
            set: sets[0],
            _layout: Arc::clone(layout),
        }))
    }

    fn allocated_sets(&self) -> u32 {
        self.handle.allocated.load(Ordering::Acquire)
    }

    fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

// ===== SET =====

pub struct DescriptorSet {
    pool: Arc<PoolHandle>,
    pub(crate) set: vk::DescriptorSet,
    _layout: Arc<dyn RendererDescriptorSetLayout>,
}

impl RendererDescriptorSet for DescriptorSet {
    fn write_uniform_buffer(&self, binding: u32, buffer: &dyn RendererBuffer, offset: u64, range: u64) -> Result<()> {
        let vk_buffer = unsafe { &*(buffer as *const dyn RendererBuffer as *const Buffer) };
        let buffer_info = [vk::DescriptorBufferInfo::default()
            .buffer(vk_buffer.buffer)
            .offset(offset)
            .range(range)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info);

        unsafe {
            self.pool.ctx.device.update_descriptor_sets(&[write], &[]);
        }
        Ok(())
    }

    fn write_combined_image_sampler(
        &self,
        binding: u32,
        texture: &dyn RendererTexture,
        sampler: &dyn RendererSampler,
    ) -> Result<()> {
        let vk_texture = unsafe { &*(texture as *const dyn RendererTexture as *const Texture) };
        let vk_sampler = unsafe { &*(sampler as *const dyn RendererSampler as *const Sampler) };

        let layout = if texture.info().format.is_depth_stencil() {
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        } else {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        };
        let image_info = [vk::DescriptorImageInfo::default()
            .image_view(vk_texture.view)
            .sampler(vk_sampler.sampler)
            .image_layout(layout)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);

        unsafe {
            self.pool.ctx.device.update_descriptor_sets(&[write], &[]);
        }
        Ok(())
    }
}

impl Drop for DescriptorSet {
    fn drop(&mut self) {
        let result = unsafe {
            self.pool.ctx.device.free_descriptor_sets(self.pool.pool, &[self.set])
        };
        if let Err(e) = result {
            engine_warn!("ember::vulkan", "Failed to free descriptor set: {:?}", e);
        }
        self.pool.allocated.fetch_sub(1, Ordering::AcqRel);
    }
}
