/// Sampler - Vulkan implementation of the Sampler trait

use ember_render::ember::device::{Sampler as RendererSampler, SamplerDesc};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{address_mode_to_vk, border_color_to_vk, filter_to_vk, mipmap_mode_to_vk};

pub struct Sampler {
    ctx: Arc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
    desc: SamplerDesc,
}

impl Sampler {
    pub(crate) fn new(ctx: Arc<GpuContext>, sampler: vk::Sampler, desc: SamplerDesc) -> Self {
        Self { ctx, sampler, desc }
    }

    /// Create info for `desc`; anisotropy is never enabled
    pub(crate) fn create_info(desc: &SamplerDesc) -> vk::SamplerCreateInfo<'static> {
        let address = address_mode_to_vk(desc.address_mode);
        vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(mipmap_mode_to_vk(desc.mipmap_filter))
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(desc.max_lod)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .border_color(border_color_to_vk(desc.border_color))
            .unnormalized_coordinates(false)
    }
}

impl RendererSampler for Sampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}
