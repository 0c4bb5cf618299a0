/// Pipeline - Vulkan implementation of the Pipeline trait

use ember_render::ember::device::{DescriptorSetLayout, Pipeline as RendererPipeline};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

pub struct Pipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    label: String,
    _set_layouts: Vec<Arc<dyn DescriptorSetLayout>>,
}

impl Pipeline {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        pipeline: vk::Pipeline,
        layout: vk::PipelineLayout,
        label: String,
        set_layouts: Vec<Arc<dyn DescriptorSetLayout>>,
    ) -> Self {
        Self { ctx, pipeline, layout, label, _set_layouts: set_layouts }
    }
}

impl RendererPipeline for Pipeline {
    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
