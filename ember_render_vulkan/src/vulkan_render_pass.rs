/// RenderPass - Vulkan implementation of the RenderPass trait

use ember_render::ember::device::RenderPass as RendererRenderPass;
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

pub struct RenderPass {
    ctx: Arc<GpuContext>,
    pub(crate) render_pass: vk::RenderPass,
    color_attachment_count: u32,
    has_depth_attachment: bool,
}

impl RenderPass {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        render_pass: vk::RenderPass,
        color_attachment_count: u32,
        has_depth_attachment: bool,
    ) -> Self {
        Self { ctx, render_pass, color_attachment_count, has_depth_attachment }
    }
}

impl RendererRenderPass for RenderPass {
    fn color_attachment_count(&self) -> u32 {
        self.color_attachment_count
    }

    fn has_depth_attachment(&self) -> bool {
        self.has_depth_attachment
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
