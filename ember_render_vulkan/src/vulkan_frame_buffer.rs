/// Framebuffer - Vulkan implementation of the Framebuffer trait
///
/// Keeps its attachments and render pass alive while the framebuffer
/// exists.

use ember_render::ember::device::{Framebuffer as RendererFramebuffer, RenderPass, Texture};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

pub struct Framebuffer {
    ctx: Arc<GpuContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    width: u32,
    height: u32,
    layers: u32,
    _render_pass: Arc<dyn RenderPass>,
    attachments: Vec<Arc<dyn Texture>>,
}

impl Framebuffer {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        framebuffer: vk::Framebuffer,
        width: u32,
        height: u32,
        layers: u32,
        render_pass: Arc<dyn RenderPass>,
        attachments: Vec<Arc<dyn Texture>>,
    ) -> Self {
        Self {
            ctx,
            framebuffer,
            width,
            height,
            layers,
            _render_pass: render_pass,
            attachments,
        }
    }
}

impl RendererFramebuffer for Framebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn layers(&self) -> u32 {
        self.layers
    }

    fn attachment_count(&self) -> u32 {
        self.attachments.len() as u32
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
