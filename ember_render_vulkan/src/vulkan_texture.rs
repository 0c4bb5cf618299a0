/// Texture - Vulkan implementation of the Texture trait
///
/// Owns its image, default view and memory. Swapchain images are wrapped
/// without ownership of the image: only the view is destroyed.

use ember_render::ember::device::{Texture as RendererTexture, TextureInfo};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

pub struct Texture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    /// False for swapchain images (owned by the swapchain)
    owns_image: bool,
    info: TextureInfo,
}

impl Texture {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        view: vk::ImageView,
        allocation: Allocation,
        info: TextureInfo,
    ) -> Self {
        Self { ctx, image, view, allocation: Some(allocation), owns_image: true, info }
    }

    pub(crate) fn from_swapchain_image(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        view: vk::ImageView,
        info: TextureInfo,
    ) -> Self {
        Self { ctx, image, view, allocation: None, owns_image: false, info }
    }
}

impl RendererTexture for Texture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);
            if !self.owns_image {
                return;
            }
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
