/// Semaphore and Fence - Vulkan synchronization primitives

use ember_render::ember::Result;
use ember_render::ember::device::{Fence as RendererFence, Semaphore as RendererSemaphore};
use ember_render::engine_err;
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

pub struct Semaphore {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl Semaphore {
    pub(crate) fn new(ctx: Arc<GpuContext>, semaphore: vk::Semaphore) -> Self {
        Self { ctx, semaphore }
    }
}

impl RendererSemaphore for Semaphore {}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

pub struct Fence {
    ctx: Arc<GpuContext>,
    pub(crate) fence: vk::Fence,
}

impl Fence {
    pub(crate) fn new(ctx: Arc<GpuContext>, fence: vk::Fence) -> Self {
        Self { ctx, fence }
    }
}

impl RendererFence for Fence {
    fn is_signaled(&self) -> Result<bool> {
        unsafe { self.ctx.device.get_fence_status(self.fence) }
            .map_err(|e| engine_err!("ember::vulkan", "Failed to query fence status: {:?}", e))
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.fence, None);
        }
    }
}

/// Vulkan semaphore behind a renderer semaphore
pub(crate) fn vk_semaphore(semaphore: &dyn RendererSemaphore) -> vk::Semaphore {
    unsafe { (*(semaphore as *const dyn RendererSemaphore as *const Semaphore)).semaphore }
}

/// Vulkan fence behind a renderer fence
pub(crate) fn vk_fence(fence: &dyn RendererFence) -> vk::Fence {
    unsafe { (*(fence as *const dyn RendererFence as *const Fence)).fence }
}
