/// Buffer - Vulkan implementation of the Buffer trait
///
/// Host-visible (CpuToGpu), persistently mapped by gpu-allocator.

use ember_render::ember::{Error, Result};
use ember_render::ember::device::Buffer as RendererBuffer;
use ember_render::engine_bail;
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

pub struct Buffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

impl Buffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, buffer: vk::Buffer, allocation: Allocation, size: u64) -> Self {
        Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
        }
    }
}

impl RendererBuffer for Buffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.size {
            engine_bail!(InvalidResource, "ember::vulkan",
                "Buffer write of {} bytes at offset {} exceeds size {}", data.len(), offset, self.size);
        }
        let Some(allocation) = &self.allocation else {
            engine_bail!("ember::vulkan", "Buffer update failed: no GPU allocation");
        };
        let mapped = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if the lock is poisoned, the buffer must still go
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
