/// CommandBuffer - Vulkan implementation of the CommandBuffer trait
///
/// Each command buffer owns its command pool so it can be reset on its own.
/// Recording state is validated by the renderer's CommandRecorder; this
/// type only translates calls.

use ember_render::ember::{Error, Result};
use ember_render::ember::device::{
    Buffer as RendererBuffer, ClearValue, CommandBuffer as RendererCommandBuffer,
    CommandBufferUsage, DescriptorSet as RendererDescriptorSet,
    Framebuffer as RendererFramebuffer, IndexType, Pipeline as RendererPipeline,
    Rect2D, RenderPass as RendererRenderPass, ShaderStageFlags, Viewport,
};
use ember_render::engine_error;
use ash::vk;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::DescriptorSet;
use crate::vulkan_format::{index_type_to_vk, stage_flags_to_vk};
use crate::vulkan_frame_buffer::Framebuffer;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::RenderPass;

pub struct CommandBuffer {
    ctx: Arc<GpuContext>,
    command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Create a command pool on the graphics queue family and allocate one
    /// primary command buffer from it
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = ctx.device.create_command_pool(&pool_create_info, None)
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to create command pool: {:?}", e);
                    Error::BackendError(format!("Failed to create command pool: {:?}", e))
                })?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffers = match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    engine_error!("ember::vulkan", "Failed to allocate command buffer: {:?}", e);
                    return Err(Error::BackendError(format!("Failed to allocate command buffer: {:?}", e)));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer: command_buffers[0],
            })
        }
    }
}

/// Downcast a renderer object to its Vulkan type. Every object handed to a
/// command buffer was created by this backend.
unsafe fn as_vk<'a, T, U: ?Sized>(object: &'a U) -> &'a T {
    unsafe { &*(object as *const U as *const T) }
}

impl RendererCommandBuffer for CommandBuffer {
    fn begin(&mut self, usage: CommandBufferUsage) -> Result<()> {
        let flags = match usage {
            CommandBufferUsage::OneTimeSubmit => vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            CommandBufferUsage::SimultaneousUse => vk::CommandBufferUsageFlags::SIMULTANEOUS_USE,
        };
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);

        unsafe { self.ctx.device.begin_command_buffer(self.command_buffer, &begin_info) }
            .map_err(|e| Error::BackendError(format!("Failed to begin command buffer: {:?}", e)))
    }

    fn end(&mut self) -> Result<()> {
        unsafe { self.ctx.device.end_command_buffer(self.command_buffer) }
            .map_err(|e| Error::BackendError(format!("Failed to end command buffer: {:?}", e)))
    }

    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.ctx.device.reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
        }
        .map_err(|e| Error::BackendError(format!("Failed to reset command buffer: {:?}", e)))
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &dyn RendererRenderPass,
        framebuffer: &dyn RendererFramebuffer,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        let vk_render_pass: &RenderPass = unsafe { as_vk(render_pass) };
        let vk_framebuffer: &Framebuffer = unsafe { as_vk(framebuffer) };

        let vk_clear_values: Vec<vk::ClearValue> = clear_values
            .iter()
            .map(|clear| match clear {
                ClearValue::Color(color) => vk::ClearValue {
                    color: vk::ClearColorValue { float32: *color },
                },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: *depth, stencil: *stencil },
                },
            })
            .collect();

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .framebuffer(vk_framebuffer.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: render_area.x, y: render_area.y },
                extent: vk::Extent2D { width: render_area.width, height: render_area.height },
            })
            .clear_values(&vk_clear_values);

        unsafe {
            self.ctx.device.cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn RendererPipeline) -> Result<()> {
        let vk_pipeline: &Pipeline = unsafe { as_vk(pipeline) };
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline,
            );
        }
        Ok(())
    }

    fn bind_descriptor_set(&mut self, pipeline: &dyn RendererPipeline, set: &dyn RendererDescriptorSet) -> Result<()> {
        let vk_pipeline: &Pipeline = unsafe { as_vk(pipeline) };
        let vk_set: &DescriptorSet = unsafe { as_vk(set) };
        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.layout,
                0,
                &[vk_set.set],
                &[],
            );
        }
        Ok(())
    }

    fn push_constants(
        &mut self,
        pipeline: &dyn RendererPipeline,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        let vk_pipeline: &Pipeline = unsafe { as_vk(pipeline) };
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                vk_pipeline.layout,
                stage_flags_to_vk(stages),
                offset,
                data,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn RendererBuffer, offset: u64) -> Result<()> {
        let vk_buffer: &Buffer = unsafe { as_vk(buffer) };
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[vk_buffer.buffer], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn RendererBuffer, offset: u64, index_type: IndexType) -> Result<()> {
        let vk_buffer: &Buffer = unsafe { as_vk(buffer) };
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer.buffer,
                offset,
                index_type_to_vk(index_type),
            );
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        unsafe {
            // Freeing the pool frees its command buffer
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
