/// UI stage - immediate-mode overlay
///
/// Consumes draw data produced by an immediate-mode UI library once per
/// frame: vertices and 16-bit indices are uploaded into per-frame buffers
/// that grow on demand, positions are mapped to clip space with push
/// constants and every draw command gets its own scissor rectangle.

use std::sync::Arc;
use crate::command_recorder::CommandRecorder;
use crate::context::RenderContext;
use crate::error::Result;
use crate::{engine_bail, engine_trace};
use crate::frame_synchronizer::FrameInfo;
use crate::graphics_device::{
    BlendState, Buffer, BufferDesc, BufferUsage, CullMode, DepthState, DescriptorBinding,
    DescriptorPool, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutDesc, GraphicsDevice,
    IndexType, Pipeline, PipelineDesc, PrimitiveTopology, PushConstantRange, RasterizationState, Rect2D,
    RenderPass, Sampler, ShaderStageFlags, Texture, Viewport,
};
use crate::config::MAX_PUSH_CONSTANT_SIZE;
use crate::subpass::{StageShaders, UiPushConstants, UiVertex};

const UI_PUSH_CONSTANT_SIZE: u32 = std::mem::size_of::<UiPushConstants>() as u32;
const _: () = assert!(UI_PUSH_CONSTANT_SIZE <= MAX_PUSH_CONSTANT_SIZE);

// ===== DRAW DATA =====

/// One draw call of a draw list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UiDrawCmd {
    /// min x, min y, max x, max y in display coordinates
    pub clip_rect: [f32; 4],
    pub elem_count: u32,
    /// First index within the list
    pub idx_offset: u32,
    /// First vertex within the list
    pub vtx_offset: u32,
}

#[derive(Debug, Clone, Default)]
pub struct UiDrawList {
    pub vertices: Vec<UiVertex>,
    pub indices: Vec<u16>,
    pub commands: Vec<UiDrawCmd>,
}

/// A frame of UI geometry
#[derive(Debug, Clone)]
pub struct UiDrawData {
    pub display_pos: [f32; 2],
    pub display_size: [f32; 2],
    /// Framebuffer pixels per display unit
    pub framebuffer_scale: [f32; 2],
    pub draw_lists: Vec<UiDrawList>,
}

impl Default for UiDrawData {
    fn default() -> Self {
        Self {
            display_pos: [0.0, 0.0],
            display_size: [0.0, 0.0],
            framebuffer_scale: [1.0, 1.0],
            draw_lists: Vec::new(),
        }
    }
}

impl UiDrawData {
    pub fn total_vertex_count(&self) -> usize {
        self.draw_lists.iter().map(|l| l.vertices.len()).sum()
    }

    pub fn total_index_count(&self) -> usize {
        self.draw_lists.iter().map(|l| l.indices.len()).sum()
    }

    /// Scissor of `clip_rect` in framebuffer pixels, clamped to the target,
    /// or None when nothing is left
    pub fn scissor_for(&self, clip_rect: [f32; 4], target_width: u32, target_height: u32) -> Option<Rect2D> {
        let [pos_x, pos_y] = self.display_pos;
        let [scale_x, scale_y] = self.framebuffer_scale;

        let min_x = ((clip_rect[0] - pos_x) * scale_x).max(0.0);
        let min_y = ((clip_rect[1] - pos_y) * scale_y).max(0.0);
        let max_x = ((clip_rect[2] - pos_x) * scale_x).min(target_width as f32);
        let max_y = ((clip_rect[3] - pos_y) * scale_y).min(target_height as f32);
        if max_x <= min_x || max_y <= min_y {
            return None;
        }

        Some(Rect2D {
            x: min_x as i32,
            y: min_y as i32,
            width: (max_x - min_x) as u32,
            height: (max_y - min_y) as u32,
        })
    }
}

// ===== UI STAGE =====

/// Geometry buffers of one frame in flight
#[derive(Default)]
struct UiFrameBuffers {
    vertex: Option<Arc<dyn Buffer>>,
    index: Option<Arc<dyn Buffer>>,
}

pub struct UiStage {
    shaders: StageShaders,
    font_atlas: Arc<dyn Texture>,
    font_sampler: Arc<dyn Sampler>,
    device: Option<Arc<dyn GraphicsDevice>>,
    layout: Option<Arc<dyn DescriptorSetLayout>>,
    pipeline: Option<Arc<dyn Pipeline>>,
    descriptor_set: Option<Arc<dyn DescriptorSet>>,
    frames: Vec<UiFrameBuffers>,
    draw_data: UiDrawData,
}

impl UiStage {
    pub fn new(shaders: StageShaders, font_atlas: Arc<dyn Texture>, font_sampler: Arc<dyn Sampler>) -> Self {
        Self {
            shaders,
            font_atlas,
            font_sampler,
            device: None,
            layout: None,
            pipeline: None,
            descriptor_set: None,
            frames: Vec::new(),
            draw_data: UiDrawData::default(),
        }
    }

    /// Replace the geometry drawn from the next frame on
    pub fn set_draw_data(&mut self, draw_data: UiDrawData) {
        self.draw_data = draw_data;
    }

    pub fn draw_data(&self) -> &UiDrawData {
        &self.draw_data
    }

    /// Current capacity in bytes of the vertex buffer of `frame_index`
    pub fn vertex_capacity(&self, frame_index: usize) -> u64 {
        self.frames
            .get(frame_index)
            .and_then(|f| f.vertex.as_ref())
            .map_or(0, |b| b.size())
    }

    pub fn create_graphics_pipeline(&mut self, ctx: &RenderContext, screen_pass: &Arc<dyn RenderPass>) -> Result<()> {
        let layout = ctx.device().create_descriptor_set_layout(&DescriptorSetLayoutDesc {
            bindings: vec![DescriptorBinding::combined_image_sampler(0, ShaderStageFlags::FRAGMENT)],
        })?;

        let pipeline = ctx.device().create_pipeline(&PipelineDesc {
            label: "ui".to_string(),
            vertex_shader: self.shaders.vertex.clone(),
            fragment_shader: self.shaders.fragment.clone(),
            render_pass: screen_pass.clone(),
            descriptor_set_layouts: vec![layout.clone()],
            push_constant_ranges: vec![PushConstantRange {
                stages: ShaderStageFlags::VERTEX,
                offset: 0,
                size: UI_PUSH_CONSTANT_SIZE,
            }],
            vertex_layout: Some(UiVertex::layout()),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState { cull_mode: CullMode::None, ..Default::default() },
            depth: DepthState::disabled(),
            blend: BlendState::AlphaBlend,
        })?;

        self.frames = (0..ctx.frames_in_flight()).map(|_| UiFrameBuffers::default()).collect();
        self.device = Some(ctx.device().clone());
        self.layout = Some(layout);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Font atlas set (binding 0)
    pub fn create_descriptor_sets(&mut self, pool: &Arc<dyn DescriptorPool>) -> Result<()> {
        let Some(layout) = &self.layout else {
            engine_bail!(InvalidOperation, "ember::ui",
                "create_descriptor_sets() before create_graphics_pipeline()");
        };
        let set = pool.allocate(layout)?;
        set.write_combined_image_sampler(0, self.font_atlas.as_ref(), self.font_sampler.as_ref())?;
        self.descriptor_set = Some(set);
        Ok(())
    }

    pub fn draw(&mut self, primary: &mut CommandRecorder, frame: &FrameInfo) -> Result<()> {
        let [width, height] = self.draw_data.display_size;
        if width <= 0.0 || height <= 0.0 || self.draw_data.total_index_count() == 0 {
            return Ok(());
        }
        let (Some(pipeline), Some(set)) = (self.pipeline.clone(), self.descriptor_set.clone()) else {
            engine_bail!(InvalidOperation, "ember::ui", "draw() before the pipeline was created");
        };

        let (vertex_buffer, index_buffer) = self.upload(frame.frame_index)?;

        let fb_width = (width * self.draw_data.framebuffer_scale[0]) as u32;
        let fb_height = (height * self.draw_data.framebuffer_scale[1]) as u32;
        if fb_width == 0 || fb_height == 0 {
            return Ok(());
        }

        primary.bind_pipeline(pipeline.as_ref())?;
        primary.bind_descriptor_set(pipeline.as_ref(), set.as_ref())?;
        primary.bind_vertex_buffer(vertex_buffer.as_ref(), 0)?;
        primary.bind_index_buffer(index_buffer.as_ref(), 0, IndexType::U16)?;
        primary.set_viewport(Viewport::full(fb_width, fb_height))?;

        let constants = UiPushConstants::new(self.draw_data.display_pos, self.draw_data.display_size);
        primary.push_constants(pipeline.as_ref(), ShaderStageFlags::VERTEX, 0, bytemuck::bytes_of(&constants))?;

        let mut global_vtx_offset = 0u32;
        let mut global_idx_offset = 0u32;
        for list in &self.draw_data.draw_lists {
            for cmd in &list.commands {
                let Some(scissor) = self.draw_data.scissor_for(cmd.clip_rect, fb_width, fb_height) else {
                    continue;
                };
                primary.set_scissor(scissor)?;
                primary.draw_indexed(
                    cmd.elem_count,
                    1,
                    global_idx_offset + cmd.idx_offset,
                    (global_vtx_offset + cmd.vtx_offset) as i32,
                    0,
                )?;
            }
            global_vtx_offset += list.vertices.len() as u32;
            global_idx_offset += list.indices.len() as u32;
        }

        // Leave full-screen state for whatever is recorded after the overlay
        primary.set_viewport(Viewport::full(frame.extent.width, frame.extent.height))?;
        primary.set_scissor(Rect2D::full(frame.extent.width, frame.extent.height))
    }

    /// Copy this frame's geometry into the frame's buffers, growing them first
    /// when too small
    fn upload(&mut self, frame_index: usize) -> Result<(Arc<dyn Buffer>, Arc<dyn Buffer>)> {
        let Some(device) = self.device.clone() else {
            engine_bail!(InvalidOperation, "ember::ui", "upload before create_graphics_pipeline()");
        };
        let Some(slot) = self.frames.get_mut(frame_index) else {
            engine_bail!(InvalidOperation, "ember::ui", "Frame index {} out of range", frame_index);
        };

        let vertex_size = (self.draw_data.total_vertex_count() * std::mem::size_of::<UiVertex>()) as u64;
        let index_size = (self.draw_data.total_index_count() * std::mem::size_of::<u16>()) as u64;

        let vertex = grow(device.as_ref(), &mut slot.vertex, vertex_size, BufferUsage::Vertex)?;
        let index = grow(device.as_ref(), &mut slot.index, index_size, BufferUsage::Index)?;

        let mut vertex_offset = 0u64;
        let mut index_offset = 0u64;
        for list in &self.draw_data.draw_lists {
            let vertices: &[u8] = bytemuck::cast_slice(&list.vertices);
            let indices: &[u8] = bytemuck::cast_slice(&list.indices);
            vertex.update(vertex_offset, vertices)?;
            index.update(index_offset, indices)?;
            vertex_offset += vertices.len() as u64;
            index_offset += indices.len() as u64;
        }

        Ok((vertex, index))
    }

    pub fn clean_up(&mut self) {
        self.frames.clear();
        self.descriptor_set = None;
        self.pipeline = None;
        self.layout = None;
        self.device = None;
    }
}

/// Reuse `slot` when it holds at least `size` bytes, otherwise replace it
fn grow(
    device: &dyn GraphicsDevice,
    slot: &mut Option<Arc<dyn Buffer>>,
    size: u64,
    usage: BufferUsage,
) -> Result<Arc<dyn Buffer>> {
    if let Some(buffer) = slot {
        if buffer.size() >= size {
            return Ok(buffer.clone());
        }
    }
    let buffer = device.create_buffer(&BufferDesc { size, usage })?;
    engine_trace!("ember::ui", "{:?} buffer grown to {} bytes", usage, size);
    *slot = Some(buffer.clone());
    Ok(buffer)
}
