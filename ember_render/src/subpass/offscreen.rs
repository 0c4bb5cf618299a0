/// Offscreen stage - fills the G-buffer
///
/// Renders scene geometry into a private fixed-size frame buffer (position,
/// normal, albedo, metal, roughness + depth) with its own command buffer
/// and semaphore per frame in flight. The composite stage samples the
/// G-buffer after waiting on that semaphore.

use std::sync::Arc;
use crate::command_recorder::{CommandRecorder, RecorderState};
use crate::context::RenderContext;
use crate::error::Result;
use crate::{engine_bail, engine_debug, engine_trace};
use crate::frame_buffer::{AttachmentCreateInfo, FrameBuffer};
use crate::frame_synchronizer::FrameInfo;
use crate::graphics_device::{
    AddressMode, BlendState, CommandBufferUsage, DepthState, DescriptorBinding, DescriptorPool,
    DescriptorSetLayout, DescriptorSetLayoutDesc, Filter, IndexType, Pipeline, PipelineDesc,
    PipelineStages, PrimitiveTopology, RasterizationState, Rect2D, Semaphore, ShaderStageFlags,
    TextureFormat, TextureUsage, Viewport,
};
use crate::scene::{CameraView, Entity, MaterialKind, MeshRenderer, SceneStore, Transform};
use crate::subpass::{
    allocate_per_frame, release_bindings, store_bindings, vulkan_projection, MeshGpuState,
    MeshVertex, ObjectUbo, PresentDependency, SampledOutputs, StageShaders, SubpassKind,
};

/// G-buffer color targets: position, normal, albedo, metal, roughness
pub const GBUFFER_COLOR_FORMATS: [TextureFormat; 5] = [
    TextureFormat::R16G16B16A16_SFLOAT,
    TextureFormat::R16G16B16A16_SFLOAT,
    TextureFormat::R8G8B8A8_UNORM,
    TextureFormat::R8G8B8A8_UNORM,
    TextureFormat::R8G8B8A8_UNORM,
];

/// Per frame in flight: private command buffer + completion semaphore
struct OffscreenFrame {
    recorder: CommandRecorder,
    finished: Arc<dyn Semaphore>,
}

pub struct OffscreenStage {
    shaders: StageShaders,
    gbuffer: Option<FrameBuffer>,
    frames: Vec<OffscreenFrame>,
    layout: Option<Arc<dyn DescriptorSetLayout>>,
    pipeline: Option<Arc<dyn Pipeline>>,
}

impl OffscreenStage {
    pub fn new(shaders: StageShaders) -> Self {
        Self {
            shaders,
            gbuffer: None,
            frames: Vec::new(),
            layout: None,
            pipeline: None,
        }
    }

    pub fn gbuffer(&self) -> Option<&FrameBuffer> {
        self.gbuffer.as_ref()
    }

    /// Allocate the G-buffer and the per-frame command buffers and semaphores
    pub fn prepare_attachments(&mut self, ctx: &RenderContext) -> Result<()> {
        let device = ctx.device();
        let extent = ctx.config().offscreen_extent;

        let mut gbuffer = FrameBuffer::new(device.clone(), extent, extent);
        for format in GBUFFER_COLOR_FORMATS {
            gbuffer.add_attachment(AttachmentCreateInfo::color(extent, extent, format, TextureUsage::SAMPLED))?;
        }
        gbuffer.add_attachment(AttachmentCreateInfo::depth(
            extent, extent, device.supported_depth_format()?, TextureUsage::SAMPLED,
        ))?;
        gbuffer.create_render_pass()?;
        gbuffer.create_sampler(Filter::Nearest, AddressMode::ClampToEdge)?;

        self.frames = (0..ctx.frames_in_flight())
            .map(|_| {
                Ok(OffscreenFrame {
                    recorder: CommandRecorder::new(device.as_ref())?,
                    finished: device.create_semaphore()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        engine_debug!("ember::offscreen", "G-buffer allocated: {} attachments at {}x{}",
            gbuffer.attachments().len(), extent, extent);
        self.gbuffer = Some(gbuffer);
        Ok(())
    }

    pub fn create_graphics_pipeline(&mut self, ctx: &RenderContext) -> Result<()> {
        let Some(gbuffer) = &self.gbuffer else {
            engine_bail!(InvalidOperation, "ember::offscreen",
                "create_graphics_pipeline() before prepare_attachments()");
        };

        let layout = ctx.device().create_descriptor_set_layout(&DescriptorSetLayoutDesc {
            bindings: vec![
                DescriptorBinding::uniform_buffer(0, ShaderStageFlags::VERTEX),
                DescriptorBinding::combined_image_sampler(1, ShaderStageFlags::FRAGMENT),
                DescriptorBinding::combined_image_sampler(2, ShaderStageFlags::FRAGMENT),
                DescriptorBinding::combined_image_sampler(3, ShaderStageFlags::FRAGMENT),
                DescriptorBinding::combined_image_sampler(4, ShaderStageFlags::FRAGMENT),
            ],
        })?;

        let pipeline = ctx.device().create_pipeline(&PipelineDesc {
            label: "offscreen".to_string(),
            vertex_shader: self.shaders.vertex.clone(),
            fragment_shader: self.shaders.fragment.clone(),
            render_pass: gbuffer.render_pass()?.clone(),
            descriptor_set_layouts: vec![layout.clone()],
            push_constant_ranges: Vec::new(),
            vertex_layout: Some(MeshVertex::layout()),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth: DepthState::less(),
            blend: BlendState::Opaque,
        })?;

        self.layout = Some(layout);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Per-frame UBOs + descriptor sets for a new default-material mesh
    pub fn on_mesh_constructed(
        &mut self,
        ctx: &RenderContext,
        pool: &Arc<dyn DescriptorPool>,
        scene: &mut SceneStore,
        entity: Entity,
    ) -> Result<()> {
        let Some(layout) = &self.layout else {
            engine_bail!(InvalidOperation, "ember::offscreen",
                "Mesh provisioned before create_graphics_pipeline()");
        };
        let Some(renderer) = scene.get::<MeshRenderer>(entity) else {
            return Ok(());
        };
        if renderer.material.kind != MaterialKind::Default
            || scene.get::<MeshGpuState>(entity).is_some_and(|s| s.contains(SubpassKind::Offscreen))
        {
            return Ok(());
        }

        let material = renderer.material.clone();
        let bindings = allocate_per_frame(ctx, pool, layout, std::mem::size_of::<ObjectUbo>() as u64)?;
        for set in &bindings.descriptor_sets {
            set.write_combined_image_sampler(1, material.albedo.as_ref(), material.sampler.as_ref())?;
            set.write_combined_image_sampler(2, material.normal.as_ref(), material.sampler.as_ref())?;
            set.write_combined_image_sampler(3, material.metallic.as_ref(), material.sampler.as_ref())?;
            set.write_combined_image_sampler(4, material.roughness.as_ref(), material.sampler.as_ref())?;
        }

        engine_trace!("ember::offscreen", "Provisioned {} frame bindings for {:?}", bindings.frame_count(), entity);
        store_bindings(scene, entity, SubpassKind::Offscreen, bindings)
    }

    /// Record the G-buffer fill into this frame's private command buffer
    pub fn draw(&mut self, frame: &FrameInfo, scene: &SceneStore, _dt: f32) -> Result<()> {
        let (Some(gbuffer), Some(pipeline)) = (&self.gbuffer, &self.pipeline) else {
            engine_bail!(InvalidOperation, "ember::offscreen", "draw() before the pipeline was created");
        };
        let Some(slot) = self.frames.get_mut(frame.frame_index) else {
            engine_bail!(InvalidOperation, "ember::offscreen",
                "Frame index {} out of range ({} frames in flight)", frame.frame_index, self.frames.len());
        };

        let camera = CameraView::resolve(scene, frame.aspect_ratio());
        let projection = vulkan_projection(camera.projection);
        let extent = gbuffer.extent();
        let recorder = &mut slot.recorder;

        recorder.on_complete()?;
        recorder.begin(CommandBufferUsage::OneTimeSubmit)?;
        recorder.begin_render_pass(
            gbuffer.render_pass()?.as_ref(),
            gbuffer.framebuffer()?.as_ref(),
            Rect2D::full(extent.width, extent.height),
            &gbuffer.clear_values(),
        )?;
        recorder.set_viewport(Viewport::full(extent.width, extent.height))?;
        recorder.set_scissor(Rect2D::full(extent.width, extent.height))?;
        recorder.bind_pipeline(pipeline.as_ref())?;

        for (entity, renderer) in scene.iter::<MeshRenderer>() {
            if renderer.material.kind != MaterialKind::Default {
                continue;
            }
            let Some(bindings) = scene.get::<MeshGpuState>(entity).and_then(|s| s.get(SubpassKind::Offscreen)) else {
                continue;
            };
            let transform = scene.get::<Transform>(entity).copied().unwrap_or_default();

            let ubo = ObjectUbo {
                projection,
                model: transform.matrix(),
                view: camera.view,
                position: transform.position.extend(1.0),
            };
            bindings.uniform_buffers[frame.frame_index].update(0, bytemuck::bytes_of(&ubo))?;

            recorder.bind_descriptor_set(pipeline.as_ref(), bindings.descriptor_sets[frame.frame_index].as_ref())?;
            recorder.bind_vertex_buffer(renderer.mesh.vertex_buffer.as_ref(), 0)?;
            recorder.bind_index_buffer(renderer.mesh.index_buffer.as_ref(), 0, IndexType::U32)?;
            recorder.draw_indexed(renderer.mesh.index_count, 1, 0, 0, 0)?;
        }

        recorder.end_render_pass()?;
        recorder.end()
    }

    /// The G-buffer command buffer of `frame_index`, when recorded
    pub fn gather_present_dependencies<'a>(&'a self, frame_index: usize, out: &mut Vec<PresentDependency<'a>>) {
        if let Some(slot) = self.frames.get(frame_index) {
            if slot.recorder.state() == RecorderState::Executable {
                out.push(PresentDependency {
                    command_buffer: slot.recorder.command_buffer(),
                    signal: slot.finished.as_ref(),
                    wait_stage: PipelineStages::FRAGMENT_SHADER,
                });
            }
        }
    }

    /// Mark the G-buffer buffer of `frame_index` pending, if it was handed
    /// out by `gather_present_dependencies`
    pub fn mark_submitted(&mut self, frame_index: usize) -> Result<()> {
        match self.frames.get_mut(frame_index) {
            Some(slot) if slot.recorder.state() == RecorderState::Executable => slot.recorder.mark_submitted(),
            _ => Ok(()),
        }
    }

    pub fn sampled_outputs(&self) -> Option<SampledOutputs> {
        let gbuffer = self.gbuffer.as_ref()?;
        Some(SampledOutputs {
            textures: gbuffer
                .attachments()
                .iter()
                .filter(|a| !a.is_depth_stencil())
                .map(|a| a.texture().clone())
                .collect(),
            sampler: gbuffer.sampler()?.clone(),
        })
    }

    pub fn clean_up(&mut self, scene: &mut SceneStore) {
        release_bindings(scene, SubpassKind::Offscreen);
        self.pipeline = None;
        self.layout = None;
        self.frames.clear();
        if let Some(mut gbuffer) = self.gbuffer.take() {
            gbuffer.release();
        }
    }
}
