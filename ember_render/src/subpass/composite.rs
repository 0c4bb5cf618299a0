/// Composite stage - deferred lighting resolve
///
/// Draws one fullscreen triangle into the screen render pass, sampling the
/// G-buffer of the offscreen stage and shading it with every light of the
/// scene.

use std::sync::Arc;
use crate::command_recorder::CommandRecorder;
use crate::context::RenderContext;
use crate::error::Result;
use crate::{engine_bail, engine_warn};
use crate::frame_synchronizer::FrameInfo;
use crate::graphics_device::{
    BlendState, Buffer, CullMode, DepthState, DescriptorBinding, DescriptorPool, DescriptorSet,
    DescriptorSetLayout, DescriptorSetLayoutDesc, Pipeline, PipelineDesc, PrimitiveTopology,
    RasterizationState, RenderPass, ShaderStageFlags,
};
use crate::scene::{CameraView, SceneStore};
use crate::subpass::{
    create_uniform_buffers, vulkan_projection, CameraUbo, LightingUbo, SampledOutputs, StageShaders,
};

/// Number of G-buffer inputs (bindings 0..5)
const GBUFFER_INPUTS: u32 = 5;
const LIGHTING_BINDING: u32 = 5;
const CAMERA_BINDING: u32 = 6;

pub struct CompositeStage {
    shaders: StageShaders,
    layout: Option<Arc<dyn DescriptorSetLayout>>,
    pipeline: Option<Arc<dyn Pipeline>>,
    lighting_buffers: Vec<Arc<dyn Buffer>>,
    camera_buffers: Vec<Arc<dyn Buffer>>,
    descriptor_sets: Vec<Arc<dyn DescriptorSet>>,
}

impl CompositeStage {
    pub fn new(shaders: StageShaders) -> Self {
        Self {
            shaders,
            layout: None,
            pipeline: None,
            lighting_buffers: Vec::new(),
            camera_buffers: Vec::new(),
            descriptor_sets: Vec::new(),
        }
    }

    pub fn descriptor_sets(&self) -> &[Arc<dyn DescriptorSet>] {
        &self.descriptor_sets
    }

    pub fn create_graphics_pipeline(&mut self, ctx: &RenderContext, screen_pass: &Arc<dyn RenderPass>) -> Result<()> {
        let mut bindings: Vec<DescriptorBinding> = (0..GBUFFER_INPUTS)
            .map(|b| DescriptorBinding::combined_image_sampler(b, ShaderStageFlags::FRAGMENT))
            .collect();
        bindings.push(DescriptorBinding::uniform_buffer(LIGHTING_BINDING, ShaderStageFlags::FRAGMENT));
        bindings.push(DescriptorBinding::uniform_buffer(
            CAMERA_BINDING, ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
        ));
        let layout = ctx.device().create_descriptor_set_layout(&DescriptorSetLayoutDesc { bindings })?;

        // Fullscreen triangle generated from gl_VertexIndex
        let pipeline = ctx.device().create_pipeline(&PipelineDesc {
            label: "composite".to_string(),
            vertex_shader: self.shaders.vertex.clone(),
            fragment_shader: self.shaders.fragment.clone(),
            render_pass: screen_pass.clone(),
            descriptor_set_layouts: vec![layout.clone()],
            push_constant_ranges: Vec::new(),
            vertex_layout: None,
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState { cull_mode: CullMode::None, ..Default::default() },
            depth: DepthState::disabled(),
            blend: BlendState::Opaque,
        })?;

        self.layout = Some(layout);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// One set per frame in flight: G-buffer samplers + lighting + camera
    pub fn create_descriptor_sets(
        &mut self,
        ctx: &RenderContext,
        pool: &Arc<dyn DescriptorPool>,
        upstream: Option<&SampledOutputs>,
    ) -> Result<()> {
        let Some(layout) = &self.layout else {
            engine_bail!(InvalidOperation, "ember::composite",
                "create_descriptor_sets() before create_graphics_pipeline()");
        };
        let Some(gbuffer) = upstream else {
            engine_bail!(InvalidOperation, "ember::composite",
                "Composite stage needs an offscreen stage ahead of it");
        };
        if gbuffer.textures.len() != GBUFFER_INPUTS as usize {
            engine_bail!(InvalidOperation, "ember::composite",
                "Expected {} G-buffer inputs, got {}", GBUFFER_INPUTS, gbuffer.textures.len());
        }

        let frames = ctx.frames_in_flight() as usize;
        let lighting_size = std::mem::size_of::<LightingUbo>() as u64;
        let camera_size = std::mem::size_of::<CameraUbo>() as u64;
        let lighting_buffers = create_uniform_buffers(ctx, frames, lighting_size)?;
        let camera_buffers = create_uniform_buffers(ctx, frames, camera_size)?;

        let mut descriptor_sets = Vec::with_capacity(frames);
        for frame in 0..frames {
            let set = pool.allocate(layout)?;
            for (binding, texture) in gbuffer.textures.iter().enumerate() {
                set.write_combined_image_sampler(binding as u32, texture.as_ref(), gbuffer.sampler.as_ref())?;
            }
            set.write_uniform_buffer(LIGHTING_BINDING, lighting_buffers[frame].as_ref(), 0, lighting_size)?;
            set.write_uniform_buffer(CAMERA_BINDING, camera_buffers[frame].as_ref(), 0, camera_size)?;
            descriptor_sets.push(set);
        }

        self.lighting_buffers = lighting_buffers;
        self.camera_buffers = camera_buffers;
        self.descriptor_sets = descriptor_sets;
        Ok(())
    }

    pub fn draw(&mut self, primary: &mut CommandRecorder, frame: &FrameInfo, scene: &SceneStore, _dt: f32) -> Result<()> {
        let Some(pipeline) = &self.pipeline else {
            engine_bail!(InvalidOperation, "ember::composite", "draw() before the pipeline was created");
        };
        let Some(set) = self.descriptor_sets.get(frame.frame_index) else {
            engine_bail!(InvalidOperation, "ember::composite",
                "No descriptor set for frame {}", frame.frame_index);
        };

        let (lighting, dropped) = LightingUbo::gather(scene);
        if dropped > 0 {
            engine_warn!("ember::composite", "{} lights over the per-kind limit were ignored", dropped);
        }
        let camera = CameraView::resolve(scene, frame.aspect_ratio());
        let camera_ubo = CameraUbo {
            projection: vulkan_projection(camera.projection),
            model_view: camera.view,
            position: camera.position.extend(1.0),
        };

        self.lighting_buffers[frame.frame_index].update(0, bytemuck::bytes_of(&lighting))?;
        self.camera_buffers[frame.frame_index].update(0, bytemuck::bytes_of(&camera_ubo))?;

        primary.bind_pipeline(pipeline.as_ref())?;
        primary.bind_descriptor_set(pipeline.as_ref(), set.as_ref())?;
        primary.draw(3, 1, 0, 0)
    }

    pub fn clean_up(&mut self) {
        self.descriptor_sets.clear();
        self.lighting_buffers.clear();
        self.camera_buffers.clear();
        self.pipeline = None;
        self.layout = None;
    }
}
