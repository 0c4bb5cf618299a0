/// Debug stage - wireframe overlay
///
/// Draws meshes with a debug material as flat-colored wireframe directly
/// into the screen render pass.

use std::sync::Arc;
use crate::command_recorder::CommandRecorder;
use crate::context::RenderContext;
use crate::error::Result;
use crate::{engine_bail, engine_trace};
use crate::frame_synchronizer::FrameInfo;
use crate::graphics_device::{
    BlendState, DepthState, DescriptorBinding, DescriptorPool, DescriptorSetLayout,
    DescriptorSetLayoutDesc, IndexType, Pipeline, PipelineDesc, PolygonMode, PrimitiveTopology,
    RasterizationState, RenderPass, ShaderStageFlags,
};
use crate::scene::{CameraView, Entity, MaterialKind, MeshRenderer, SceneStore, Transform};
use crate::subpass::{
    allocate_per_frame, release_bindings, store_bindings, vulkan_projection, DebugUbo,
    MeshGpuState, MeshVertex, StageShaders, SubpassKind,
};

pub struct DebugStage {
    shaders: StageShaders,
    layout: Option<Arc<dyn DescriptorSetLayout>>,
    pipeline: Option<Arc<dyn Pipeline>>,
}

impl DebugStage {
    pub fn new(shaders: StageShaders) -> Self {
        Self { shaders, layout: None, pipeline: None }
    }

    pub fn create_graphics_pipeline(&mut self, ctx: &RenderContext, screen_pass: &Arc<dyn RenderPass>) -> Result<()> {
        let layout = ctx.device().create_descriptor_set_layout(&DescriptorSetLayoutDesc {
            bindings: vec![DescriptorBinding::uniform_buffer(
                0, ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
            )],
        })?;

        let pipeline = ctx.device().create_pipeline(&PipelineDesc {
            label: "debug".to_string(),
            vertex_shader: self.shaders.vertex.clone(),
            fragment_shader: self.shaders.fragment.clone(),
            render_pass: screen_pass.clone(),
            descriptor_set_layouts: vec![layout.clone()],
            push_constant_ranges: Vec::new(),
            vertex_layout: Some(MeshVertex::layout()),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState { polygon_mode: PolygonMode::Line, ..Default::default() },
            depth: DepthState::less(),
            blend: BlendState::Opaque,
        })?;

        self.layout = Some(layout);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    pub fn on_mesh_constructed(
        &mut self,
        ctx: &RenderContext,
        pool: &Arc<dyn DescriptorPool>,
        scene: &mut SceneStore,
        entity: Entity,
    ) -> Result<()> {
        let Some(layout) = &self.layout else {
            engine_bail!(InvalidOperation, "ember::debug",
                "Mesh provisioned before create_graphics_pipeline()");
        };
        let is_debug = scene
            .get::<MeshRenderer>(entity)
            .is_some_and(|r| r.material.kind == MaterialKind::Debug);
        let provisioned = scene
            .get::<MeshGpuState>(entity)
            .is_some_and(|s| s.contains(SubpassKind::Debug));
        if !is_debug || provisioned {
            return Ok(());
        }

        let bindings = allocate_per_frame(ctx, pool, layout, std::mem::size_of::<DebugUbo>() as u64)?;
        engine_trace!("ember::debug", "Provisioned {} frame bindings for {:?}", bindings.frame_count(), entity);
        store_bindings(scene, entity, SubpassKind::Debug, bindings)
    }

    pub fn draw(&mut self, primary: &mut CommandRecorder, frame: &FrameInfo, scene: &SceneStore, _dt: f32) -> Result<()> {
        let Some(pipeline) = &self.pipeline else {
            engine_bail!(InvalidOperation, "ember::debug", "draw() before the pipeline was created");
        };

        let camera = CameraView::resolve(scene, frame.aspect_ratio());
        let view_projection = vulkan_projection(camera.projection) * camera.view;
        let mut pipeline_bound = false;

        for (entity, renderer) in scene.iter::<MeshRenderer>() {
            if renderer.material.kind != MaterialKind::Debug {
                continue;
            }
            let Some(bindings) = scene.get::<MeshGpuState>(entity).and_then(|s| s.get(SubpassKind::Debug)) else {
                continue;
            };
            if !pipeline_bound {
                primary.bind_pipeline(pipeline.as_ref())?;
                pipeline_bound = true;
            }

            let model = scene.get::<Transform>(entity).copied().unwrap_or_default().matrix();
            let ubo = DebugUbo {
                mvp: view_projection * model,
                color: renderer.material.color,
            };
            bindings.uniform_buffers[frame.frame_index].update(0, bytemuck::bytes_of(&ubo))?;

            primary.bind_descriptor_set(pipeline.as_ref(), bindings.descriptor_sets[frame.frame_index].as_ref())?;
            primary.bind_vertex_buffer(renderer.mesh.vertex_buffer.as_ref(), 0)?;
            primary.bind_index_buffer(renderer.mesh.index_buffer.as_ref(), 0, IndexType::U32)?;
            primary.draw_indexed(renderer.mesh.index_count, 1, 0, 0, 0)?;
        }
        Ok(())
    }

    pub fn clean_up(&mut self, scene: &mut SceneStore) {
        release_bindings(scene, SubpassKind::Debug);
        self.pipeline = None;
        self.layout = None;
    }
}
