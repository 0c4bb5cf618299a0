/// Subpass module - the fixed set of rendering stages
///
/// `Subpass` is a closed sum type over the four stages. The render pipeline
/// drives every stage through the same sequence:
///
/// 1. `prepare_attachments` - allocate privately owned frame buffers
/// 2. `create_graphics_pipeline` - layouts + pipeline against the target render pass
/// 3. `create_descriptor_sets` - per-frame sets from the shared pool
/// 4. `on_mesh_constructed` - per-entity state for new mesh entities
/// 5. `draw` / `gather_present_dependencies` - every frame
/// 6. `clean_up` - release, reverse order

pub mod gpu_types;
pub mod mesh_gpu_state;
pub mod offscreen;
pub mod composite;
pub mod debug;
pub mod ui;

pub use gpu_types::*;
pub use mesh_gpu_state::{MeshGpuState, PerFrameBindings};
pub use offscreen::{OffscreenStage, GBUFFER_COLOR_FORMATS};
pub use composite::CompositeStage;
pub use debug::DebugStage;
pub use ui::{UiDrawCmd, UiDrawData, UiDrawList, UiStage};

use std::sync::Arc;
use crate::command_recorder::CommandRecorder;
use crate::context::RenderContext;
use crate::error::Result;
use crate::frame_synchronizer::FrameInfo;
use crate::graphics_device::{
    Buffer, BufferDesc, BufferUsage, CommandBuffer, DescriptorPool, DescriptorSetLayout,
    PipelineStages, RenderPass, Sampler, Semaphore, Shader, Texture,
};
use crate::scene::{Entity, SceneStore};

// ===== SHARED TYPES =====

/// Stage discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubpassKind {
    Offscreen,
    Composite,
    Debug,
    Ui,
}

/// Compiled shader modules of a stage
#[derive(Clone)]
pub struct StageShaders {
    pub vertex: Arc<dyn Shader>,
    pub fragment: Arc<dyn Shader>,
}

/// Attachments of a stage that later stages sample
#[derive(Clone)]
pub struct SampledOutputs {
    /// Color attachments, in attachment order
    pub textures: Vec<Arc<dyn Texture>>,
    pub sampler: Arc<dyn Sampler>,
}

/// Work recorded outside the primary command buffer for one frame
///
/// Submitted ahead of the primary buffer; the primary submission waits on
/// `signal` at `wait_stage`.
pub struct PresentDependency<'a> {
    pub command_buffer: &'a dyn CommandBuffer,
    pub signal: &'a dyn Semaphore,
    pub wait_stage: PipelineStages,
}

// ===== SUBPASS =====

/// One rendering stage
pub enum Subpass {
    Offscreen(OffscreenStage),
    Composite(CompositeStage),
    Debug(DebugStage),
    Ui(UiStage),
}

impl Subpass {
    pub fn kind(&self) -> SubpassKind {
        match self {
            Subpass::Offscreen(_) => SubpassKind::Offscreen,
            Subpass::Composite(_) => SubpassKind::Composite,
            Subpass::Debug(_) => SubpassKind::Debug,
            Subpass::Ui(_) => SubpassKind::Ui,
        }
    }

    /// Whether the stage records into its own command buffers instead of
    /// the screen render pass of the primary buffer
    pub fn records_privately(&self) -> bool {
        matches!(self, Subpass::Offscreen(_))
    }

    pub fn prepare_attachments(&mut self, ctx: &RenderContext) -> Result<()> {
        match self {
            Subpass::Offscreen(stage) => stage.prepare_attachments(ctx),
            Subpass::Composite(_) | Subpass::Debug(_) | Subpass::Ui(_) => Ok(()),
        }
    }

    /// Build the stage pipeline
    ///
    /// `screen_pass` is the swapchain render pass; the offscreen stage uses
    /// its private render pass instead.
    pub fn create_graphics_pipeline(&mut self, ctx: &RenderContext, screen_pass: &Arc<dyn RenderPass>) -> Result<()> {
        match self {
            Subpass::Offscreen(stage) => stage.create_graphics_pipeline(ctx),
            Subpass::Composite(stage) => stage.create_graphics_pipeline(ctx, screen_pass),
            Subpass::Debug(stage) => stage.create_graphics_pipeline(ctx, screen_pass),
            Subpass::Ui(stage) => stage.create_graphics_pipeline(ctx, screen_pass),
        }
    }

    pub fn create_descriptor_sets(
        &mut self,
        ctx: &RenderContext,
        pool: &Arc<dyn DescriptorPool>,
        upstream: Option<&SampledOutputs>,
    ) -> Result<()> {
        match self {
            Subpass::Offscreen(_) | Subpass::Debug(_) => Ok(()),
            Subpass::Composite(stage) => stage.create_descriptor_sets(ctx, pool, upstream),
            Subpass::Ui(stage) => stage.create_descriptor_sets(pool),
        }
    }

    /// Provision per-entity state for a new mesh entity
    pub fn on_mesh_constructed(
        &mut self,
        ctx: &RenderContext,
        pool: &Arc<dyn DescriptorPool>,
        scene: &mut SceneStore,
        entity: Entity,
    ) -> Result<()> {
        match self {
            Subpass::Offscreen(stage) => stage.on_mesh_constructed(ctx, pool, scene, entity),
            Subpass::Debug(stage) => stage.on_mesh_constructed(ctx, pool, scene, entity),
            Subpass::Composite(_) | Subpass::Ui(_) => Ok(()),
        }
    }

    /// Record this stage for `frame`
    ///
    /// Screen stages record into `primary` inside the screen render pass.
    pub fn draw(&mut self, primary: &mut CommandRecorder, frame: &FrameInfo, scene: &SceneStore, dt: f32) -> Result<()> {
        match self {
            Subpass::Offscreen(stage) => stage.draw(frame, scene, dt),
            Subpass::Composite(stage) => stage.draw(primary, frame, scene, dt),
            Subpass::Debug(stage) => stage.draw(primary, frame, scene, dt),
            Subpass::Ui(stage) => stage.draw(primary, frame),
        }
    }

    /// Append the work the primary submission must wait on
    pub fn gather_present_dependencies<'a>(&'a self, frame_index: usize, out: &mut Vec<PresentDependency<'a>>) {
        if let Subpass::Offscreen(stage) = self {
            stage.gather_present_dependencies(frame_index, out);
        }
    }

    /// Called once the gathered dependencies were handed to the queue
    pub fn mark_dependencies_submitted(&mut self, frame_index: usize) -> Result<()> {
        match self {
            Subpass::Offscreen(stage) => stage.mark_submitted(frame_index),
            Subpass::Composite(_) | Subpass::Debug(_) | Subpass::Ui(_) => Ok(()),
        }
    }

    /// Attachments later stages sample, if any
    pub fn sampled_outputs(&self) -> Option<SampledOutputs> {
        match self {
            Subpass::Offscreen(stage) => stage.sampled_outputs(),
            Subpass::Composite(_) | Subpass::Debug(_) | Subpass::Ui(_) => None,
        }
    }

    /// Release stage-owned GPU objects and this stage's per-entity state
    pub fn clean_up(&mut self, scene: &mut SceneStore) {
        match self {
            Subpass::Offscreen(stage) => stage.clean_up(scene),
            Subpass::Composite(stage) => stage.clean_up(),
            Subpass::Debug(stage) => stage.clean_up(scene),
            Subpass::Ui(stage) => stage.clean_up(),
        }
    }

    pub fn as_ui_mut(&mut self) -> Option<&mut UiStage> {
        match self {
            Subpass::Ui(stage) => Some(stage),
            _ => None,
        }
    }
}

// ===== SHARED HELPERS =====

/// One uniform buffer + descriptor set per frame in flight, the buffer
/// written to binding 0 of each set
pub(crate) fn allocate_per_frame(
    ctx: &RenderContext,
    pool: &Arc<dyn DescriptorPool>,
    layout: &Arc<dyn DescriptorSetLayout>,
    ubo_size: u64,
) -> Result<PerFrameBindings> {
    let frames = ctx.frames_in_flight() as usize;
    let mut uniform_buffers = Vec::with_capacity(frames);
    let mut descriptor_sets = Vec::with_capacity(frames);

    for _ in 0..frames {
        let buffer = ctx.device().create_buffer(&BufferDesc { size: ubo_size, usage: BufferUsage::Uniform })?;
        let set = pool.allocate(layout)?;
        set.write_uniform_buffer(0, buffer.as_ref(), 0, ubo_size)?;
        uniform_buffers.push(buffer);
        descriptor_sets.push(set);
    }

    Ok(PerFrameBindings { uniform_buffers, descriptor_sets })
}

/// Create `count` uniform buffers of `size` bytes
pub(crate) fn create_uniform_buffers(ctx: &RenderContext, count: usize, size: u64) -> Result<Vec<Arc<dyn Buffer>>> {
    (0..count)
        .map(|_| ctx.device().create_buffer(&BufferDesc { size, usage: BufferUsage::Uniform }))
        .collect()
}

/// Attach `bindings` to the entity's `MeshGpuState`, creating it if needed
pub(crate) fn store_bindings(scene: &mut SceneStore, entity: Entity, kind: SubpassKind, bindings: PerFrameBindings) -> Result<()> {
    match scene.get_mut::<MeshGpuState>(entity) {
        Some(state) => {
            state.insert(kind, bindings);
            Ok(())
        }
        None => {
            let mut state = MeshGpuState::default();
            state.insert(kind, bindings);
            scene.attach(entity, state)
        }
    }
}

/// Drop a stage's bindings from every entity, removing emptied states
pub(crate) fn release_bindings(scene: &mut SceneStore, kind: SubpassKind) {
    for entity in scene.entities_with::<MeshGpuState>() {
        let emptied = match scene.get_mut::<MeshGpuState>(entity) {
            Some(state) => {
                state.remove(kind);
                state.is_empty()
            }
            None => false,
        };
        if emptied {
            scene.remove::<MeshGpuState>(entity);
        }
    }
}

#[cfg(test)]
#[path = "subpass_tests.rs"]
mod tests;
