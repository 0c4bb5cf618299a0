/// Render pipeline - orchestrates the ordered subpass list
///
/// Construction runs every stage through the same phases, in order:
/// attachments, graphics pipelines, one shared descriptor pool, descriptor
/// sets (each stage sees the sampled outputs of the stages before it), then
/// per-entity provisioning of the mesh entities already in the scene. Mesh
/// entities created later are picked up at the start of the next `draw`
/// through a scene observer.

use std::sync::Arc;
use crate::command_recorder::CommandRecorder;
use crate::context::RenderContext;
use crate::error::Result;
use crate::{engine_bail, engine_debug, engine_info};
use crate::frame_synchronizer::FrameInfo;
use crate::graphics_device::{DescriptorPool, Rect2D, Viewport};
use crate::scene::{Entity, MeshRenderer, ObserverId, SceneStore};
use crate::subpass::{PresentDependency, SampledOutputs, Subpass, SubpassKind, UiDrawData};
use crate::swapchain_manager::SwapchainManager;

pub struct RenderPipeline {
    ctx: RenderContext,
    subpasses: Vec<Subpass>,
    descriptor_pool: Arc<dyn DescriptorPool>,
    mesh_observer: ObserverId,
}

impl RenderPipeline {
    /// Build every stage against the screen target of `screen`
    ///
    /// # Errors
    ///
    /// `InvalidOperation` when a composite stage is not preceded by an
    /// offscreen stage; any allocation failure (fatal).
    pub fn new(
        ctx: &RenderContext,
        scene: &mut SceneStore,
        screen: &SwapchainManager,
        mut subpasses: Vec<Subpass>,
    ) -> Result<Self> {
        validate_order(&subpasses)?;

        for subpass in &mut subpasses {
            subpass.prepare_attachments(ctx)?;
        }
        for subpass in &mut subpasses {
            subpass.create_graphics_pipeline(ctx, screen.render_pass())?;
        }

        let descriptor_pool = ctx.device().create_descriptor_pool(&ctx.config().descriptor_pool)?;

        let mut upstream: Option<SampledOutputs> = None;
        for subpass in &mut subpasses {
            subpass.create_descriptor_sets(ctx, &descriptor_pool, upstream.as_ref())?;
            if let Some(outputs) = subpass.sampled_outputs() {
                upstream = Some(outputs);
            }
        }

        let mut pipeline = Self {
            ctx: ctx.clone(),
            subpasses,
            descriptor_pool,
            mesh_observer: scene.observe_constructed::<MeshRenderer>(),
        };

        // Entities that existed before the observer was registered
        let existing = scene.entities_with::<MeshRenderer>();
        pipeline.provision(scene, &existing)?;

        engine_info!("ember::render_pipeline", "Render pipeline ready: {:?}",
            pipeline.subpasses.iter().map(Subpass::kind).collect::<Vec<_>>());
        Ok(pipeline)
    }

    /// Record one frame
    ///
    /// Private stages record into their own command buffers; every other
    /// stage records into `primary` inside the screen render pass, in
    /// registration order.
    pub fn draw(
        &mut self,
        scene: &mut SceneStore,
        screen: &SwapchainManager,
        primary: &mut CommandRecorder,
        frame: &FrameInfo,
        dt: f32,
    ) -> Result<()> {
        let constructed = scene.drain_constructed(self.mesh_observer);
        self.provision(scene, &constructed)?;

        for subpass in self.subpasses.iter_mut().filter(|s| s.records_privately()) {
            subpass.draw(primary, frame, scene, dt)?;
        }

        let extent = frame.extent;
        primary.begin_render_pass(
            screen.render_pass().as_ref(),
            screen.framebuffer(frame.image_index)?.as_ref(),
            Rect2D::full(extent.width, extent.height),
            &screen.clear_values(),
        )?;
        primary.set_viewport(Viewport::full(extent.width, extent.height))?;
        primary.set_scissor(Rect2D::full(extent.width, extent.height))?;

        for subpass in self.subpasses.iter_mut().filter(|s| !s.records_privately()) {
            subpass.draw(primary, frame, scene, dt)?;
        }

        primary.end_render_pass()
    }

    /// Private work the primary submission of `frame_index` must wait on
    pub fn gather_present_dependencies(&self, frame_index: usize) -> Vec<PresentDependency<'_>> {
        let mut dependencies = Vec::new();
        for subpass in &self.subpasses {
            subpass.gather_present_dependencies(frame_index, &mut dependencies);
        }
        dependencies
    }

    pub fn mark_dependencies_submitted(&mut self, frame_index: usize) -> Result<()> {
        for subpass in &mut self.subpasses {
            subpass.mark_dependencies_submitted(frame_index)?;
        }
        Ok(())
    }

    /// Forward UI geometry to the UI stage, if there is one
    pub fn set_ui_draw_data(&mut self, draw_data: UiDrawData) {
        if let Some(ui) = self.subpasses.iter_mut().find_map(Subpass::as_ui_mut) {
            ui.set_draw_data(draw_data);
        }
    }

    pub fn subpasses(&self) -> &[Subpass] {
        &self.subpasses
    }

    pub fn descriptor_pool(&self) -> &Arc<dyn DescriptorPool> {
        &self.descriptor_pool
    }

    /// Release every stage in reverse registration order and stop observing
    /// the scene
    ///
    /// Waits for the device first; must run before the device is destroyed.
    pub fn clean_up(&mut self, scene: &mut SceneStore) -> Result<()> {
        self.ctx.device().wait_idle()?;
        scene.unobserve(self.mesh_observer);
        for subpass in self.subpasses.iter_mut().rev() {
            subpass.clean_up(scene);
        }
        engine_debug!("ember::render_pipeline", "Released {} stages", self.subpasses.len());
        Ok(())
    }

    /// Give every stage a chance to allocate state for `entities`
    fn provision(&mut self, scene: &mut SceneStore, entities: &[Entity]) -> Result<()> {
        for &entity in entities {
            if !scene.has::<MeshRenderer>(entity) {
                continue;
            }
            for subpass in &mut self.subpasses {
                subpass.on_mesh_constructed(&self.ctx, &self.descriptor_pool, scene, entity)?;
            }
        }
        Ok(())
    }
}

/// Every composite stage needs an offscreen stage before it
fn validate_order(subpasses: &[Subpass]) -> Result<()> {
    let mut offscreen_seen = false;
    for subpass in subpasses {
        match subpass.kind() {
            SubpassKind::Offscreen => offscreen_seen = true,
            SubpassKind::Composite if !offscreen_seen => {
                engine_bail!(InvalidOperation, "ember::render_pipeline",
                    "Composite stage registered before any offscreen stage");
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "render_pipeline_tests.rs"]
mod tests;
