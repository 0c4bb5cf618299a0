/// Renderer - owns the swapchain, the render pipeline and the frame sync slots
///
/// Typical frame loop:
///
/// ```text
/// if renderer.begin_frame()? {
///     renderer.draw(&mut scene, dt)?;
///     renderer.end_frame()?;
/// }
/// ```
///
/// `begin_frame` returns false when no image could be acquired (out-of-date
/// swapchain, minimized window). The swapchain is recreated at the start of
/// the following `begin_frame`, never in place.

use winit::event::WindowEvent;
use crate::context::RenderContext;
use crate::error::Result;
use crate::{engine_bail, engine_debug, engine_info};
use crate::frame_synchronizer::{FrameInfo, FrameStatus, FrameSynchronizer};
use crate::graphics_device::{Extent2D, PresentResult};
use crate::render_pipeline::RenderPipeline;
use crate::scene::{Entity, SceneStore};
use crate::subpass::{Subpass, UiDrawData};
use crate::swapchain_manager::SwapchainManager;

pub struct Renderer {
    ctx: RenderContext,
    swapchain: SwapchainManager,
    pipeline: RenderPipeline,
    sync: FrameSynchronizer,
    window_extent: Extent2D,
    pending_resize: Option<Extent2D>,
    current_frame: Option<FrameInfo>,
    /// Set once `draw` recorded the current frame
    frame_drawn: bool,
}

impl Renderer {
    /// Create the swapchain, build `subpasses` against it and allocate the
    /// frame sync slots
    pub fn new(
        ctx: &RenderContext,
        scene: &mut SceneStore,
        window_extent: Extent2D,
        subpasses: Vec<Subpass>,
    ) -> Result<Self> {
        let swapchain = SwapchainManager::new(ctx, window_extent)?;
        let pipeline = RenderPipeline::new(ctx, scene, &swapchain, subpasses)?;
        let sync = FrameSynchronizer::new(ctx)?;

        engine_info!("ember::renderer", "Renderer ready ({} frames in flight)", ctx.frames_in_flight());

        Ok(Self {
            ctx: ctx.clone(),
            swapchain,
            pipeline,
            sync,
            window_extent,
            pending_resize: None,
            current_frame: None,
            frame_drawn: false,
        })
    }

    /// Start a frame
    ///
    /// Recreates the swapchain first when a resize is pending or the last
    /// acquire/present reported it stale. Returns false when the frame is
    /// skipped; nothing is recorded or submitted for it.
    pub fn begin_frame(&mut self) -> Result<bool> {
        if self.current_frame.is_some() {
            engine_bail!(InvalidOperation, "ember::renderer", "begin_frame() called twice without end_frame()");
        }

        if let Some(extent) = self.pending_resize.take() {
            self.window_extent = extent;
            self.recreate_swapchain()?;
        } else if self.sync.needs_recreate() {
            self.recreate_swapchain()?;
        }

        if !self.swapchain.is_drawable() {
            return Ok(false);
        }

        match self.sync.begin_frame(&mut self.swapchain)? {
            FrameStatus::Ready(frame) => {
                self.current_frame = Some(frame);
                self.frame_drawn = false;
                Ok(true)
            }
            FrameStatus::Skipped => Ok(false),
        }
    }

    /// Record every stage for the current frame
    ///
    /// Does nothing when no frame was begun.
    pub fn draw(&mut self, scene: &mut SceneStore, dt: f32) -> Result<()> {
        let Some(frame) = self.current_frame else {
            return Ok(());
        };
        if self.frame_drawn {
            engine_bail!(InvalidOperation, "ember::renderer", "draw() called twice for the same frame");
        }
        let primary = self.sync.recorder_mut();
        self.pipeline.draw(scene, &self.swapchain, primary, &frame, dt)?;
        self.frame_drawn = true;
        Ok(())
    }

    /// Submit the current frame and present it
    ///
    /// The frame must have been drawn: an undrawn frame is rejected before
    /// anything reaches the queue and stays current, so `draw` and
    /// `end_frame` can still complete it.
    pub fn end_frame(&mut self) -> Result<PresentResult> {
        let Some(frame) = self.current_frame else {
            engine_bail!(InvalidOperation, "ember::renderer", "end_frame() without a successful begin_frame()");
        };
        if !self.frame_drawn {
            engine_bail!(InvalidOperation, "ember::renderer", "end_frame() before draw() for frame {}", frame.frame_index);
        }
        self.current_frame = None;
        self.frame_drawn = false;

        let dependencies = self.pipeline.gather_present_dependencies(frame.frame_index);
        let result = self.sync.end_frame(&mut self.swapchain, &dependencies)?;
        self.pipeline.mark_dependencies_submitted(frame.frame_index)?;
        Ok(result)
    }

    /// Request a swapchain rebuild before the next frame
    pub fn resize(&mut self, extent: Extent2D) {
        engine_debug!("ember::renderer", "Resize requested: {}x{}", extent.width, extent.height);
        self.pending_resize = Some(extent);
    }

    /// Forward the window events the renderer cares about
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        if let WindowEvent::Resized(size) = event {
            self.resize(Extent2D::new(size.width, size.height));
        }
    }

    pub fn set_ui_draw_data(&mut self, draw_data: UiDrawData) {
        self.pipeline.set_ui_draw_data(draw_data);
    }

    /// Destroy an entity once the GPU no longer uses its per-frame state
    pub fn destroy_entity(&mut self, scene: &mut SceneStore, entity: Entity) -> Result<bool> {
        self.ctx.device().wait_idle()?;
        Ok(scene.destroy(entity))
    }

    /// Wait for the device and release everything in reverse construction order
    pub fn shutdown(self, scene: &mut SceneStore) -> Result<()> {
        let Self { ctx, swapchain, mut pipeline, sync, .. } = self;
        ctx.device().wait_idle()?;
        drop(sync);
        pipeline.clean_up(scene)?;
        drop(pipeline);
        drop(swapchain);
        engine_info!("ember::renderer", "Renderer shut down");
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn swapchain(&self) -> &SwapchainManager {
        &self.swapchain
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn synchronizer(&self) -> &FrameSynchronizer {
        &self.sync
    }

    /// Frame being recorded, between `begin_frame` and `end_frame`
    pub fn current_frame(&self) -> Option<&FrameInfo> {
        self.current_frame.as_ref()
    }

    pub fn has_pending_resize(&self) -> bool {
        self.pending_resize.is_some()
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        self.swapchain.recreate(self.window_extent)?;
        self.sync.clear_recreate();
        Ok(())
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
