/// Frame synchronizer - per-frame-in-flight sync slots
///
/// Each slot owns an image-available semaphore, a render-finished semaphore,
/// an in-flight fence (created signaled) and the primary command recorder.
/// A frame goes through:
///
/// ```text
/// Ready -> Acquiring -> Recording -> Submitted -> (fence signaled) -> Ready
/// ```
///
/// 1. wait on the slot fence, so the CPU never rewrites per-frame memory the
///    GPU may still read
/// 2. acquire a swapchain image; out-of-date aborts the frame before any
///    submission
/// 3. reset the fence, record, submit (private stage work first, then the
///    primary buffer waiting on image-available and the private semaphores)
/// 4. present after render-finished
/// 5. advance to the next slot

use std::sync::Arc;
use crate::command_recorder::CommandRecorder;
use crate::context::RenderContext;
use crate::error::Result;
use crate::{engine_bail, engine_debug, engine_err, engine_trace, engine_warn};
use crate::graphics_device::{
    AcquireResult, CommandBufferUsage, Extent2D, Fence, FenceWait, GraphicsDevice, PipelineStages,
    PresentResult, Semaphore, SemaphoreWait, SubmitInfo,
};
use crate::subpass::PresentDependency;
use crate::swapchain_manager::SwapchainManager;

// ===== FRAME INFO =====

/// What the stages need to know about the frame being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Sync slot index, in `[0, frames_in_flight)`; indexes every per-frame resource
    pub frame_index: usize,
    /// Acquired swapchain image
    pub image_index: u32,
    /// Swapchain extent
    pub extent: Extent2D,
}

impl FrameInfo {
    pub fn aspect_ratio(&self) -> f32 {
        if self.extent.height == 0 {
            1.0
        } else {
            self.extent.width as f32 / self.extent.height as f32
        }
    }
}

/// Outcome of `begin_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// An image was acquired and the primary recorder is recording
    Ready(FrameInfo),
    /// The swapchain is out of date; nothing was submitted
    Skipped,
}

/// State of one sync slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Ready,
    Acquiring,
    Recording,
    Submitted,
}

struct FrameSyncSlot {
    image_available: Arc<dyn Semaphore>,
    render_finished: Arc<dyn Semaphore>,
    in_flight: Arc<dyn Fence>,
    recorder: CommandRecorder,
    state: SlotState,
    image_index: u32,
}

// ===== FRAME SYNCHRONIZER =====

pub struct FrameSynchronizer {
    device: Arc<dyn GraphicsDevice>,
    slots: Vec<FrameSyncSlot>,
    current: usize,
    frame_count: u64,
    timeout_ns: u64,
    needs_recreate: bool,
}

impl FrameSynchronizer {
    /// One slot per frame in flight
    pub fn new(ctx: &RenderContext) -> Result<Self> {
        let device = ctx.device().clone();
        let slots = (0..ctx.frames_in_flight())
            .map(|_| {
                Ok(FrameSyncSlot {
                    image_available: device.create_semaphore()?,
                    render_finished: device.create_semaphore()?,
                    // Signaled, so the first wait on every slot returns at once
                    in_flight: device.create_fence(true)?,
                    recorder: CommandRecorder::new(device.as_ref())?,
                    state: SlotState::Ready,
                    image_index: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        engine_debug!("ember::frame_sync", "Created {} frame sync slots", slots.len());

        Ok(Self {
            device,
            slots,
            current: 0,
            frame_count: 0,
            timeout_ns: ctx.config().fence_timeout_ns(),
            needs_recreate: false,
        })
    }

    /// Wait for the current slot, acquire an image and start recording
    ///
    /// # Errors
    ///
    /// `DeviceLost` when the slot fence does not signal within the timeout,
    /// `InvalidOperation` when the previous frame of this slot was never ended.
    pub fn begin_frame(&mut self, swapchain: &mut SwapchainManager) -> Result<FrameStatus> {
        let frame_index = self.current;
        let timeout_ns = self.timeout_ns;
        let slot = &mut self.slots[frame_index];

        if matches!(slot.state, SlotState::Acquiring | SlotState::Recording) {
            engine_bail!(InvalidOperation, "ember::frame_sync",
                "begin_frame() while slot {} is {:?}", frame_index, slot.state);
        }

        match self.device.wait_for_fence(slot.in_flight.as_ref(), timeout_ns)? {
            FenceWait::Signaled => {}
            FenceWait::TimedOut => {
                return Err(engine_err!(DeviceLost, "ember::frame_sync",
                    "Fence of slot {} not signaled within {} ns", frame_index, timeout_ns));
            }
        }
        slot.recorder.on_complete()?;
        slot.state = SlotState::Acquiring;

        let image_index = match swapchain.acquire_next_image(slot.image_available.as_ref(), timeout_ns)? {
            AcquireResult::Image { index, suboptimal } => {
                if suboptimal {
                    self.needs_recreate = true;
                }
                index
            }
            AcquireResult::OutOfDate => {
                engine_debug!("ember::frame_sync", "Swapchain out of date, frame {} skipped", self.frame_count);
                slot.state = SlotState::Ready;
                self.needs_recreate = true;
                return Ok(FrameStatus::Skipped);
            }
        };

        self.device.reset_fence(slot.in_flight.as_ref())?;
        slot.recorder.begin(CommandBufferUsage::OneTimeSubmit)?;
        slot.state = SlotState::Recording;
        slot.image_index = image_index;

        engine_trace!("ember::frame_sync", "Frame {} slot {} image {}", self.frame_count, frame_index, image_index);

        Ok(FrameStatus::Ready(FrameInfo {
            frame_index,
            image_index,
            extent: swapchain.extent(),
        }))
    }

    /// Primary recorder of the frame being recorded
    pub fn recorder_mut(&mut self) -> &mut CommandRecorder {
        &mut self.slots[self.current].recorder
    }

    /// Submit the frame and present it
    ///
    /// Every dependency is submitted on its own, signaling its semaphore; the
    /// primary submission waits on image-available and on every dependency
    /// semaphore, signals render-finished and carries the slot fence.
    pub fn end_frame(&mut self, swapchain: &mut SwapchainManager, dependencies: &[PresentDependency]) -> Result<PresentResult> {
        let frame_index = self.current;
        let slot = &mut self.slots[frame_index];
        if slot.state != SlotState::Recording {
            engine_bail!(InvalidOperation, "ember::frame_sync",
                "end_frame() while slot {} is {:?}", frame_index, slot.state);
        }

        slot.recorder.end()?;

        for dependency in dependencies {
            self.device.submit(&SubmitInfo {
                command_buffers: vec![dependency.command_buffer],
                signal_semaphores: vec![dependency.signal],
                ..Default::default()
            })?;
        }

        let mut wait_semaphores = Vec::with_capacity(dependencies.len() + 1);
        wait_semaphores.push(SemaphoreWait {
            semaphore: slot.image_available.as_ref(),
            stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
        });
        wait_semaphores.extend(dependencies.iter().map(|d| SemaphoreWait {
            semaphore: d.signal,
            stages: d.wait_stage,
        }));

        self.device.submit(&SubmitInfo {
            command_buffers: vec![slot.recorder.command_buffer()],
            wait_semaphores,
            signal_semaphores: vec![slot.render_finished.as_ref()],
            fence: Some(slot.in_flight.as_ref()),
        })?;
        slot.recorder.mark_submitted()?;
        slot.state = SlotState::Submitted;

        // Submitted work runs to completion whatever present reports
        let result = swapchain.present(slot.render_finished.as_ref(), slot.image_index)?;
        if result.needs_recreate() {
            engine_warn!("ember::frame_sync", "Present reported {:?}, swapchain will be recreated", result);
            self.needs_recreate = true;
        }

        self.current = (self.current + 1) % self.slots.len();
        self.frame_count += 1;
        Ok(result)
    }

    // ===== ACCESSORS =====

    /// Set by out-of-date or suboptimal acquire/present results
    pub fn needs_recreate(&self) -> bool {
        self.needs_recreate
    }

    pub fn clear_recreate(&mut self) {
        self.needs_recreate = false;
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.slots.get(slot).map(|s| s.state)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Frames submitted so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Whether a frame has begun and not been ended
    pub fn is_recording(&self) -> bool {
        self.slots[self.current].state == SlotState::Recording
    }
}

#[cfg(test)]
#[path = "frame_synchronizer_tests.rs"]
mod tests;
