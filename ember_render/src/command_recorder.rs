/// Command recorder - state machine around a backend command buffer
///
/// ```text
/// Initial -> Recording -> Executable -> Submitted -> (on_complete) -> Initial
/// ```
///
/// Every recording call is rejected outside `Recording`. A failed backend
/// call leaves the recorder `Invalid` until `reset()`.

use crate::config::MAX_PUSH_CONSTANT_SIZE;
use crate::error::Result;
use crate::{engine_bail, engine_err};
use crate::graphics_device::{
    Buffer, ClearValue, CommandBuffer, CommandBufferUsage, DescriptorSet, FenceWait,
    Framebuffer, GraphicsDevice, IndexType, Pipeline, Rect2D, RenderPass, ShaderStageFlags,
    SubmitInfo, Viewport,
};

/// Lifecycle state of a command recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Empty, ready to begin
    Initial,
    /// Between `begin()` and `end()`
    Recording,
    /// Ended, ready to submit
    Executable,
    /// Submitted, GPU may still execute it
    Submitted,
    /// A backend call failed mid-recording
    Invalid,
}

/// Command buffer with enforced recording state
pub struct CommandRecorder {
    command_buffer: Box<dyn CommandBuffer>,
    state: RecorderState,
    in_render_pass: bool,
    pipeline_bound: bool,
}

impl CommandRecorder {
    /// Allocate a primary command buffer from `device`
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self> {
        Ok(Self {
            command_buffer: device.create_command_buffer()?,
            state: RecorderState::Initial,
            in_render_pass: false,
            pipeline_bound: false,
        })
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn in_render_pass(&self) -> bool {
        self.in_render_pass
    }

    /// Backend command buffer, for submission
    pub fn command_buffer(&self) -> &dyn CommandBuffer {
        self.command_buffer.as_ref()
    }

    // ===== LIFECYCLE =====

    /// Initial -> Recording
    pub fn begin(&mut self, usage: CommandBufferUsage) -> Result<()> {
        if self.state != RecorderState::Initial {
            engine_bail!(InvalidOperation, "ember::command_recorder",
                "begin() called in state {:?}", self.state);
        }
        self.command_buffer.begin(usage).inspect_err(|_| self.state = RecorderState::Invalid)?;
        self.state = RecorderState::Recording;
        self.in_render_pass = false;
        self.pipeline_bound = false;
        Ok(())
    }

    /// Recording -> Executable
    pub fn end(&mut self) -> Result<()> {
        self.require_recording("end")?;
        if self.in_render_pass {
            engine_bail!(InvalidOperation, "ember::command_recorder",
                "end() called inside a render pass");
        }
        self.command_buffer.end().inspect_err(|_| self.state = RecorderState::Invalid)?;
        self.state = RecorderState::Executable;
        Ok(())
    }

    /// Executable -> Submitted, called once the buffer is handed to the queue
    pub fn mark_submitted(&mut self) -> Result<()> {
        if self.state != RecorderState::Executable {
            engine_bail!(InvalidOperation, "ember::command_recorder",
                "Only an executable command buffer can be submitted (state {:?})", self.state);
        }
        self.state = RecorderState::Submitted;
        Ok(())
    }

    /// Submitted -> Initial, once the fence guarding the submission signaled
    pub fn on_complete(&mut self) -> Result<()> {
        if self.state == RecorderState::Submitted {
            self.command_buffer.reset()?;
            self.state = RecorderState::Initial;
        }
        Ok(())
    }

    /// Discard the recording; not allowed while the GPU may execute it
    pub fn reset(&mut self) -> Result<()> {
        if self.state == RecorderState::Submitted {
            engine_bail!(InvalidOperation, "ember::command_recorder",
                "reset() on a submitted command buffer, wait for its fence first");
        }
        self.command_buffer.reset()?;
        self.state = RecorderState::Initial;
        self.in_render_pass = false;
        self.pipeline_bound = false;
        Ok(())
    }

    // ===== RECORDING =====

    pub fn begin_render_pass(
        &mut self,
        render_pass: &dyn RenderPass,
        framebuffer: &dyn Framebuffer,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.require_recording("begin_render_pass")?;
        if self.in_render_pass {
            engine_bail!(InvalidOperation, "ember::command_recorder",
                "begin_render_pass() inside another render pass");
        }
        self.record(|cmd| cmd.begin_render_pass(render_pass, framebuffer, render_area, clear_values))?;
        self.in_render_pass = true;
        self.pipeline_bound = false;
        Ok(())
    }

    pub fn end_render_pass(&mut self) -> Result<()> {
        self.require_render_pass("end_render_pass")?;
        self.record(|cmd| cmd.end_render_pass())?;
        self.in_render_pass = false;
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.require_recording("set_viewport")?;
        self.record(|cmd| cmd.set_viewport(viewport))
    }

    pub fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.require_recording("set_scissor")?;
        self.record(|cmd| cmd.set_scissor(scissor))
    }

    pub fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        self.require_render_pass("bind_pipeline")?;
        self.record(|cmd| cmd.bind_pipeline(pipeline))?;
        self.pipeline_bound = true;
        Ok(())
    }

    pub fn bind_descriptor_set(&mut self, pipeline: &dyn Pipeline, set: &dyn DescriptorSet) -> Result<()> {
        self.require_recording("bind_descriptor_set")?;
        self.record(|cmd| cmd.bind_descriptor_set(pipeline, set))
    }

    pub fn push_constants(
        &mut self,
        pipeline: &dyn Pipeline,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.require_recording("push_constants")?;
        let end = offset as usize + data.len();
        if end > MAX_PUSH_CONSTANT_SIZE as usize {
            engine_bail!(InvalidOperation, "ember::command_recorder",
                "push_constants() range {}..{} exceeds {} bytes", offset, end, MAX_PUSH_CONSTANT_SIZE);
        }
        self.record(|cmd| cmd.push_constants(pipeline, stages, offset, data))
    }

    pub fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()> {
        self.require_recording("bind_vertex_buffer")?;
        self.record(|cmd| cmd.bind_vertex_buffer(buffer, offset))
    }

    pub fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, index_type: IndexType) -> Result<()> {
        self.require_recording("bind_index_buffer")?;
        self.record(|cmd| cmd.bind_index_buffer(buffer, offset, index_type))
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.require_draw("draw")?;
        self.record(|cmd| cmd.draw(vertex_count, instance_count, first_vertex, first_instance))
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.require_draw("draw_indexed")?;
        self.record(|cmd| cmd.draw_indexed(index_count, instance_count, first_index, vertex_offset, first_instance))
    }

    // ===== GUARDS =====

    fn require_recording(&self, op: &str) -> Result<()> {
        if self.state != RecorderState::Recording {
            engine_bail!(InvalidOperation, "ember::command_recorder",
                "{}() called in state {:?}", op, self.state);
        }
        Ok(())
    }

    fn require_render_pass(&self, op: &str) -> Result<()> {
        self.require_recording(op)?;
        if !self.in_render_pass {
            engine_bail!(InvalidOperation, "ember::command_recorder",
                "{}() called outside a render pass", op);
        }
        Ok(())
    }

    fn require_draw(&self, op: &str) -> Result<()> {
        self.require_render_pass(op)?;
        if !self.pipeline_bound {
            engine_bail!(InvalidOperation, "ember::command_recorder",
                "{}() called before a pipeline was bound", op);
        }
        Ok(())
    }

    fn record<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn CommandBuffer) -> Result<()>,
    {
        let result = f(self.command_buffer.as_mut());
        if result.is_err() {
            self.state = RecorderState::Invalid;
        }
        result
    }
}

/// Record, submit and wait for a one-shot command buffer (uploads, transitions)
///
/// # Errors
///
/// `DeviceLost` when the GPU does not finish within `timeout_ns`.
pub fn submit_one_time<F>(device: &dyn GraphicsDevice, timeout_ns: u64, record: F) -> Result<()>
where
    F: FnOnce(&mut CommandRecorder) -> Result<()>,
{
    let mut recorder = CommandRecorder::new(device)?;
    let fence = device.create_fence(false)?;

    recorder.begin(CommandBufferUsage::OneTimeSubmit)?;
    record(&mut recorder)?;
    recorder.end()?;

    device.submit(&SubmitInfo {
        command_buffers: vec![recorder.command_buffer()],
        fence: Some(fence.as_ref()),
        ..Default::default()
    })?;
    recorder.mark_submitted()?;

    match device.wait_for_fence(fence.as_ref(), timeout_ns)? {
        FenceWait::Signaled => recorder.on_complete(),
        FenceWait::TimedOut => Err(engine_err!(DeviceLost, "ember::command_recorder",
            "One-time submission did not complete within {} ns", timeout_ns)),
    }
}

#[cfg(test)]
#[path = "command_recorder_tests.rs"]
mod tests;
