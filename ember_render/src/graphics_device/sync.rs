/// Synchronization primitives and queue submission

use crate::error::Result;
use crate::graphics_device::{CommandBuffer, PipelineStages};

/// GPU-GPU synchronization primitive
pub trait Semaphore: Send + Sync {}

/// GPU-CPU synchronization primitive
pub trait Fence: Send + Sync {
    /// Whether all work submitted with this fence has completed
    fn is_signaled(&self) -> Result<bool>;
}

/// Outcome of a bounded fence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceWait {
    Signaled,
    TimedOut,
}

/// A semaphore wait within a submission
pub struct SemaphoreWait<'a> {
    pub semaphore: &'a dyn Semaphore,
    /// Stages that must not start before the semaphore is signaled
    pub stages: PipelineStages,
}

/// One batch submitted to the graphics queue
#[derive(Default)]
pub struct SubmitInfo<'a> {
    /// Executed in order
    pub command_buffers: Vec<&'a dyn CommandBuffer>,
    pub wait_semaphores: Vec<SemaphoreWait<'a>>,
    pub signal_semaphores: Vec<&'a dyn Semaphore>,
    /// Signaled when the batch completes
    pub fence: Option<&'a dyn Fence>,
}
