/// Swapchain trait - presentation surface images
///
/// Recoverable surface conditions are reported as values, never as errors.

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{Extent2D, Semaphore, Texture, TextureFormat};

/// Presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// No tearing protection
    Immediate,
    /// Low-latency triple buffering
    Mailbox,
    /// Vertical sync, always supported
    Fifo,
    FifoRelaxed,
}

/// Color space of presentable images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonLinear,
    Other,
}

/// A (format, color space) pair supported by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: TextureFormat,
    pub color_space: ColorSpace,
}

/// Surface capabilities reported by the device
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no upper bound
    pub max_image_count: u32,
    /// None when the surface size is decided by the swapchain
    pub current_extent: Option<Extent2D>,
    pub min_extent: Extent2D,
    pub max_extent: Extent2D,
    pub formats: Vec<SurfaceFormat>,
    pub present_modes: Vec<PresentMode>,
}

/// Fully resolved swapchain parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub image_count: u32,
    pub surface_format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub extent: Extent2D,
}

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    /// Image acquired; the semaphore will be signaled when it is ready.
    /// `suboptimal` images may be used but the swapchain should be recreated.
    Image { index: u32, suboptimal: bool },
    /// The surface no longer matches; nothing was signaled
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentResult {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentResult {
    /// Whether the swapchain must be recreated before the next frame
    pub fn needs_recreate(&self) -> bool {
        !matches!(self, PresentResult::Presented)
    }
}

/// Swapchain for presenting rendered images to a window
pub trait Swapchain: Send + Sync {
    /// Acquire the next presentable image, signaling `signal` when it is
    /// actually available
    fn acquire_next_image(&mut self, signal: &dyn Semaphore, timeout_ns: u64) -> Result<AcquireResult>;

    /// Queue `image_index` for presentation once `wait` is signaled
    fn present(&mut self, wait: &dyn Semaphore, image_index: u32) -> Result<PresentResult>;

    /// Destroy all image-derived resources and rebuild them.
    /// Previously returned images must not be used afterwards.
    fn recreate(&mut self, desc: &SwapchainDesc) -> Result<()>;

    /// Number of images in the swapchain
    fn image_count(&self) -> u32;

    /// Presentable image (and its view) at `index`
    fn image(&self, index: u32) -> Result<Arc<dyn Texture>>;

    /// Current extent of the images
    fn extent(&self) -> Extent2D;

    /// Pixel format of the images
    fn format(&self) -> TextureFormat;

    /// Active presentation mode
    fn present_mode(&self) -> PresentMode;
}
