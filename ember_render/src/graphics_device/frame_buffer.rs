/// Framebuffer trait and descriptor
///
/// A framebuffer binds concrete texture views to the attachment slots
/// of a render pass.

use std::sync::Arc;
use crate::graphics_device::{RenderPass, Texture};

/// GPU framebuffer trait
pub trait Framebuffer: Send + Sync {
    /// Width in pixels
    fn width(&self) -> u32;
    /// Height in pixels
    fn height(&self) -> u32;
    /// Number of layers
    fn layers(&self) -> u32;
    /// Number of bound attachments
    fn attachment_count(&self) -> u32;
}

/// Descriptor for creating a framebuffer
#[derive(Clone)]
pub struct FramebufferDesc {
    /// Render pass the framebuffer must be compatible with
    pub render_pass: Arc<dyn RenderPass>,
    /// Attachments in render pass order
    pub attachments: Vec<Arc<dyn Texture>>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}
