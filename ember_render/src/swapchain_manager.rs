/// Swapchain manager - presentable images and the screen render target
///
/// Owns the backend swapchain plus everything derived from its images: the
/// screen render pass (color + depth, color ends in present layout), the
/// depth attachment and one framebuffer per swapchain image. `recreate()`
/// rebuilds all of it; references to old images or framebuffers must not
/// survive the call.

use std::sync::Arc;
use crate::context::RenderContext;
use crate::error::Result;
use crate::{engine_bail, engine_info, engine_warn};
use crate::frame_buffer::{describe_attachment, single_subpass_render_pass, Attachment, AttachmentCreateInfo};
use crate::graphics_device::{
    AcquireResult, AttachmentDescription, ClearValue, ColorSpace, Extent2D, Framebuffer,
    FramebufferDesc, GraphicsDevice, ImageLayout, LoadOp, PresentMode, PresentResult,
    RenderPass, RenderPassDesc, Semaphore, StoreOp, SurfaceCapabilities, SurfaceFormat, Swapchain,
    SwapchainDesc, TextureFormat, TextureUsage,
};

// ===== SELECTION HELPERS =====

/// Clamp the requested image count into the surface bounds (max 0 = unbounded)
pub fn choose_image_count(requested: u32, caps: &SurfaceCapabilities) -> u32 {
    let count = requested.max(caps.min_image_count);
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

/// Prefer a 4x8-bit UNORM format in the sRGB non-linear color space
pub fn choose_surface_format(formats: &[SurfaceFormat]) -> Result<SurfaceFormat> {
    let preferred = formats.iter().find(|f| {
        matches!(f.format, TextureFormat::B8G8R8A8_UNORM | TextureFormat::R8G8B8A8_UNORM)
            && f.color_space == ColorSpace::SrgbNonLinear
    });

    match preferred.or_else(|| formats.first()) {
        Some(format) => Ok(*format),
        None => engine_bail!(InitializationFailed, "ember::swapchain",
            "Surface reports no supported formats"),
    }
}

/// Preferred mode when supported, FIFO otherwise
pub fn choose_present_mode(preferred: PresentMode, supported: &[PresentMode]) -> PresentMode {
    if supported.contains(&preferred) {
        preferred
    } else {
        PresentMode::Fifo
    }
}

/// Surface extent when the surface defines one, else `requested` clamped to bounds
pub fn choose_extent(requested: Extent2D, caps: &SurfaceCapabilities) -> Extent2D {
    match caps.current_extent {
        Some(extent) => extent,
        None => Extent2D::new(
            requested.width.clamp(caps.min_extent.width, caps.max_extent.width),
            requested.height.clamp(caps.min_extent.height, caps.max_extent.height),
        ),
    }
}

// ===== SWAPCHAIN MANAGER =====

/// Render target covering the swapchain images
struct ScreenTarget {
    depth: Attachment,
    framebuffers: Vec<Arc<dyn Framebuffer>>,
}

/// Owner of the swapchain and its screen render target
pub struct SwapchainManager {
    device: Arc<dyn GraphicsDevice>,
    swapchain: Box<dyn Swapchain>,
    surface_format: SurfaceFormat,
    depth_format: TextureFormat,
    render_pass: Arc<dyn RenderPass>,
    target: Option<ScreenTarget>,
    requested_image_count: u32,
    preferred_present_mode: PresentMode,
}

impl SwapchainManager {
    /// Create the swapchain and its screen target
    ///
    /// # Arguments
    ///
    /// * `ctx` - Render context (device + configuration)
    /// * `extent` - Window size, used when the surface does not define one
    ///
    /// # Errors
    ///
    /// Creation failures are fatal: `InitializationFailed` for an unusable
    /// surface, backend errors otherwise.
    pub fn new(ctx: &RenderContext, extent: Extent2D) -> Result<Self> {
        let device = ctx.device().clone();
        let config = ctx.config();
        let caps = device.surface_capabilities()?;

        let surface_format = choose_surface_format(&caps.formats)?;
        let desc = SwapchainDesc {
            image_count: choose_image_count(config.requested_image_count, &caps),
            surface_format,
            present_mode: choose_present_mode(config.preferred_present_mode, &caps.present_modes),
            extent: choose_extent(extent, &caps),
        };
        if desc.extent.is_empty() {
            engine_bail!(InitializationFailed, "ember::swapchain",
                "Cannot create a swapchain for a {}x{} surface", desc.extent.width, desc.extent.height);
        }

        let swapchain = device.create_swapchain(&desc)?;
        let depth_format = device.supported_depth_format()?;
        let render_pass = device.create_render_pass(&screen_render_pass(surface_format.format, depth_format)?)?;

        let mut manager = Self {
            device,
            swapchain,
            surface_format,
            depth_format,
            render_pass,
            target: None,
            requested_image_count: config.requested_image_count,
            preferred_present_mode: config.preferred_present_mode,
        };
        manager.build_target()?;

        engine_info!("ember::swapchain",
            "Swapchain created: {} images, {:?}, {:?}, {}x{}",
            manager.image_count(), surface_format.format, desc.present_mode,
            desc.extent.width, desc.extent.height);

        Ok(manager)
    }

    /// Rebuild the swapchain and every image-derived resource
    ///
    /// Waits for the device to go idle first. A zero-area extent (minimized
    /// window) releases the screen target and leaves the manager
    /// non-drawable until a later call with a usable extent.
    pub fn recreate(&mut self, extent: Extent2D) -> Result<()> {
        let caps = self.device.surface_capabilities()?;
        let extent = choose_extent(extent, &caps);

        self.device.wait_idle()?;
        self.target = None;

        if extent.is_empty() {
            engine_warn!("ember::swapchain", "Surface has zero area, swapchain recreation deferred");
            return Ok(());
        }

        if !caps.formats.contains(&self.surface_format) {
            engine_bail!("ember::swapchain",
                "Surface no longer supports {:?}", self.surface_format);
        }

        let desc = SwapchainDesc {
            image_count: choose_image_count(self.requested_image_count, &caps),
            surface_format: self.surface_format,
            present_mode: choose_present_mode(self.preferred_present_mode, &caps.present_modes),
            extent,
        };
        self.swapchain.recreate(&desc)?;
        self.build_target()?;

        engine_info!("ember::swapchain",
            "Swapchain recreated: {} images, {}x{}", desc.image_count, extent.width, extent.height);
        Ok(())
    }

    fn build_target(&mut self) -> Result<()> {
        let extent = self.swapchain.extent();
        let depth = Attachment::new(
            self.device.as_ref(),
            AttachmentCreateInfo::depth(extent.width, extent.height, self.depth_format, TextureUsage::empty()),
        )?;

        let mut framebuffers = Vec::with_capacity(self.swapchain.image_count() as usize);
        for index in 0..self.swapchain.image_count() {
            framebuffers.push(self.device.create_framebuffer(&FramebufferDesc {
                render_pass: self.render_pass.clone(),
                attachments: vec![self.swapchain.image(index)?, depth.texture().clone()],
                width: extent.width,
                height: extent.height,
                layers: 1,
            })?);
        }

        self.target = Some(ScreenTarget { depth, framebuffers });
        Ok(())
    }

    // ===== PER-FRAME =====

    /// Acquire the next image, signaling `signal` once it is available
    pub fn acquire_next_image(&mut self, signal: &dyn Semaphore, timeout_ns: u64) -> Result<AcquireResult> {
        if !self.is_drawable() {
            return Ok(AcquireResult::OutOfDate);
        }
        self.swapchain.acquire_next_image(signal, timeout_ns)
    }

    /// Queue `image_index` for display after `wait` is signaled
    pub fn present(&mut self, wait: &dyn Semaphore, image_index: u32) -> Result<PresentResult> {
        self.swapchain.present(wait, image_index)
    }

    // ===== ACCESSORS =====

    /// False while the surface has zero area
    pub fn is_drawable(&self) -> bool {
        self.target.is_some()
    }

    pub fn image_count(&self) -> u32 {
        self.swapchain.image_count()
    }

    pub fn extent(&self) -> Extent2D {
        self.swapchain.extent()
    }

    pub fn format(&self) -> TextureFormat {
        self.surface_format.format
    }

    pub fn depth_format(&self) -> TextureFormat {
        self.depth_format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.swapchain.present_mode()
    }

    /// Render pass shared by every stage drawing to the screen
    pub fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    /// Framebuffer wrapping swapchain image `image_index`
    pub fn framebuffer(&self, image_index: u32) -> Result<&Arc<dyn Framebuffer>> {
        let Some(target) = &self.target else {
            engine_bail!(InvalidOperation, "ember::swapchain",
                "Screen framebuffer requested while the swapchain is not drawable");
        };
        match target.framebuffers.get(image_index as usize) {
            Some(framebuffer) => Ok(framebuffer),
            None => engine_bail!(InvalidResource, "ember::swapchain",
                "Swapchain image index {} out of range (count: {})", image_index, target.framebuffers.len()),
        }
    }

    /// Depth attachment of the screen target
    pub fn depth_attachment(&self) -> Option<&Attachment> {
        self.target.as_ref().map(|t| &t.depth)
    }

    /// Clear values of the screen render pass (color, depth)
    pub fn clear_values(&self) -> [ClearValue; 2] {
        [
            ClearValue::Color([0.0, 0.0, 0.0, 1.0]),
            ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
        ]
    }
}

/// Screen render pass: swapchain color (presented) + transient depth
fn screen_render_pass(color_format: TextureFormat, depth_format: TextureFormat) -> Result<RenderPassDesc> {
    let color = AttachmentDescription {
        format: color_format,
        samples: 1,
        load_op: LoadOp::Clear,
        store_op: StoreOp::Store,
        stencil_load_op: LoadOp::DontCare,
        stencil_store_op: StoreOp::DontCare,
        initial_layout: ImageLayout::Undefined,
        final_layout: ImageLayout::PresentSrc,
    };
    let depth = AttachmentDescription {
        final_layout: ImageLayout::DepthStencilAttachment,
        ..describe_attachment(depth_format, TextureUsage::DEPTH_STENCIL_ATTACHMENT)
    };
    single_subpass_render_pass(vec![color, depth])
}

#[cfg(test)]
#[path = "swapchain_manager_tests.rs"]
mod tests;
