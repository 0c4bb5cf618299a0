/// FrameBuffer - ordered attachment set with its derived render pass
///
/// Attachments are added first; `create_render_pass()` derives a
/// single-subpass render pass from the attachment set and creates the
/// framebuffer object. Adding an attachment afterwards invalidates both
/// until the next `create_render_pass()`.

use std::sync::Arc;
use crate::error::Result;
use crate::{engine_bail, engine_debug};
use crate::frame_buffer::attachment::{Attachment, AttachmentCreateInfo};
use crate::graphics_device::{
    AccessFlags, AddressMode, AttachmentDescription, ClearValue, Extent2D, Filter, Framebuffer,
    FramebufferDesc, GraphicsDevice, PipelineStages, RenderPass, RenderPassDesc, Sampler,
    SamplerDesc, SubpassDependency, SubpassRef, Texture,
};

// ===== RENDER PASS DERIVATION =====

/// Build a single-subpass render pass description
///
/// Color references follow attachment order; at most one depth/stencil
/// attachment is allowed. Two external dependencies order the pass against
/// prior use of the images and against downstream sampling.
///
/// # Errors
///
/// `InvalidOperation` when `attachments` is empty or holds more than one
/// depth/stencil attachment.
pub fn single_subpass_render_pass(attachments: Vec<AttachmentDescription>) -> Result<RenderPassDesc> {
    if attachments.is_empty() {
        engine_bail!(InvalidOperation, "ember::frame_buffer",
            "Cannot create a render pass without color or depth attachments");
    }

    let mut color_refs = Vec::new();
    let mut depth_ref = None;
    for (index, attachment) in attachments.iter().enumerate() {
        if !attachment.format.is_depth_stencil() {
            color_refs.push(index as u32);
        } else if depth_ref.is_none() {
            depth_ref = Some(index as u32);
        } else {
            engine_bail!(InvalidOperation, "ember::frame_buffer",
                "Render pass allows one depth/stencil attachment, found another at index {}", index);
        }
    }

    let mut attachment_stages = PipelineStages::empty();
    let mut attachment_access = AccessFlags::empty();
    if !color_refs.is_empty() {
        attachment_stages |= PipelineStages::COLOR_ATTACHMENT_OUTPUT;
        attachment_access |= AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if depth_ref.is_some() {
        attachment_stages |= PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS;
        attachment_access |= AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }

    let dependencies = vec![
        // Layout transition happens before the first attachment write
        SubpassDependency {
            src_subpass: SubpassRef::External,
            dst_subpass: SubpassRef::Index(0),
            src_stages: PipelineStages::BOTTOM_OF_PIPE,
            dst_stages: attachment_stages,
            src_access: AccessFlags::MEMORY_READ,
            dst_access: attachment_access,
            by_region: true,
        },
        // Attachment writes are visible to later fragment shader reads
        SubpassDependency {
            src_subpass: SubpassRef::Index(0),
            dst_subpass: SubpassRef::External,
            src_stages: attachment_stages,
            dst_stages: PipelineStages::FRAGMENT_SHADER | PipelineStages::BOTTOM_OF_PIPE,
            src_access: attachment_access,
            dst_access: AccessFlags::SHADER_READ | AccessFlags::MEMORY_READ,
            by_region: true,
        },
    ];

    Ok(RenderPassDesc { attachments, color_refs, depth_ref, dependencies })
}

// ===== FRAME BUFFER =====

/// Owner of a set of attachments, their render pass and framebuffer
pub struct FrameBuffer {
    device: Arc<dyn GraphicsDevice>,
    width: u32,
    height: u32,
    attachments: Vec<Attachment>,
    render_pass: Option<Arc<dyn RenderPass>>,
    framebuffer: Option<Arc<dyn Framebuffer>>,
    sampler: Option<Arc<dyn Sampler>>,
}

impl FrameBuffer {
    /// Create an empty frame buffer of the given size
    pub fn new(device: Arc<dyn GraphicsDevice>, width: u32, height: u32) -> Self {
        Self {
            device,
            width,
            height,
            attachments: Vec::new(),
            render_pass: None,
            framebuffer: None,
            sampler: None,
        }
    }

    /// Allocate an attachment and return its stable index
    ///
    /// Width and height of `info` are overridden by the frame buffer size.
    pub fn add_attachment(&mut self, info: AttachmentCreateInfo) -> Result<usize> {
        let info = AttachmentCreateInfo { width: self.width, height: self.height, ..info };
        let attachment = Attachment::new(self.device.as_ref(), info)?;
        self.attachments.push(attachment);

        if self.render_pass.is_some() {
            engine_debug!("ember::frame_buffer",
                "Attachment added after render pass creation, render pass invalidated");
            self.framebuffer = None;
            self.render_pass = None;
        }

        Ok(self.attachments.len() - 1)
    }

    /// Derive the render pass from the current attachments and create the framebuffer
    ///
    /// Calling it again replaces the previous render pass.
    pub fn create_render_pass(&mut self) -> Result<()> {
        let desc = single_subpass_render_pass(
            self.attachments.iter().map(|a| a.description().clone()).collect(),
        )?;

        let render_pass = self.device.create_render_pass(&desc)?;
        let framebuffer = self.build_framebuffer(&render_pass)?;

        engine_debug!("ember::frame_buffer",
            "Render pass created: {} color + {} depth attachment(s), {}x{}",
            desc.color_refs.len(), desc.depth_ref.map_or(0, |_| 1), self.width, self.height);

        self.render_pass = Some(render_pass);
        self.framebuffer = Some(framebuffer);
        Ok(())
    }

    /// Create the sampler used by stages reading these attachments
    pub fn create_sampler(&mut self, filter: Filter, address_mode: AddressMode) -> Result<()> {
        let sampler = self.device.create_sampler(&SamplerDesc::for_attachments(filter, address_mode))?;
        self.sampler = Some(sampler);
        Ok(())
    }

    /// Rebuild every attachment and the framebuffer at a new size
    ///
    /// The render pass is kept: formats do not change.
    pub fn resize_and_recreate(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            engine_bail!(InvalidOperation, "ember::frame_buffer",
                "Cannot resize frame buffer to {}x{}", width, height);
        }

        self.framebuffer = None;
        let infos: Vec<AttachmentCreateInfo> = self.attachments
            .drain(..)
            .rev()
            .map(|a| *a.create_info())
            .collect();

        self.width = width;
        self.height = height;
        for info in infos.into_iter().rev() {
            let info = AttachmentCreateInfo { width, height, ..info };
            self.attachments.push(Attachment::new(self.device.as_ref(), info)?);
        }

        if let Some(render_pass) = self.render_pass.clone() {
            self.framebuffer = Some(self.build_framebuffer(&render_pass)?);
        }

        engine_debug!("ember::frame_buffer", "Frame buffer recreated at {}x{}", width, height);
        Ok(())
    }

    /// Release GPU objects in reverse creation order
    pub fn release(&mut self) {
        self.sampler = None;
        self.framebuffer = None;
        self.render_pass = None;
        while self.attachments.pop().is_some() {}
    }

    fn build_framebuffer(&self, render_pass: &Arc<dyn RenderPass>) -> Result<Arc<dyn Framebuffer>> {
        self.device.create_framebuffer(&FramebufferDesc {
            render_pass: render_pass.clone(),
            attachments: self.attachments.iter().map(|a| a.texture().clone()).collect(),
            width: self.width,
            height: self.height,
            layers: self.layer_count(),
        })
    }

    // ===== ACCESSORS =====

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }

    /// Maximum layer count across attachments
    pub fn layer_count(&self) -> u32 {
        self.attachments
            .iter()
            .map(|a| a.create_info().layer_count)
            .max()
            .unwrap_or(1)
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attachment(&self, index: usize) -> Option<&Attachment> {
        self.attachments.get(index)
    }

    /// Texture view of an attachment, for sampling downstream
    pub fn attachment_texture(&self, index: usize) -> Result<Arc<dyn Texture>> {
        match self.attachments.get(index) {
            Some(attachment) => Ok(attachment.texture().clone()),
            None => engine_bail!(InvalidResource, "ember::frame_buffer",
                "Attachment index {} out of range (count: {})", index, self.attachments.len()),
        }
    }

    pub fn depth_attachment(&self) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.is_depth_stencil())
    }

    pub fn color_attachment_count(&self) -> usize {
        self.attachments.iter().filter(|a| !a.is_depth_stencil()).count()
    }

    /// One clear value per attachment, in attachment order
    pub fn clear_values(&self) -> Vec<ClearValue> {
        self.attachments.iter().map(|a| a.clear_value()).collect()
    }

    pub fn render_pass(&self) -> Result<&Arc<dyn RenderPass>> {
        match &self.render_pass {
            Some(render_pass) => Ok(render_pass),
            None => engine_bail!(InvalidOperation, "ember::frame_buffer",
                "Render pass requested before create_render_pass()"),
        }
    }

    pub fn framebuffer(&self) -> Result<&Arc<dyn Framebuffer>> {
        match &self.framebuffer {
            Some(framebuffer) => Ok(framebuffer),
            None => engine_bail!(InvalidOperation, "ember::frame_buffer",
                "Framebuffer requested before create_render_pass()"),
        }
    }

    pub fn sampler(&self) -> Option<&Arc<dyn Sampler>> {
        self.sampler.as_ref()
    }
}

#[cfg(test)]
#[path = "frame_buffer_tests.rs"]
mod tests;
