/// Swapchain - Vulkan implementation of the Swapchain trait
///
/// Only presentation lives here. Out-of-date and suboptimal surfaces are
/// reported as values so the frame loop can recreate the swapchain.

use ember_render::ember::{Error, Result};
use ember_render::ember::device::{
    AcquireResult, Extent2D, PresentMode, PresentResult, Semaphore as RendererSemaphore,
    Swapchain as RendererSwapchain, SwapchainDesc, Texture as RendererTexture, TextureDesc,
    TextureFormat, TextureInfo, TextureUsage,
};
use ember_render::{engine_bail, engine_debug, engine_error};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{color_space_to_vk, format_to_vk, present_mode_to_vk};
use crate::vulkan_sync::vk_semaphore;
use crate::vulkan_texture::Texture;

pub struct Swapchain {
    ctx: Arc<GpuContext>,
    swapchain: vk::SwapchainKHR,
    /// Swapchain images wrapped with their views
    images: Vec<Arc<dyn RendererTexture>>,
    desc: SwapchainDesc,
}

impl Swapchain {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &SwapchainDesc) -> Result<Self> {
        let swapchain = create_swapchain(&ctx, desc, vk::SwapchainKHR::null())?;
        let images = match wrap_images(&ctx, swapchain, desc) {
            Ok(images) => images,
            Err(e) => {
                unsafe { ctx.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        engine_debug!("ember::vulkan", "Swapchain created: {} images, {}x{}, {:?}",
            images.len(), desc.extent.width, desc.extent.height, desc.present_mode);

        Ok(Self { ctx, swapchain, images, desc: *desc })
    }
}

fn create_swapchain(ctx: &GpuContext, desc: &SwapchainDesc, old_swapchain: vk::SwapchainKHR) -> Result<vk::SwapchainKHR> {
    unsafe {
        let capabilities = ctx.surface_loader
            .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to get surface capabilities: {:?}", e);
                Error::BackendError(format!("Failed to get surface capabilities: {:?}", e))
            })?;

        let queue_families = [ctx.graphics_queue_family, ctx.present_queue_family];
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(ctx.surface)
            .min_image_count(desc.image_count)
            .image_format(format_to_vk(desc.surface_format.format))
            .image_color_space(color_space_to_vk(desc.surface_format.color_space))
            .image_extent(vk::Extent2D { width: desc.extent.width, height: desc.extent.height })
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode_to_vk(desc.present_mode))
            .clipped(true)
            .old_swapchain(old_swapchain);

        // Images are shared by both families rather than transferred
        create_info = if ctx.separate_present_queue() {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        ctx.swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create swapchain: {:?}", e);
                Error::BackendError(format!("Failed to create swapchain: {:?}", e))
            })
    }
}

fn wrap_images(ctx: &Arc<GpuContext>, swapchain: vk::SwapchainKHR, desc: &SwapchainDesc) -> Result<Vec<Arc<dyn RendererTexture>>> {
    let vk_images = unsafe { ctx.swapchain_loader.get_swapchain_images(swapchain) }
        .map_err(|e| {
            engine_error!("ember::vulkan", "Failed to get swapchain images: {:?}", e);
            Error::BackendError(format!("Failed to get swapchain images: {:?}", e))
        })?;

    let info = TextureInfo::from_desc(&TextureDesc {
        width: desc.extent.width,
        height: desc.extent.height,
        array_layers: 1,
        format: desc.surface_format.format,
        usage: TextureUsage::COLOR_ATTACHMENT,
    });

    let mut images: Vec<Arc<dyn RendererTexture>> = Vec::with_capacity(vk_images.len());
    for image in vk_images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format_to_vk(desc.surface_format.format))
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        // Views created so far are released with `images` on error
        let view = unsafe { ctx.device.create_image_view(&create_info, None) }
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create swapchain image view: {:?}", e);
                Error::BackendError(format!("Failed to create swapchain image view: {:?}", e))
            })?;

        images.push(Arc::new(Texture::from_swapchain_image(Arc::clone(ctx), image, view, info.clone())));
    }
    Ok(images)
}

impl RendererSwapchain for Swapchain {
    fn acquire_next_image(&mut self, signal: &dyn RendererSemaphore, timeout_ns: u64) -> Result<AcquireResult> {
        let result = unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout_ns,
                vk_semaphore(signal),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, suboptimal)) => Ok(AcquireResult::Image { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireResult::OutOfDate),
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => {
                engine_bail!("ember::vulkan", "Timed out acquiring a swapchain image")
            }
            Err(vk::Result::ERROR_DEVICE_LOST) => {
                engine_bail!(DeviceLost, "ember::vulkan", "Device lost while acquiring a swapchain image")
            }
            Err(e) => engine_bail!("ember::vulkan", "Failed to acquire next swapchain image: {:?}", e),
        }
    }

    fn present(&mut self, wait: &dyn RendererSemaphore, image_index: u32) -> Result<PresentResult> {
        if image_index as usize >= self.images.len() {
            engine_bail!(InvalidOperation, "ember::vulkan",
                "Present of image {} out of range (count: {})", image_index, self.images.len());
        }

        let wait_semaphores = [vk_semaphore(wait)];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.ctx.swapchain_loader.queue_present(self.ctx.present_queue, &present_info)
        };

        match result {
            Ok(false) => Ok(PresentResult::Presented),
            Ok(true) => Ok(PresentResult::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentResult::OutOfDate),
            Err(vk::Result::ERROR_DEVICE_LOST) => {
                engine_bail!(DeviceLost, "ember::vulkan", "Device lost during present")
            }
            Err(e) => engine_bail!("ember::vulkan", "Failed to present swapchain image: {:?}", e),
        }
    }

    fn recreate(&mut self, desc: &SwapchainDesc) -> Result<()> {
        // Views must go before their images
        self.images.clear();

        let old_swapchain = self.swapchain;
        let created = create_swapchain(&self.ctx, desc, old_swapchain);
        unsafe {
            self.ctx.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }
        self.swapchain = match created {
            Ok(swapchain) => swapchain,
            Err(e) => {
                self.swapchain = vk::SwapchainKHR::null();
                return Err(e);
            }
        };

        self.images = wrap_images(&self.ctx, self.swapchain, desc)?;
        self.desc = *desc;

        engine_debug!("ember::vulkan", "Swapchain recreated: {} images, {}x{}",
            self.images.len(), desc.extent.width, desc.extent.height);
        Ok(())
    }

    fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    fn image(&self, index: u32) -> Result<Arc<dyn RendererTexture>> {
        match self.images.get(index as usize) {
            Some(image) => Ok(Arc::clone(image)),
            None => engine_bail!(InvalidResource, "ember::vulkan",
                "Swapchain image {} out of range (count: {})", index, self.images.len()),
        }
    }

    fn extent(&self) -> Extent2D {
        self.desc.extent
    }

    fn format(&self) -> TextureFormat {
        self.desc.surface_format.format
    }

    fn present_mode(&self) -> PresentMode {
        self.desc.present_mode
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.images.clear();
        unsafe {
            self.ctx.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
