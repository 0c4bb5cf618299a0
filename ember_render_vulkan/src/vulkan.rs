/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Owns instance, surface, physical/logical device selection and the memory
/// allocator (all held in a shared `GpuContext`). Every object it creates
/// keeps the context alive.

use ember_render::ember::{Error, RenderConfig, Result};
use ember_render::ember::device::{
    Buffer as RendererBuffer, BufferDesc, CommandBuffer as RendererCommandBuffer,
    DescriptorPool as RendererDescriptorPool, DescriptorPoolDesc,
    DescriptorSetLayout as RendererDescriptorSetLayout, DescriptorSetLayoutDesc, Extent2D,
    Fence as RendererFence, FenceWait, Framebuffer as RendererFramebuffer, FramebufferDesc,
    GraphicsDevice, Pipeline as RendererPipeline, PipelineDesc, RenderPass as RendererRenderPass,
    RenderPassDesc, Sampler as RendererSampler, SamplerDesc, Semaphore as RendererSemaphore,
    Shader as RendererShader, ShaderDesc, SubmitInfo, SurfaceCapabilities, SurfaceFormat,
    Swapchain as RendererSwapchain, SwapchainDesc, Texture as RendererTexture, TextureDesc,
    TextureFormat, TextureInfo,
};
use ember_render::{engine_bail, engine_err, engine_error, engine_info, engine_warn};
use ash::vk;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::MemoryLocation;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_buffer::CommandBuffer;
use crate::vulkan_context::{DebugMessenger, GpuContext};
use crate::vulkan_descriptor_set::{DescriptorPool, DescriptorSetLayout};
use crate::vulkan_format::*;
use crate::vulkan_frame_buffer::Framebuffer;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_sampler::Sampler;
use crate::vulkan_shader::Shader;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_sync::{vk_fence, vk_semaphore, Fence, Semaphore};
use crate::vulkan_texture::Texture;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan graphics device
pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
    device_name: String,
}

/// Queue families chosen on a physical device
struct QueueFamilies {
    graphics: u32,
    present: u32,
}

impl VulkanGraphicsDevice {
    /// Create the device for `window`
    ///
    /// Validation layers are enabled when `config.enable_validation` is set
    /// or the crate is built with the `vulkan-validation` feature, and only
    /// if the layer is installed.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &RenderConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
                })?;

            let app_name = CString::new(config.app_name.as_str())
                .unwrap_or_else(|_| CString::from(c"Ember Application"));
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Ember")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let display_handle = window.display_handle()
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to get display handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get display handle: {}", e))
                })?;
            let window_handle = window.window_handle()
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to get window handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get window handle: {}", e))
                })?;

            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to get required extensions: {}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                })?
                .to_vec();

            let enable_validation = (config.enable_validation || cfg!(feature = "vulkan-validation"))
                && Self::validation_layer_available(&entry);
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if enable_validation {
                vec![VALIDATION_LAYER.as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to create Vulkan instance: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
                })?;

            let debug_messenger = if enable_validation {
                Some(Self::create_debug_messenger(&entry, &instance)?)
            } else {
                None
            };

            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let (physical_device, families) = Self::pick_physical_device(&instance, &surface_loader, surface)?;
            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "Unknown GPU".to_string());

            // Logical device with one queue per distinct family
            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(families.graphics)
                    .queue_priorities(&queue_priorities),
            ];
            if families.present != families.graphics {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(families.present)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_features = vk::PhysicalDeviceFeatures::default();
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!("ember::vulkan", "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let ctx = Arc::new(GpuContext::new(
                entry,
                instance,
                physical_device,
                device,
                families.graphics,
                families.present,
                surface,
                surface_loader,
                allocator,
                debug_messenger,
            ));

            engine_info!("ember::vulkan", "Vulkan device ready: {} (graphics family {}, present family {}, validation {})",
                device_name, families.graphics, families.present, enable_validation);

            Ok(Self { ctx, device_name })
        }
    }

    /// Name reported by the physical device
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn validation_layer_available(entry: &ash::Entry) -> bool {
        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let available = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));
        if !available {
            engine_warn!("ember::vulkan", "Validation requested but {:?} is not installed", VALIDATION_LAYER);
        }
        available
    }

    fn create_debug_messenger(entry: &ash::Entry, instance: &ash::Instance) -> Result<DebugMessenger> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        crate::debug::init_debug_config();

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        let messenger = unsafe { loader.create_debug_utils_messenger(&debug_info, None) }
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create debug messenger: {:?}", e);
                Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
            })?;

        Ok(DebugMessenger { loader, messenger })
    }

    /// First discrete GPU able to render and present to `surface`, else the
    /// first suitable GPU
    fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
        let physical_devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to enumerate physical devices: {:?}", e);
                Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
            })?;

        let mut candidates: Vec<(vk::PhysicalDevice, QueueFamilies, bool)> = physical_devices
            .into_iter()
            .filter_map(|physical_device| {
                let families = Self::find_queue_families(instance, surface_loader, surface, physical_device)?;
                let properties = unsafe { instance.get_physical_device_properties(physical_device) };
                let discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
                Some((physical_device, families, discrete))
            })
            .collect();

        // Stable sort keeps enumeration order among equals
        candidates.sort_by_key(|(_, _, discrete)| !*discrete);

        candidates
            .into_iter()
            .next()
            .map(|(physical_device, families, _)| (physical_device, families))
            .ok_or_else(|| {
                engine_error!("ember::vulkan", "No GPU can render and present to this surface");
                Error::InitializationFailed("No suitable Vulkan GPU found".to_string())
            })
    }

    /// Graphics family, and a present family (the graphics one when it can
    /// present)
    fn find_queue_families(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Option<QueueFamilies> {
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let can_present = |index: u32| unsafe {
            surface_loader
                .get_physical_device_surface_support(physical_device, index, surface)
                .unwrap_or(false)
        };

        let graphics = queue_families
            .iter()
            .enumerate()
            .filter(|(_, family)| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|(index, _)| index as u32)
            .collect::<Vec<_>>();

        if let Some(&both) = graphics.iter().find(|&&index| can_present(index)) {
            return Some(QueueFamilies { graphics: both, present: both });
        }
        let present = (0..queue_families.len() as u32).find(|&index| can_present(index))?;
        Some(QueueFamilies { graphics: *graphics.first()?, present })
    }

    fn allocate(&self, name: &str, requirements: vk::MemoryRequirements, location: MemoryLocation, linear: bool)
        -> Result<gpu_allocator::vulkan::Allocation>
    {
        let mut allocator = self.ctx.allocator.lock()
            .map_err(|_| engine_err!("ember::vulkan", "GPU allocator lock poisoned"))?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|_| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("ember::vulkan", "Out of GPU memory for {} (required: {:.2} MB)", name, size_mb);
                Error::OutOfMemory
            })
    }

    fn free(&self, allocation: gpu_allocator::vulkan::Allocation) {
        if let Ok(mut allocator) = self.ctx.allocator.lock() {
            allocator.free(allocation).ok();
        }
    }
}

/// Map a queue/fence failure, keeping device loss distinguishable
fn device_error(what: &str, e: vk::Result) -> Error {
    if e == vk::Result::ERROR_DEVICE_LOST {
        engine_err!(DeviceLost, "ember::vulkan", "{}: device lost", what)
    } else {
        engine_err!("ember::vulkan", "{}: {:?}", what, e)
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    // ===== PRESENTATION =====

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        let ctx = &self.ctx;
        unsafe {
            let capabilities = ctx.surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
                .map_err(|e| device_error("Failed to get surface capabilities", e))?;
            let formats = ctx.surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
                .map_err(|e| device_error("Failed to get surface formats", e))?;
            let present_modes = ctx.surface_loader
                .get_physical_device_surface_present_modes(ctx.physical_device, ctx.surface)
                .map_err(|e| device_error("Failed to get present modes", e))?;

            // u32::MAX means the swapchain decides the extent
            let current_extent = if capabilities.current_extent.width == u32::MAX {
                None
            } else {
                Some(Extent2D::new(capabilities.current_extent.width, capabilities.current_extent.height))
            };

            Ok(SurfaceCapabilities {
                min_image_count: capabilities.min_image_count,
                max_image_count: capabilities.max_image_count,
                current_extent,
                min_extent: Extent2D::new(capabilities.min_image_extent.width, capabilities.min_image_extent.height),
                max_extent: Extent2D::new(capabilities.max_image_extent.width, capabilities.max_image_extent.height),
                formats: formats
                    .iter()
                    .filter_map(|f| {
                        format_from_vk(f.format).map(|format| SurfaceFormat {
                            format,
                            color_space: color_space_from_vk(f.color_space),
                        })
                    })
                    .collect(),
                present_modes: present_modes.into_iter().filter_map(present_mode_from_vk).collect(),
            })
        }
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<Box<dyn RendererSwapchain>> {
        Ok(Box::new(Swapchain::new(Arc::clone(&self.ctx), desc)?))
    }

    // ===== RESOURCES =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn RendererBuffer>> {
        if desc.size == 0 {
            engine_bail!(InvalidResource, "ember::vulkan", "Cannot create a zero-sized buffer");
        }

        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = self.ctx.device.create_buffer(&buffer_create_info, None)
                .map_err(|e| engine_err!("ember::vulkan", "Failed to create buffer of size {} bytes: {:?}", desc.size, e))?;

            let requirements = self.ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = match self.allocate("buffer", requirements, MemoryLocation::CpuToGpu, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = self.ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                self.free(allocation);
                self.ctx.device.destroy_buffer(buffer, None);
                engine_bail!("ember::vulkan", "Failed to bind buffer memory: {:?}", e);
            }

            Ok(Arc::new(Buffer::new(Arc::clone(&self.ctx), buffer, allocation, desc.size)))
        }
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn RendererTexture>> {
        if desc.width == 0 || desc.height == 0 || desc.array_layers == 0 {
            engine_bail!(InvalidResource, "ember::vulkan",
                "Invalid texture size {}x{} with {} layers", desc.width, desc.height, desc.array_layers);
        }
        let info = TextureInfo::from_desc(desc);

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format_to_vk(desc.format))
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(1)
                .array_layers(desc.array_layers)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = self.ctx.device.create_image(&image_create_info, None)
                .map_err(|e| engine_err!("ember::vulkan",
                    "Failed to create {}x{} {:?} image: {:?}", desc.width, desc.height, desc.format, e))?;

            let requirements = self.ctx.device.get_image_memory_requirements(image);
            let allocation = match self.allocate("texture", requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = self.ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                self.free(allocation);
                self.ctx.device.destroy_image(image, None);
                engine_bail!("ember::vulkan", "Failed to bind image memory: {:?}", e);
            }

            let view_create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(view_type_to_vk(info.view_type))
                .format(format_to_vk(desc.format))
                .components(vk::ComponentMapping::default())
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect_to_vk(info.aspect),
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: desc.array_layers,
                });

            let view = match self.ctx.device.create_image_view(&view_create_info, None) {
                Ok(view) => view,
                Err(e) => {
                    self.free(allocation);
                    self.ctx.device.destroy_image(image, None);
                    engine_bail!("ember::vulkan", "Failed to create image view: {:?}", e);
                }
            };

            Ok(Arc::new(Texture::new(Arc::clone(&self.ctx), image, view, allocation, info)))
        }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn RendererSampler>> {
        let create_info = Sampler::create_info(desc);
        let sampler = unsafe { self.ctx.device.create_sampler(&create_info, None) }
            .map_err(|e| engine_err!("ember::vulkan", "Failed to create sampler: {:?}", e))?;
        Ok(Arc::new(Sampler::new(Arc::clone(&self.ctx), sampler, desc.clone())))
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Arc<dyn RendererShader>> {
        if desc.code.is_empty() {
            engine_bail!(InvalidResource, "ember::vulkan", "Shader module has no SPIR-V code");
        }
        let entry_point = CString::new(desc.entry_point.as_str())
            .map_err(|_| engine_err!(InvalidResource, "ember::vulkan",
                "Shader entry point {:?} contains a NUL byte", desc.entry_point))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&desc.code);
        let module = unsafe { self.ctx.device.create_shader_module(&create_info, None) }
            .map_err(|e| engine_err!("ember::vulkan", "Failed to create shader module: {:?}", e))?;

        Ok(Arc::new(Shader::new(Arc::clone(&self.ctx), module, desc.stage, entry_point)))
    }

    fn supported_depth_format(&self) -> Result<TextureFormat> {
        for candidate in DEPTH_FORMAT_CANDIDATES {
            let properties = unsafe {
                self.ctx.instance.get_physical_device_format_properties(self.ctx.physical_device, format_to_vk(candidate))
            };
            if properties.optimal_tiling_features.contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT) {
                return Ok(candidate);
            }
        }
        engine_bail!(InitializationFailed, "ember::vulkan", "No supported depth/stencil attachment format")
    }

    // ===== RENDER STATE =====

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RendererRenderPass>> {
        let attachment_count = desc.attachments.len() as u32;
        if let Some(bad) = desc.color_refs.iter().chain(desc.depth_ref.iter()).find(|&&index| index >= attachment_count) {
            engine_bail!(InvalidResource, "ember::vulkan",
                "Render pass references attachment {} but has {}", bad, attachment_count);
        }

        let attachments: Vec<vk::AttachmentDescription> = desc.attachments
            .iter()
            .map(|attachment| {
                vk::AttachmentDescription::default()
                    .format(format_to_vk(attachment.format))
                    .samples(sample_count_to_vk(attachment.samples))
                    .load_op(load_op_to_vk(attachment.load_op))
                    .store_op(store_op_to_vk(attachment.store_op))
                    .stencil_load_op(load_op_to_vk(attachment.stencil_load_op))
                    .stencil_store_op(store_op_to_vk(attachment.stencil_store_op))
                    .initial_layout(image_layout_to_vk(attachment.initial_layout))
                    .final_layout(image_layout_to_vk(attachment.final_layout))
            })
            .collect();

        let color_refs: Vec<vk::AttachmentReference> = desc.color_refs
            .iter()
            .map(|&index| {
                vk::AttachmentReference::default()
                    .attachment(index)
                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            })
            .collect();
        let depth_ref = desc.depth_ref.map(|index| {
            vk::AttachmentReference::default()
                .attachment(index)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        });

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(ref depth_ref) = depth_ref {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        let dependencies: Vec<vk::SubpassDependency> = desc.dependencies
            .iter()
            .map(|dependency| {
                let flags = if dependency.by_region {
                    vk::DependencyFlags::BY_REGION
                } else {
                    vk::DependencyFlags::empty()
                };
                vk::SubpassDependency::default()
                    .src_subpass(subpass_ref_to_vk(dependency.src_subpass))
                    .dst_subpass(subpass_ref_to_vk(dependency.dst_subpass))
                    .src_stage_mask(pipeline_stages_to_vk(dependency.src_stages))
                    .dst_stage_mask(pipeline_stages_to_vk(dependency.dst_stages))
                    .src_access_mask(access_flags_to_vk(dependency.src_access))
                    .dst_access_mask(access_flags_to_vk(dependency.dst_access))
                    .dependency_flags(flags)
            })
            .collect();

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(&dependencies);

        let render_pass = unsafe { self.ctx.device.create_render_pass(&render_pass_info, None) }
            .map_err(|e| engine_err!("ember::vulkan", "Failed to create render pass: {:?}", e))?;

        Ok(Arc::new(RenderPass::new(
            Arc::clone(&self.ctx),
            render_pass,
            desc.color_refs.len() as u32,
            desc.depth_ref.is_some(),
        )))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn RendererFramebuffer>> {
        let vk_render_pass = unsafe {
            &*(desc.render_pass.as_ref() as *const dyn RendererRenderPass as *const RenderPass)
        };
        let views: Vec<vk::ImageView> = desc.attachments
            .iter()
            .map(|texture| unsafe {
                (*(texture.as_ref() as *const dyn RendererTexture as *const Texture)).view
            })
            .collect();

        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(desc.layers);

        let framebuffer = unsafe { self.ctx.device.create_framebuffer(&framebuffer_info, None) }
            .map_err(|e| engine_err!("ember::vulkan",
                "Failed to create {}x{} framebuffer: {:?}", desc.width, desc.height, e))?;

        Ok(Arc::new(Framebuffer::new(
            Arc::clone(&self.ctx),
            framebuffer,
            desc.width,
            desc.height,
            desc.layers,
            Arc::clone(&desc.render_pass),
            desc.attachments.clone(),
        )))
    }

    fn create_descriptor_set_layout(&self, desc: &DescriptorSetLayoutDesc) -> Result<Arc<dyn RendererDescriptorSetLayout>> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc.bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                    .descriptor_count(binding.count)
                    .stage_flags(stage_flags_to_vk(binding.stages))
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe { self.ctx.device.create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| engine_err!("ember::vulkan", "Failed to create descriptor set layout: {:?}", e))?;

        Ok(Arc::new(DescriptorSetLayout::new(Arc::clone(&self.ctx), layout, desc.bindings.clone())))
    }

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<Arc<dyn RendererDescriptorPool>> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = desc.pool_sizes
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|&(descriptor_type, count)| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(descriptor_type),
                descriptor_count: count,
            })
            .collect();

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&pool_sizes)
            .max_sets(desc.max_sets);

        let pool = unsafe { self.ctx.device.create_descriptor_pool(&create_info, None) }
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create descriptor pool: {:?}", e);
                Error::InitializationFailed(format!("Failed to create descriptor pool: {:?}", e))
            })?;

        Ok(Arc::new(DescriptorPool::new(Arc::clone(&self.ctx), pool, desc.max_sets)))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn RendererPipeline>> {
        unsafe {
            let vertex_shader = &*(desc.vertex_shader.as_ref() as *const dyn RendererShader as *const Shader);
            let fragment_shader = &*(desc.fragment_shader.as_ref() as *const dyn RendererShader as *const Shader);
            let vk_render_pass = &*(desc.render_pass.as_ref() as *const dyn RendererRenderPass as *const RenderPass);

            let shader_stages = [
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_to_vk(vertex_shader.stage()))
                    .module(vertex_shader.module)
                    .name(&vertex_shader.entry_point),
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_to_vk(fragment_shader.stage()))
                    .module(fragment_shader.module)
                    .name(&fragment_shader.entry_point),
            ];

            // Single per-vertex binding, or none for shader-generated geometry
            let (vertex_bindings, vertex_attributes) = match &desc.vertex_layout {
                Some(layout) => (
                    vec![vk::VertexInputBindingDescription {
                        binding: 0,
                        stride: layout.stride,
                        input_rate: vk::VertexInputRate::VERTEX,
                    }],
                    layout.attributes
                        .iter()
                        .map(|attribute| vk::VertexInputAttributeDescription {
                            location: attribute.location,
                            binding: 0,
                            format: vertex_format_to_vk(attribute.format),
                            offset: attribute.offset,
                        })
                        .collect::<Vec<_>>(),
                ),
                None => (Vec::new(), Vec::new()),
            };

            let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
                .vertex_binding_descriptions(&vertex_bindings)
                .vertex_attribute_descriptions(&vertex_attributes);

            let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
                .topology(topology_to_vk(desc.topology))
                .primitive_restart_enable(false);

            // Dynamic viewport/scissor, counts only
            let viewport_state = vk::PipelineViewportStateCreateInfo::default()
                .viewport_count(1)
                .scissor_count(1);

            let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
                .depth_clamp_enable(false)
                .rasterizer_discard_enable(false)
                .polygon_mode(polygon_mode_to_vk(desc.rasterization.polygon_mode))
                .line_width(desc.rasterization.line_width)
                .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
                .front_face(front_face_to_vk(desc.rasterization.front_face))
                .depth_bias_enable(false);

            let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(desc.depth.test_enable)
                .depth_write_enable(desc.depth.write_enable)
                .depth_compare_op(compare_op_to_vk(desc.depth.compare_op))
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false);

            let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
                .sample_shading_enable(false)
                .rasterization_samples(vk::SampleCountFlags::TYPE_1);

            // One blend state per color attachment of the render pass
            let blend_attachments = vec![
                blend_attachment_to_vk(desc.blend);
                vk_render_pass.color_attachment_count() as usize
            ];
            let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
                .logic_op_enable(false)
                .attachments(&blend_attachments);

            let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
            let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
                .dynamic_states(&dynamic_states);

            let push_constant_ranges: Vec<vk::PushConstantRange> = desc.push_constant_ranges
                .iter()
                .map(|range| vk::PushConstantRange {
                    stage_flags: stage_flags_to_vk(range.stages),
                    offset: range.offset,
                    size: range.size,
                })
                .collect();

            let set_layouts: Vec<vk::DescriptorSetLayout> = desc.descriptor_set_layouts
                .iter()
                .map(|layout| {
                    (*(layout.as_ref() as *const dyn RendererDescriptorSetLayout as *const DescriptorSetLayout)).layout
                })
                .collect();

            let layout_create_info = vk::PipelineLayoutCreateInfo::default()
                .set_layouts(&set_layouts)
                .push_constant_ranges(&push_constant_ranges);

            let layout = self.ctx.device.create_pipeline_layout(&layout_create_info, None)
                .map_err(|e| engine_err!("ember::vulkan",
                    "Failed to create pipeline layout for '{}': {:?}", desc.label, e))?;

            let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
                .stages(&shader_stages)
                .vertex_input_state(&vertex_input_state)
                .input_assembly_state(&input_assembly_state)
                .viewport_state(&viewport_state)
                .rasterization_state(&rasterization_state)
                .depth_stencil_state(&depth_stencil_state)
                .multisample_state(&multisample_state)
                .color_blend_state(&color_blend_state)
                .dynamic_state(&dynamic_state)
                .layout(layout)
                .render_pass(vk_render_pass.render_pass)
                .subpass(0);

            let pipelines = match self.ctx.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_create_info],
                None,
            ) {
                Ok(pipelines) => pipelines,
                Err((_, e)) => {
                    self.ctx.device.destroy_pipeline_layout(layout, None);
                    engine_bail!("ember::vulkan", "Failed to create graphics pipeline '{}': {:?}", desc.label, e);
                }
            };

            Ok(Arc::new(Pipeline::new(
                Arc::clone(&self.ctx),
                pipelines[0],
                layout,
                desc.label.clone(),
                desc.descriptor_set_layouts.clone(),
            )))
        }
    }

    // ===== COMMANDS AND SYNCHRONIZATION =====

    fn create_command_buffer(&self) -> Result<Box<dyn RendererCommandBuffer>> {
        Ok(Box::new(CommandBuffer::new(Arc::clone(&self.ctx))?))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn RendererSemaphore>> {
        let semaphore = unsafe { self.ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| engine_err!("ember::vulkan", "Failed to create semaphore: {:?}", e))?;
        Ok(Arc::new(Semaphore::new(Arc::clone(&self.ctx), semaphore)))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn RendererFence>> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { self.ctx.device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None) }
            .map_err(|e| engine_err!("ember::vulkan", "Failed to create fence: {:?}", e))?;
        Ok(Arc::new(Fence::new(Arc::clone(&self.ctx), fence)))
    }

    fn wait_for_fence(&self, fence: &dyn RendererFence, timeout_ns: u64) -> Result<FenceWait> {
        match unsafe { self.ctx.device.wait_for_fences(&[vk_fence(fence)], true, timeout_ns) } {
            Ok(()) => Ok(FenceWait::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(FenceWait::TimedOut),
            Err(e) => Err(device_error("Failed to wait for fence", e)),
        }
    }

    fn reset_fence(&self, fence: &dyn RendererFence) -> Result<()> {
        unsafe { self.ctx.device.reset_fences(&[vk_fence(fence)]) }
            .map_err(|e| device_error("Failed to reset fence", e))
    }

    fn submit(&self, info: &SubmitInfo) -> Result<()> {
        let command_buffers: Vec<vk::CommandBuffer> = info.command_buffers
            .iter()
            .map(|&cmd| unsafe {
                (*(cmd as *const dyn RendererCommandBuffer as *const CommandBuffer)).command_buffer
            })
            .collect();
        let wait_semaphores: Vec<vk::Semaphore> = info.wait_semaphores
            .iter()
            .map(|wait| vk_semaphore(wait.semaphore))
            .collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = info.wait_semaphores
            .iter()
            .map(|wait| pipeline_stages_to_vk(wait.stages))
            .collect();
        let signal_semaphores: Vec<vk::Semaphore> = info.signal_semaphores
            .iter()
            .map(|&semaphore| vk_semaphore(semaphore))
            .collect();
        let fence = info.fence.map(vk_fence).unwrap_or_else(vk::Fence::null);

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe { self.ctx.device.queue_submit(self.ctx.graphics_queue, &[submit_info], fence) }
            .map_err(|e| device_error("Failed to submit commands to the graphics queue", e))
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| device_error("Failed to wait idle", e))
    }
}
