/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Every resource keeps an `Arc<GpuContext>`, so the logical device, the
/// allocator and the instance outlive all of them. The context is the last
/// object destroyed and tears the device down in the required order.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

/// Debug messenger owned by the context (validation builds)
pub(crate) struct DebugMessenger {
    pub loader: ash::ext::debug_utils::Instance,
    pub messenger: vk::DebugUtilsMessengerEXT,
}

pub struct GpuContext {
    /// Vulkan library entry (keeps the loader alive)
    _entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    /// May be the same queue as `graphics_queue`
    pub present_queue: vk::Queue,
    pub present_queue_family: u32,

    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,
    pub swapchain_loader: ash::khr::swapchain::Device,

    /// Dropped before the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    debug_messenger: Option<DebugMessenger>,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        graphics_queue_family: u32,
        present_queue_family: u32,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        allocator: Allocator,
        debug_messenger: Option<DebugMessenger>,
    ) -> Self {
        let (graphics_queue, present_queue, swapchain_loader) = unsafe {
            (
                device.get_device_queue(graphics_queue_family, 0),
                device.get_device_queue(present_queue_family, 0),
                ash::khr::swapchain::Device::new(&instance, &device),
            )
        };
        Self {
            _entry: entry,
            instance,
            physical_device,
            device,
            graphics_queue,
            graphics_queue_family,
            present_queue,
            present_queue_family,
            surface,
            surface_loader,
            swapchain_loader,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            debug_messenger,
        }
    }

    /// Graphics and present work run on different queue families
    pub fn separate_present_queue(&self) -> bool {
        self.graphics_queue_family != self.present_queue_family
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Free allocator memory blocks while the device is alive
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);

            // Stop callbacks before the messenger goes away
            crate::debug::cleanup_debug_config();
            if let Some(debug) = self.debug_messenger.take() {
                debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}
