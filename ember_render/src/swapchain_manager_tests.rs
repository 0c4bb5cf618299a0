//! Unit tests for SwapchainManager and the selection helpers

use std::sync::Arc;
use crate::config::RenderConfig;
use crate::context::RenderContext;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{GpuEvent, MockGraphicsDevice};
use crate::graphics_device::{
    AcquireResult, ColorSpace, Extent2D, GraphicsDevice, PresentMode, SurfaceCapabilities,
    SurfaceFormat, TextureFormat, Framebuffer, RenderPass,
};
use crate::swapchain_manager::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, SwapchainManager,
};

fn caps(min: u32, max: u32) -> SurfaceCapabilities {
    SurfaceCapabilities {
        min_image_count: min,
        max_image_count: max,
        ..MockGraphicsDevice::default_capabilities()
    }
}

fn setup(capabilities: SurfaceCapabilities, config: RenderConfig) -> (Arc<MockGraphicsDevice>, RenderContext) {
    let mock = Arc::new(MockGraphicsDevice::with_capabilities(capabilities));
    let device: Arc<dyn GraphicsDevice> = mock.clone();
    (mock, RenderContext::new(device, config).unwrap())
}

fn free_extent_caps() -> SurfaceCapabilities {
    SurfaceCapabilities {
        current_extent: None,
        ..MockGraphicsDevice::default_capabilities()
    }
}

// ============================================================================
// SELECTION HELPER TESTS
// ============================================================================

#[test]
fn test_image_count_is_clamped() {
    assert_eq!(choose_image_count(3, &caps(2, 3)), 3);
    assert_eq!(choose_image_count(5, &caps(2, 3)), 3);
    assert_eq!(choose_image_count(1, &caps(2, 3)), 2);
    assert_eq!(choose_image_count(8, &caps(2, 0)), 8);
}

#[test]
fn test_surface_format_prefers_unorm_srgb() {
    let formats = [
        SurfaceFormat { format: TextureFormat::R16G16B16A16_SFLOAT, color_space: ColorSpace::Other },
        SurfaceFormat { format: TextureFormat::B8G8R8A8_UNORM, color_space: ColorSpace::SrgbNonLinear },
    ];
    assert_eq!(choose_surface_format(&formats).unwrap().format, TextureFormat::B8G8R8A8_UNORM);
}

#[test]
fn test_surface_format_falls_back_to_first() {
    let formats = [
        SurfaceFormat { format: TextureFormat::R16G16B16A16_SFLOAT, color_space: ColorSpace::Other },
        SurfaceFormat { format: TextureFormat::B8G8R8A8_SRGB, color_space: ColorSpace::SrgbNonLinear },
    ];
    assert_eq!(choose_surface_format(&formats).unwrap().format, TextureFormat::R16G16B16A16_SFLOAT);
    assert!(matches!(choose_surface_format(&[]), Err(Error::InitializationFailed(_))));
}

#[test]
fn test_present_mode_falls_back_to_fifo() {
    let supported = [PresentMode::Fifo, PresentMode::Immediate];
    assert_eq!(choose_present_mode(PresentMode::Mailbox, &supported), PresentMode::Fifo);
    assert_eq!(choose_present_mode(PresentMode::Immediate, &supported), PresentMode::Immediate);
}

#[test]
fn test_extent_uses_surface_extent_when_defined() {
    let caps = MockGraphicsDevice::default_capabilities();
    assert_eq!(choose_extent(Extent2D::new(10, 10), &caps), Extent2D::new(800, 600));

    let free = free_extent_caps();
    assert_eq!(choose_extent(Extent2D::new(10_000, 300), &free), Extent2D::new(4096, 300));
}

// ============================================================================
// CREATION TESTS
// ============================================================================

#[test]
fn test_requested_three_images_on_two_to_three_surface() {
    let config = RenderConfig { requested_image_count: 3, ..RenderConfig::default() };
    let (mock, ctx) = setup(caps(2, 3), config);
    let manager = SwapchainManager::new(&ctx, Extent2D::new(800, 600)).unwrap();

    assert_eq!(manager.image_count(), 3);
    assert_eq!(mock.created("swapchain_image"), 3);
    assert!(mock.violations().is_empty());
}

#[test]
fn test_screen_target_has_framebuffer_per_image() {
    let (mock, ctx) = setup(caps(2, 3), RenderConfig::default());
    let manager = SwapchainManager::new(&ctx, Extent2D::new(800, 600)).unwrap();

    assert_eq!(mock.created("framebuffer"), 3);
    for image in 0..manager.image_count() {
        let framebuffer = manager.framebuffer(image).unwrap();
        assert_eq!(framebuffer.attachment_count(), 2);
        assert_eq!(framebuffer.width(), 800);
    }
    assert!(manager.framebuffer(3).is_err());
    assert_eq!(manager.render_pass().color_attachment_count(), 1);
    assert!(manager.render_pass().has_depth_attachment());
    assert_eq!(manager.depth_format(), TextureFormat::D32_SFLOAT);
}

#[test]
fn test_mailbox_selected_when_supported() {
    let (_mock, ctx) = setup(caps(2, 3), RenderConfig::default());
    let manager = SwapchainManager::new(&ctx, Extent2D::new(800, 600)).unwrap();
    assert_eq!(manager.present_mode(), PresentMode::Mailbox);
    assert_eq!(manager.format(), TextureFormat::R8G8B8A8_UNORM);
}

#[test]
fn test_zero_extent_creation_fails() {
    let capabilities = SurfaceCapabilities {
        current_extent: Some(Extent2D::new(0, 0)),
        ..MockGraphicsDevice::default_capabilities()
    };
    let (_mock, ctx) = setup(capabilities, RenderConfig::default());
    assert!(matches!(
        SwapchainManager::new(&ctx, Extent2D::new(0, 0)),
        Err(Error::InitializationFailed(_))
    ));
}

// ============================================================================
// RECREATE TESTS
// ============================================================================

#[test]
fn test_recreate_rebuilds_framebuffers() {
    let (mock, ctx) = setup(free_extent_caps(), RenderConfig::default());
    let mut manager = SwapchainManager::new(&ctx, Extent2D::new(800, 600)).unwrap();

    manager.recreate(Extent2D::new(1024, 768)).unwrap();

    assert_eq!(manager.extent(), Extent2D::new(1024, 768));
    assert_eq!(manager.framebuffer(0).unwrap().width(), 1024);
    assert_eq!(mock.created("framebuffer"), 6);
    assert_eq!(mock.created("render_pass"), 1);

    let events = mock.events();
    let idle = events.iter().position(|e| *e == GpuEvent::WaitIdle).unwrap();
    let recreated = events.iter().position(|e| matches!(e, GpuEvent::SwapchainRecreated { .. })).unwrap();
    assert!(idle < recreated);
}

#[test]
fn test_recreate_is_idempotent() {
    let (_mock, ctx) = setup(free_extent_caps(), RenderConfig::default());
    let mut manager = SwapchainManager::new(&ctx, Extent2D::new(800, 600)).unwrap();

    let snapshot = |m: &SwapchainManager| {
        (m.image_count(), m.format(), m.extent(), m.framebuffer(0).unwrap().attachment_count())
    };

    manager.recreate(Extent2D::new(640, 480)).unwrap();
    let once = snapshot(&manager);
    manager.recreate(Extent2D::new(640, 480)).unwrap();
    assert_eq!(snapshot(&manager), once);
}

#[test]
fn test_zero_extent_recreate_is_deferred() {
    let (mock, ctx) = setup(MockGraphicsDevice::default_capabilities(), RenderConfig::default());
    let mut manager = SwapchainManager::new(&ctx, Extent2D::new(800, 600)).unwrap();
    let semaphore = mock.create_semaphore().unwrap();

    mock.set_capabilities(SurfaceCapabilities {
        current_extent: Some(Extent2D::new(0, 0)),
        ..MockGraphicsDevice::default_capabilities()
    });
    manager.recreate(Extent2D::new(0, 0)).unwrap();

    assert!(!manager.is_drawable());
    assert!(manager.framebuffer(0).is_err());
    assert_eq!(manager.acquire_next_image(semaphore.as_ref(), 0).unwrap(), AcquireResult::OutOfDate);

    mock.set_capabilities(MockGraphicsDevice::default_capabilities());
    manager.recreate(Extent2D::new(800, 600)).unwrap();
    assert!(manager.is_drawable());
    assert!(matches!(
        manager.acquire_next_image(semaphore.as_ref(), 0).unwrap(),
        AcquireResult::Image { .. }
    ));
}
