//! Shared fixtures for tests running against the mock device

use std::sync::Arc;
use glam::{Vec3, Vec4};
use crate::config::RenderConfig;
use crate::context::RenderContext;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{
    AddressMode, BufferDesc, BufferUsage, Filter, GraphicsDevice, SamplerDesc, ShaderDesc,
    ShaderStage, Texture, TextureDesc, TextureFormat, TextureUsage,
};
use crate::scene::{Entity, Material, MaterialKind, Mesh, MeshRenderer, SceneStore, Transform};
use crate::subpass::{
    CompositeStage, DebugStage, MeshVertex, OffscreenStage, StageShaders, Subpass, UiStage,
};

/// Mock device + context with a small G-buffer
pub fn mock_context(frames_in_flight: u32) -> (Arc<MockGraphicsDevice>, RenderContext) {
    let mock = Arc::new(MockGraphicsDevice::new());
    let device: Arc<dyn GraphicsDevice> = mock.clone();
    let config = RenderConfig {
        frames_in_flight,
        offscreen_extent: 64,
        ..RenderConfig::default()
    };
    (mock, RenderContext::new(device, config).unwrap())
}

pub fn shaders(device: &dyn GraphicsDevice) -> StageShaders {
    let shader = |stage| {
        device
            .create_shader(&ShaderDesc { stage, code: vec![0x0723_0203], entry_point: "main".to_string() })
            .unwrap()
    };
    StageShaders {
        vertex: shader(ShaderStage::Vertex),
        fragment: shader(ShaderStage::Fragment),
    }
}

fn texture(device: &dyn GraphicsDevice, format: TextureFormat) -> Arc<dyn Texture> {
    device
        .create_texture(&TextureDesc {
            width: 4,
            height: 4,
            array_layers: 1,
            format,
            usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
        })
        .unwrap()
}

pub fn ui_stage(device: &dyn GraphicsDevice) -> UiStage {
    let sampler = device
        .create_sampler(&SamplerDesc::for_attachments(Filter::Linear, AddressMode::ClampToEdge))
        .unwrap();
    UiStage::new(shaders(device), texture(device, TextureFormat::R8G8B8A8_UNORM), sampler)
}

/// Offscreen, composite, debug, UI
pub fn standard_subpasses(device: &dyn GraphicsDevice) -> Vec<Subpass> {
    vec![
        Subpass::Offscreen(OffscreenStage::new(shaders(device))),
        Subpass::Composite(CompositeStage::new(shaders(device))),
        Subpass::Debug(DebugStage::new(shaders(device))),
        Subpass::Ui(ui_stage(device)),
    ]
}

pub fn material(device: &dyn GraphicsDevice, kind: MaterialKind) -> Material {
    let sampler = device
        .create_sampler(&SamplerDesc::for_attachments(Filter::Linear, AddressMode::Repeat))
        .unwrap();
    Material {
        kind,
        albedo: texture(device, TextureFormat::R8G8B8A8_SRGB),
        normal: texture(device, TextureFormat::R8G8B8A8_UNORM),
        metallic: texture(device, TextureFormat::R8G8B8A8_UNORM),
        roughness: texture(device, TextureFormat::R8G8B8A8_UNORM),
        sampler,
        color: Vec4::new(0.0, 1.0, 0.0, 1.0),
    }
}

/// A triangle mesh entity at `position`
pub fn spawn_mesh(scene: &mut SceneStore, device: &dyn GraphicsDevice, kind: MaterialKind, position: Vec3) -> Entity {
    let vertex_buffer = device
        .create_buffer(&BufferDesc { size: 3 * std::mem::size_of::<MeshVertex>() as u64, usage: BufferUsage::Vertex })
        .unwrap();
    let index_buffer = device
        .create_buffer(&BufferDesc { size: 3 * 4, usage: BufferUsage::Index })
        .unwrap();

    let entity = scene.create();
    scene.attach(entity, Transform::from_position(position)).unwrap();
    scene
        .attach(entity, MeshRenderer {
            mesh: Mesh { vertex_buffer, index_buffer, index_count: 3 },
            material: material(device, kind),
        })
        .unwrap();
    entity
}
