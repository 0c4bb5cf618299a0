/// GPU-visible data layouts shared by the stages
///
/// Every struct here is copied byte-for-byte into a uniform buffer, vertex
/// buffer or push constant range. Layouts follow std140: 16-byte aligned
/// members, explicit padding, sizes checked at compile time.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use crate::config::MAX_LIGHTS;
use crate::graphics_device::{VertexAttribute, VertexFormat, VertexLayout};
use crate::scene::{with_transform, DirectionalLight, PointLight, SceneStore};

// ===== VERTICES =====

/// Mesh vertex consumed by the offscreen and debug stages
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<Self>() as u32,
            attributes: vec![
                VertexAttribute { location: 0, format: VertexFormat::R32G32B32_SFLOAT, offset: 0 },
                VertexAttribute { location: 1, format: VertexFormat::R32G32B32_SFLOAT, offset: 12 },
                VertexAttribute { location: 2, format: VertexFormat::R32G32_SFLOAT, offset: 24 },
            ],
        }
    }
}

/// Immediate-mode UI vertex (color packed as RGBA8)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UiVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub col: u32,
}

impl UiVertex {
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: std::mem::size_of::<Self>() as u32,
            attributes: vec![
                VertexAttribute { location: 0, format: VertexFormat::R32G32_SFLOAT, offset: 0 },
                VertexAttribute { location: 1, format: VertexFormat::R32G32_SFLOAT, offset: 8 },
                VertexAttribute { location: 2, format: VertexFormat::R8G8B8A8_UNORM, offset: 16 },
            ],
        }
    }
}

// ===== UNIFORM BLOCKS =====

/// Per-entity block of the offscreen stage
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectUbo {
    /// Y axis flipped for Vulkan clip space
    pub projection: Mat4,
    pub model: Mat4,
    pub view: Mat4,
    /// xyz = object position, w = 1
    pub position: Vec4,
}

/// Per-entity block of the debug stage
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DebugUbo {
    pub mvp: Mat4,
    pub color: Vec4,
}

/// Camera block of the composite stage
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUbo {
    pub projection: Mat4,
    pub model_view: Mat4,
    /// xyz = camera position, w = 1
    pub position: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuDirectionalLight {
    /// xyz = direction (normalized), w = unused
    pub direction: Vec4,
    /// xyz = color, w = intensity
    pub color_intensity: Vec4,
    pub _padding: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPointLight {
    /// xyz = world position, w = range
    pub position_range: Vec4,
    /// xyz = color, w = intensity
    pub color_intensity: Vec4,
    pub _padding: Vec4,
}

/// Lighting block of the composite stage: fixed capacity + counts
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightingUbo {
    pub directional_count: u32,
    pub point_count: u32,
    pub _padding: [u32; 2],
    pub directional: [GpuDirectionalLight; MAX_LIGHTS],
    pub point: [GpuPointLight; MAX_LIGHTS],
}

impl LightingUbo {
    /// Pack every light of `scene`, returning the block and the number of
    /// lights that did not fit
    pub fn gather(scene: &SceneStore) -> (Self, usize) {
        let mut ubo = Self::zeroed();
        let mut dropped = 0;

        for (_, light) in scene.iter::<DirectionalLight>() {
            if ubo.directional_count as usize == MAX_LIGHTS {
                dropped += 1;
                continue;
            }
            ubo.directional[ubo.directional_count as usize] = GpuDirectionalLight {
                direction: light.direction.normalize_or_zero().extend(0.0),
                color_intensity: light.color.extend(light.intensity),
                _padding: Vec4::ZERO,
            };
            ubo.directional_count += 1;
        }

        for (_, light, transform) in with_transform::<PointLight>(scene) {
            if ubo.point_count as usize == MAX_LIGHTS {
                dropped += 1;
                continue;
            }
            ubo.point[ubo.point_count as usize] = GpuPointLight {
                position_range: transform.position.extend(light.range),
                color_intensity: light.color.extend(light.intensity),
                _padding: Vec4::ZERO,
            };
            ubo.point_count += 1;
        }

        (ubo, dropped)
    }
}

/// UI push constants: clip = pos * scale + translate
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UiPushConstants {
    pub scale: [f32; 2],
    pub translate: [f32; 2],
}

impl UiPushConstants {
    /// Map `[display_pos, display_pos + display_size]` to `[-1, 1]`
    pub fn new(display_pos: [f32; 2], display_size: [f32; 2]) -> Self {
        let scale = [2.0 / display_size[0], 2.0 / display_size[1]];
        Self {
            scale,
            translate: [
                -1.0 - display_pos[0] * scale[0],
                -1.0 - display_pos[1] * scale[1],
            ],
        }
    }
}

/// Perspective projection with the Y axis flipped for Vulkan clip space
pub fn vulkan_projection(mut projection: Mat4) -> Mat4 {
    projection.y_axis.y *= -1.0;
    projection
}

const _: () = assert!(std::mem::size_of::<MeshVertex>() == 32);
const _: () = assert!(std::mem::size_of::<UiVertex>() == 20);
const _: () = assert!(std::mem::size_of::<ObjectUbo>() == 208);
const _: () = assert!(std::mem::size_of::<DebugUbo>() == 80);
const _: () = assert!(std::mem::size_of::<CameraUbo>() == 144);
const _: () = assert!(std::mem::size_of::<GpuDirectionalLight>() == 48);
const _: () = assert!(std::mem::size_of::<GpuPointLight>() == 48);
const _: () = assert!(std::mem::size_of::<LightingUbo>() == 16 + 2 * 48 * MAX_LIGHTS);
const _: () = assert!(std::mem::size_of::<UiPushConstants>() == 16);
