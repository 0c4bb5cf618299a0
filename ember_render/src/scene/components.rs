/// Scene components read by the render pipeline

use std::sync::Arc;
use glam::{Mat4, Quat, Vec3, Vec4};
use crate::graphics_device::{Buffer, Sampler, Texture};
use crate::scene::{Entity, SceneStore};

// ===== TRANSFORM =====

/// World placement of an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self { position: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::default() }
    }

    /// Model matrix (scale, then rotation, then translation)
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

// ===== MESH RENDERER =====

/// GPU geometry of a mesh
#[derive(Clone)]
pub struct Mesh {
    pub vertex_buffer: Arc<dyn Buffer>,
    pub index_buffer: Arc<dyn Buffer>,
    /// 32-bit indices
    pub index_count: u32,
}

/// Which stage draws a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaterialKind {
    /// Filled into the G-buffer by the offscreen stage
    #[default]
    Default,
    /// Drawn as wireframe by the debug stage
    Debug,
}

/// Textures and parameters of a surface
#[derive(Clone)]
pub struct Material {
    pub kind: MaterialKind,
    pub albedo: Arc<dyn Texture>,
    pub normal: Arc<dyn Texture>,
    pub metallic: Arc<dyn Texture>,
    pub roughness: Arc<dyn Texture>,
    pub sampler: Arc<dyn Sampler>,
    /// Wireframe color for debug materials
    pub color: Vec4,
}

/// Mesh + material pair drawn by the pipeline
#[derive(Clone)]
pub struct MeshRenderer {
    pub mesh: Mesh,
    pub material: Material,
}

// ===== LIGHTS =====

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self { direction: Vec3::new(0.0, -1.0, 0.0), color: Vec3::ONE, intensity: 1.0 }
    }
}

/// Point light; its position is the entity's `Transform`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self { color: Vec3::ONE, intensity: 10.0, range: 5.0 }
    }
}

// ===== CAMERA =====

/// Perspective camera; its placement is the entity's `Transform`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self { fov_y: 45f32.to_radians(), near: 0.1, far: 256.0 }
    }
}

impl Camera {
    /// Right-handed, zero-to-one depth projection
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(f32::EPSILON), self.near, self.far)
    }
}

/// Camera matrices resolved for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl CameraView {
    /// First camera with a transform in `scene`, or a default camera at the origin
    pub fn resolve(scene: &SceneStore, aspect: f32) -> Self {
        let found = scene
            .iter::<Camera>()
            .find_map(|(entity, camera)| scene.get::<Transform>(entity).map(|t| (*camera, *t)));
        let (camera, transform) = found.unwrap_or_default();

        Self {
            view: transform.matrix().inverse(),
            projection: camera.projection(aspect),
            position: transform.position,
        }
    }
}

/// Entities that carry both a `T` and a `Transform`
pub fn with_transform<T: 'static>(scene: &SceneStore) -> impl Iterator<Item = (Entity, &T, &Transform)> + '_ {
    scene
        .iter::<T>()
        .filter_map(|(entity, component)| scene.get::<Transform>(entity).map(|t| (entity, component, t)))
}
