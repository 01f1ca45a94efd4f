//! Renderable scene components

use crate::backend::{MeshHandle, TextureHandle};
use crate::scene::Aabb;
use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3, Vec4};

/// Per-object visibility flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectFlags(u32);

impl ObjectFlags {
    pub const NONE: Self = Self(0);
    pub const RENDERABLE: Self = Self(1 << 0);
    pub const CAST_SHADOW: Self = Self(1 << 1);
    pub const DEFAULT: Self = Self((1 << 0) | (1 << 1));

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for ObjectFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Marks an entity as a drawable object referencing a mesh entity
#[derive(Component, Debug, Clone)]
pub struct ObjectComponent {
    pub flags: ObjectFlags,
    pub mesh: Entity,
}

impl ObjectComponent {
    pub fn new(mesh: Entity) -> Self {
        Self {
            flags: ObjectFlags::DEFAULT,
            mesh,
        }
    }

    pub fn with_flags(mut self, flags: ObjectFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// A range of the index buffer drawn with one material
#[derive(Debug, Clone)]
pub struct MeshSubset {
    pub index_count: u32,
    pub index_offset: u32,
    pub material: Entity,
    pub local_bound: Aabb,
}

/// Mesh geometry description
#[derive(Component, Debug, Clone, Default)]
pub struct MeshComponent {
    pub subsets: Vec<MeshSubset>,
    pub local_bound: Aabb,
    /// Total number of indices in the mesh
    pub index_count: u32,
    pub armature: Option<Entity>,
    /// Uploaded geometry; objects without it are not drawn
    pub gpu_mesh: Option<MeshHandle>,
}

/// A material texture slot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MaterialTexture {
    pub enabled: bool,
    pub texture: Option<TextureHandle>,
}

impl MaterialTexture {
    /// Texture is enabled and has finished loading
    pub fn resolved(&self) -> Option<TextureHandle> {
        if self.enabled {
            self.texture
        } else {
            None
        }
    }
}

/// PBR material parameters
#[derive(Component, Debug, Clone)]
pub struct MaterialComponent {
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: f32,
    pub base_color_map: MaterialTexture,
    pub normal_map: MaterialTexture,
    pub material_map: MaterialTexture,
}

impl Default for MaterialComponent {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
            emissive: 0.0,
            base_color_map: MaterialTexture::default(),
            normal_map: MaterialTexture::default(),
            material_map: MaterialTexture::default(),
        }
    }
}

/// Skinning bone matrices
#[derive(Component, Debug, Clone, Default)]
pub struct ArmatureComponent {
    pub bone_transforms: Vec<Mat4>,
}

/// GPU particle emitter placed by the entity transform
#[derive(Component, Debug, Clone)]
pub struct ParticleEmitterComponent {
    pub max_particle_count: u32,
    pub particles_per_frame: u32,
    pub particle_scale: f32,
    pub particle_life_span: f32,
    pub starting_velocity: Vec3,
    pub gravity: bool,
}

impl Default for ParticleEmitterComponent {
    fn default() -> Self {
        Self {
            max_particle_count: 1000,
            particles_per_frame: 10,
            particle_scale: 1.0,
            particle_life_span: 3.0,
            starting_velocity: Vec3::ZERO,
            gravity: false,
        }
    }
}

/// Point attractor or repulsor acting on particles
#[derive(Component, Debug, Clone, Copy)]
pub struct ForceFieldComponent {
    pub strength: f32,
    pub radius: f32,
}

impl Default for ForceFieldComponent {
    fn default() -> Self {
        Self {
            strength: 1.0,
            radius: 1.0,
        }
    }
}
