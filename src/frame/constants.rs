//! GPU constant buffer payloads
//!
//! Every payload is padded to a multiple of 256 bytes so one element can be
//! bound as its own constant buffer view.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

pub const MAX_LIGHT_COUNT: usize = 16;
pub const MAX_BONE_COUNT: usize = 64;
pub const MAX_FORCE_FIELD_COUNT: usize = 16;
pub const MAX_POINT_LIGHT_SHADOW_COUNT: usize = 4;

/// Maximum element counts of the per-frame constant buffers
pub const MAX_BATCH_COUNT: u32 = 4096 * 16;
pub const MAX_MATERIAL_COUNT: u32 = 2048 * 16;
pub const MAX_ARMATURE_COUNT: u32 = 16;
pub const MAX_PASS_COUNT: u32 = 32;
pub const MAX_EMITTER_COUNT: u32 = 32;
pub const MAX_POINT_SHADOW_FACE_COUNT: u32 = 6 * MAX_POINT_LIGHT_SHADOW_COUNT as u32;

/// Stencil bit marking the selected object
pub const STENCIL_FLAG_SELECTED: u32 = 1 << 4;

/// A constant buffer payload bound to a fixed shader register
pub trait ConstantBufferSlot: Pod {
    const SLOT: u32;
    const NAME: &'static str;
}

macro_rules! impl_constant_buffer {
    ($ty:ty, $slot:expr) => {
        impl ConstantBufferSlot for $ty {
            const SLOT: u32 = $slot;
            const NAME: &'static str = stringify!($ty);
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::zeroed()
            }
        }

        const _: () = assert!(std::mem::size_of::<$ty>() % 256 == 0);
    };
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerFrameConstantBuffer {
    pub lights: [Light; MAX_LIGHT_COUNT],

    pub camera_position: Vec3,
    pub light_count: u32,

    pub camera_forward: Vec3,
    pub frame_index: u32,

    pub camera_right: Vec3,
    pub camera_fov: f32,

    pub camera_up: Vec3,
    pub enable_bloom: u32,

    pub world_center: Vec3,
    pub world_size_half: f32,

    pub texel_size: f32,
    pub voxel_size: f32,
    pub bloom_threshold: f32,
    pub enable_vxgi: u32,

    pub debug_voxel_id: i32,
    pub force_field_count: u32,
    pub elapsed_time: f32,
    pub enable_shadow: u32,

    pub force_fields: [ForceField; MAX_FORCE_FIELD_COUNT],

    pub _padding: [u32; 36],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerPassConstantBuffer {
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub projection_view_matrix: Mat4,
    pub _padding: [f32; 16],
}

impl PerPassConstantBuffer {
    pub fn new(view_matrix: Mat4, projection_matrix: Mat4) -> Self {
        Self {
            view_matrix,
            projection_matrix,
            projection_view_matrix: projection_matrix * view_matrix,
            ..Self::zeroed()
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerBatchConstantBuffer {
    pub world_matrix: Mat4,
    pub has_animation: u32,
    pub _padding: [u32; 47],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialConstantBuffer {
    pub base_color: Vec4,

    pub metallic: f32,
    pub roughness: f32,
    pub emissive_power: f32,
    pub has_base_color_map: u32,

    pub has_normal_map: u32,
    pub has_material_map: u32,
    pub _padding_0: [u32; 2],

    pub base_color_map_handle: u64,
    pub normal_map_handle: u64,
    pub material_map_handle: u64,
    pub _padding_1: u64,

    pub _padding: [u32; 44],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BoneConstantBuffer {
    pub bones: [Mat4; MAX_BONE_COUNT],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct EmitterConstantBuffer {
    pub pre_sim_idx: i32,
    pub post_sim_idx: i32,
    pub elapsed_time: f32,
    pub life_span: f32,

    pub seeds: Vec3,
    pub particle_scale: f32,

    pub position: Vec3,
    pub particles_per_frame: u32,

    pub starting_velocity: Vec3,
    pub max_particle_count: u32,

    pub has_gravity: u32,
    pub _padding_0: [u32; 3],

    pub _padding: [u32; 44],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointShadowConstantBuffer {
    pub point_light_matrix: Mat4,
    pub point_light_position: Vec3,
    pub point_light_far: f32,
    pub _padding: [u32; 44],
}

impl_constant_buffer!(PerFrameConstantBuffer, 0);
impl_constant_buffer!(PerPassConstantBuffer, 1);
impl_constant_buffer!(PerBatchConstantBuffer, 2);
impl_constant_buffer!(MaterialConstantBuffer, 3);
impl_constant_buffer!(BoneConstantBuffer, 4);
impl_constant_buffer!(PointShadowConstantBuffer, 5);
impl_constant_buffer!(EmitterConstantBuffer, 6);

/// Light entry of the per-frame light array
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Light {
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    /// Corners of an area light
    pub points: [Vec4; 4],

    pub color: Vec3,
    pub light_type: i32,

    /// Position for point lights, direction for infinite lights
    pub position: Vec3,
    pub cast_shadow: i32,

    pub atten_constant: f32,
    pub atten_linear: f32,
    pub atten_quadratic: f32,
    pub max_distance: f32,

    pub shadow_map_index: i32,
    pub _padding: [i32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ForceField {
    pub position: Vec3,
    pub strength: f32,
}

const _: () = assert!(std::mem::size_of::<Light>() == 256);
