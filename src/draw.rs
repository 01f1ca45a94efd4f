//! Per-pass draw lists.
//!
//! A [`PassContext`] is the visibility filtered list of batches one logical
//! pass draws. Filling it registers every referenced payload in the active
//! [`FrameContext`] caches, so an object drawn by several passes in the same
//! frame is uploaded once and every pass refers to it by the same index.

use bevy_ecs::entity::Entity;
use bytemuck::Zeroable;
use glam::{Mat4, Vec4};

use crate::backend::{BufferHandle, MeshHandle};
use crate::frame::*;
use crate::scene::*;

/// One indexed draw of a mesh subset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawContext {
    pub index_count: u32,
    pub index_offset: u32,
    pub material_idx: u32,
}

/// Everything drawn for one object in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchContext {
    pub batch_idx: u32,
    /// `None` when the mesh is not skinned
    pub bone_idx: Option<u32>,
    pub mesh: MeshHandle,
    /// Index count of the whole mesh, for passes that ignore subsets
    pub index_count: u32,
    /// Stencil flags, see [`STENCIL_FLAG_SELECTED`]
    pub flags: u32,
    pub subsets: Vec<DrawContext>,
}

/// Draw list of one logical pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassContext {
    pub draws: Vec<BatchContext>,
    /// Index of the pass payload in the frame's pass cache
    pub pass_idx: Option<u32>,
}

impl PassContext {
    /// Build the draw list of one pass.
    ///
    /// `filter1` is a cheap test on the object itself, `filter2` a spatial
    /// test applied to the world bound of the mesh and then of each subset.
    /// Objects without a transform or without an uploaded mesh are skipped.
    pub fn fill(
        frame: &mut FrameContext,
        scene: &Scene,
        pass_idx: Option<u32>,
        filter1: impl Fn(&ObjectComponent) -> bool,
        filter2: impl Fn(&Aabb) -> bool,
    ) -> Self {
        let mut draws = Vec::new();

        for (entity, object) in scene.objects() {
            let Some(transform) = scene.get::<TransformComponent>(entity) else {
                continue;
            };
            let Some(mesh) = scene.get::<MeshComponent>(object.mesh) else {
                continue;
            };
            let Some(gpu_mesh) = mesh.gpu_mesh else {
                continue;
            };

            if !filter1(object) {
                continue;
            }

            let world_matrix = transform.world_matrix();
            if !filter2(&mesh.local_bound.transformed(&world_matrix)) {
                continue;
            }

            let armature = mesh.armature.and_then(|armature_entity| {
                scene
                    .get::<ArmatureComponent>(armature_entity)
                    .map(|armature| (armature_entity, armature))
            });

            let batch_idx = frame.batch_cache.find_or_add(
                entity,
                PerBatchConstantBuffer {
                    world_matrix,
                    has_animation: armature.is_some() as u32,
                    ..Zeroable::zeroed()
                },
            );

            let mut flags = 0;
            if scene.selected == Some(entity) {
                flags |= STENCIL_FLAG_SELECTED;
            }

            let bone_idx = armature.map(|(armature_entity, armature)| {
                frame
                    .bone_cache
                    .find_or_add_with(armature_entity, || bone_payload(armature))
            });

            let mut subsets = Vec::with_capacity(mesh.subsets.len());
            for subset in &mesh.subsets {
                if !filter2(&subset.local_bound.transformed(&world_matrix)) {
                    continue;
                }

                let material_idx = frame.material_cache.find_or_add_with(subset.material, || {
                    material_payload(scene.get::<MaterialComponent>(subset.material))
                });
                subsets.push(DrawContext {
                    index_count: subset.index_count,
                    index_offset: subset.index_offset,
                    material_idx,
                });
            }

            draws.push(BatchContext {
                batch_idx,
                bone_idx,
                mesh: gpu_mesh,
                index_count: mesh.index_count,
                flags,
                subsets,
            });
        }

        Self { draws, pass_idx }
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Total number of subset draws
    pub fn draw_count(&self) -> usize {
        self.draws.iter().map(|batch| batch.subsets.len()).sum()
    }
}

fn bone_payload(armature: &ArmatureComponent) -> BoneConstantBuffer {
    assert!(
        armature.bone_transforms.len() <= MAX_BONE_COUNT,
        "armature has {} bones, at most {} are supported",
        armature.bone_transforms.len(),
        MAX_BONE_COUNT
    );

    let mut payload = BoneConstantBuffer::zeroed();
    payload.bones[..armature.bone_transforms.len()].copy_from_slice(&armature.bone_transforms);
    for bone in &mut payload.bones[armature.bone_transforms.len()..] {
        *bone = Mat4::IDENTITY;
    }
    payload
}

fn material_payload(material: Option<&MaterialComponent>) -> MaterialConstantBuffer {
    let Some(material) = material else {
        return MaterialConstantBuffer {
            base_color: Vec4::ONE,
            roughness: 1.0,
            ..Zeroable::zeroed()
        };
    };

    let base_color_map = material.base_color_map.resolved();
    let normal_map = material.normal_map.resolved();
    let material_map = material.material_map.resolved();

    MaterialConstantBuffer {
        base_color: material.base_color,
        metallic: material.metallic,
        roughness: material.roughness,
        emissive_power: material.emissive,
        has_base_color_map: base_color_map.is_some() as u32,
        has_normal_map: normal_map.is_some() as u32,
        has_material_map: material_map.is_some() as u32,
        base_color_map_handle: base_color_map.map_or(0, |t| t.raw()),
        normal_map_handle: normal_map.map_or(0, |t| t.raw()),
        material_map_handle: material_map.map_or(0, |t| t.raw()),
        ..Zeroable::zeroed()
    }
}

/// GPU buffers of one particle emitter, created the first time it is seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterBuffers {
    pub particles: BufferHandle,
    pub counters: BufferHandle,
    pub dead_list: BufferHandle,
    /// Alive lists before and after simulation, swapped every frame
    pub alive_lists: [BufferHandle; 2],
    pub indirect_args: BufferHandle,
}

impl EmitterBuffers {
    pub fn handles(&self) -> [BufferHandle; 6] {
        [
            self.particles,
            self.counters,
            self.dead_list,
            self.alive_lists[0],
            self.alive_lists[1],
            self.indirect_args,
        ]
    }
}

/// Particle emitter scheduled for simulation and drawing this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterDraw {
    pub entity: Entity,
    pub emitter_idx: u32,
    pub max_particle_count: u32,
    /// Alive list read by the simulation this frame, the other one is written
    pub pre_sim_index: usize,
    pub buffers: EmitterBuffers,
}

impl EmitterDraw {
    pub fn alive_pre_sim(&self) -> BufferHandle {
        self.buffers.alive_lists[self.pre_sim_index]
    }

    pub fn alive_post_sim(&self) -> BufferHandle {
        self.buffers.alive_lists[1 - self.pre_sim_index]
    }
}

/// Draw lists of every pass for the current frame
#[derive(Debug, Clone, Default)]
pub struct DrawData {
    pub shadow_pass: Option<PassContext>,
    pub point_shadow_passes: [Option<PassContext>; MAX_POINT_LIGHT_SHADOW_COUNT],
    pub voxel_pass: Option<PassContext>,
    pub main_pass: Option<PassContext>,
    /// First of six consecutive cube face pass payloads, set while the
    /// environment maps need to be rendered
    pub env_pass_idx: Option<u32>,
    pub emitters: Vec<EmitterDraw>,
}

impl DrawData {
    /// Drop every draw list, run together with the frame cache cleanup
    pub fn clear(&mut self) {
        self.shadow_pass = None;
        self.point_shadow_passes = Default::default();
        self.voxel_pass = None;
        self.main_pass = None;
        self.env_pass_idx = None;
        self.emitters.clear();
    }

    pub fn point_shadow_count(&self) -> usize {
        self.point_shadow_passes.iter().flatten().count()
    }
}
