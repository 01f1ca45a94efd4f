//! Per-frame GPU constant buffers and their CPU caches

use std::marker::PhantomData;

use bevy_ecs::entity::Entity;
use bytemuck::Zeroable;

use crate::backend::{Backend, BackendResult, BufferDescriptor, BufferHandle};
use crate::frame::cache::{ConstantBufferCache, ConstantBufferList};
use crate::frame::constants::*;

/// A GPU constant buffer holding up to `capacity` elements of `T`
#[derive(Debug)]
pub struct ConstantBuffer<T: ConstantBufferSlot> {
    handle: BufferHandle,
    capacity: u32,
    _marker: PhantomData<T>,
}

impl<T: ConstantBufferSlot> ConstantBuffer<T> {
    pub fn create(backend: &mut dyn Backend, capacity: u32) -> BackendResult<Self> {
        let handle = backend.create_constant_buffer(&BufferDescriptor {
            label: Some(T::NAME.to_string()),
            element_size: std::mem::size_of::<T>() as u32,
            element_count: capacity,
        })?;
        Ok(Self {
            handle,
            capacity,
            _marker: PhantomData,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Bind element `index` to the payload's shader register
    pub fn bind(&self, backend: &mut dyn Backend, index: u32) {
        assert!(
            index < self.capacity,
            "{} index {} out of range ({})",
            T::NAME,
            index,
            self.capacity
        );
        backend.bind_constant_buffer_slot(self.handle, T::SLOT, index);
    }

    /// Upload `data` to the start of the buffer
    pub fn update(&self, backend: &mut dyn Backend, data: &[T]) {
        assert!(
            data.len() <= self.capacity as usize,
            "{} upload of {} elements exceeds capacity {}",
            T::NAME,
            data.len(),
            self.capacity
        );
        if !data.is_empty() {
            backend.update_constant_buffer(self.handle, bytemuck::cast_slice(data));
        }
    }
}

/// Element counts of the buffers owned by one [`FrameContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCapacities {
    pub batch: u32,
    pub material: u32,
    pub bone: u32,
    pub pass: u32,
    pub emitter: u32,
}

impl Default for FrameCapacities {
    fn default() -> Self {
        Self {
            batch: MAX_BATCH_COUNT,
            material: MAX_MATERIAL_COUNT,
            bone: MAX_ARMATURE_COUNT,
            pass: MAX_PASS_COUNT,
            emitter: MAX_EMITTER_COUNT,
        }
    }
}

/// State for one in-flight frame
pub struct FrameContext {
    pub batch_cb: ConstantBuffer<PerBatchConstantBuffer>,
    pub material_cb: ConstantBuffer<MaterialConstantBuffer>,
    pub bone_cb: ConstantBuffer<BoneConstantBuffer>,
    pub pass_cb: ConstantBuffer<PerPassConstantBuffer>,
    pub emitter_cb: ConstantBuffer<EmitterConstantBuffer>,
    pub point_shadow_cb: ConstantBuffer<PointShadowConstantBuffer>,
    pub per_frame_cb: ConstantBuffer<PerFrameConstantBuffer>,

    pub batch_cache: ConstantBufferCache<Entity, PerBatchConstantBuffer>,
    pub material_cache: ConstantBufferCache<Entity, MaterialConstantBuffer>,
    pub bone_cache: ConstantBufferCache<Entity, BoneConstantBuffer>,
    pub pass_cache: ConstantBufferList<PerPassConstantBuffer>,
    pub emitter_cache: ConstantBufferList<EmitterConstantBuffer>,
    /// Six faces per point light shadow map, indexed by `shadow_map_index * 6 + face`
    pub point_shadow_cache: Vec<PointShadowConstantBuffer>,
    pub per_frame_cache: PerFrameConstantBuffer,
}

impl FrameContext {
    pub fn new(backend: &mut dyn Backend, capacities: FrameCapacities) -> BackendResult<Self> {
        Ok(Self {
            batch_cb: ConstantBuffer::create(backend, capacities.batch)?,
            material_cb: ConstantBuffer::create(backend, capacities.material)?,
            bone_cb: ConstantBuffer::create(backend, capacities.bone)?,
            pass_cb: ConstantBuffer::create(backend, capacities.pass)?,
            emitter_cb: ConstantBuffer::create(backend, capacities.emitter)?,
            point_shadow_cb: ConstantBuffer::create(backend, MAX_POINT_SHADOW_FACE_COUNT)?,
            per_frame_cb: ConstantBuffer::create(backend, 1)?,

            batch_cache: ConstantBufferCache::new(capacities.batch),
            material_cache: ConstantBufferCache::new(capacities.material),
            bone_cache: ConstantBufferCache::new(capacities.bone),
            pass_cache: ConstantBufferList::new(capacities.pass),
            emitter_cache: ConstantBufferList::new(capacities.emitter),
            point_shadow_cache: vec![
                PointShadowConstantBuffer::zeroed();
                MAX_POINT_SHADOW_FACE_COUNT as usize
            ],
            per_frame_cache: PerFrameConstantBuffer::zeroed(),
        })
    }

    /// Reset the fill level of every per-frame cache. GPU buffers are kept.
    pub fn cleanup(&mut self) {
        self.batch_cache.clear();
        self.material_cache.clear();
        self.bone_cache.clear();
        self.pass_cache.clear();
        self.emitter_cache.clear();
    }

    /// Copy every cache into its GPU buffer
    pub fn upload(&self, backend: &mut dyn Backend) {
        self.batch_cb.update(backend, self.batch_cache.buffer());
        self.material_cb.update(backend, self.material_cache.buffer());
        self.bone_cb.update(backend, self.bone_cache.buffer());
        self.pass_cb.update(backend, self.pass_cache.buffer());
        self.emitter_cb.update(backend, self.emitter_cache.buffer());
        self.point_shadow_cb
            .update(backend, &self.point_shadow_cache);
        self.per_frame_cb
            .update(backend, std::slice::from_ref(&self.per_frame_cache));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, BackendKind, RecordingBackend};
    use bevy_ecs::world::World;

    #[test]
    fn test_frame_context_creates_all_buffers() {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let frame = FrameContext::new(&mut backend, FrameCapacities::default()).unwrap();

        let created = backend.count(|call| matches!(call, BackendCall::CreateConstantBuffer { .. }));
        assert_eq!(created, 7);
        assert_eq!(frame.batch_cb.capacity(), 65536);
        assert_eq!(frame.material_cb.capacity(), 32768);
        assert_eq!(frame.bone_cb.capacity(), 16);
        assert_eq!(frame.pass_cb.capacity(), 32);
        assert_eq!(frame.emitter_cb.capacity(), 32);
        assert_eq!(frame.point_shadow_cb.capacity(), 6 * MAX_POINT_LIGHT_SHADOW_COUNT as u32);
        assert_eq!(frame.per_frame_cb.capacity(), 1);
    }

    #[test]
    fn test_cleanup_keeps_gpu_buffers() {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let mut frame = FrameContext::new(&mut backend, FrameCapacities::default()).unwrap();
        let batch_handle = frame.batch_cb.handle();
        let mut world = World::new();
        let entity = world.spawn_empty().id();

        frame.batch_cache.find_or_add(entity, PerBatchConstantBuffer::default());
        frame.pass_cache.push(PerPassConstantBuffer::default());
        backend.take_calls();

        frame.cleanup();

        assert!(frame.batch_cache.is_empty());
        assert!(frame.pass_cache.is_empty());
        assert_eq!(frame.batch_cb.handle(), batch_handle);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_upload_sends_only_filled_elements() {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let mut frame = FrameContext::new(&mut backend, FrameCapacities::default()).unwrap();
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        frame.batch_cache.find_or_add(a, PerBatchConstantBuffer::default());
        frame.batch_cache.find_or_add(b, PerBatchConstantBuffer::default());
        backend.take_calls();

        frame.upload(&mut backend);

        let batch_handle = frame.batch_cb.handle();
        let uploaded = backend.calls().iter().find_map(|call| match call {
            BackendCall::UpdateConstantBuffer { buffer, data } if *buffer == batch_handle => {
                Some(data.len())
            }
            _ => None,
        });
        assert_eq!(
            uploaded,
            Some(2 * std::mem::size_of::<PerBatchConstantBuffer>())
        );
    }
}
