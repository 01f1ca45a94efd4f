//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations but hands out valid
//! handles, so the full frame flow can run without GPU hardware.

use crate::backend::traits::*;
use crate::backend::types::*;

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    next_handle: u64,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self { next_handle: 1 }
    }

    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for DummyBackend {
    fn name(&self) -> &str {
        "Dummy Backend"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Empty
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        _sampler: SamplerDescriptor,
    ) -> BackendResult<TextureHandle> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.width,
            desc.height,
            desc.depth
        );
        Ok(TextureHandle(self.allocate()))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) {
        log::trace!("DummyBackend: writing {} bytes to {:?}", data.len(), texture);
    }

    fn create_framebuffer(
        &mut self,
        color_attachments: &[TextureHandle],
        depth_attachment: Option<TextureHandle>,
    ) -> BackendResult<FramebufferHandle> {
        log::trace!(
            "DummyBackend: creating framebuffer ({} color, depth: {})",
            color_attachments.len(),
            depth_attachment.is_some()
        );
        Ok(FramebufferHandle(self.allocate()))
    }

    fn create_constant_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating constant buffer {:?} (size: {})",
            desc.label,
            desc.size()
        );
        Ok(BufferHandle(self.allocate()))
    }

    fn create_structured_buffer(
        &mut self,
        desc: &BufferDescriptor,
    ) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating structured buffer {:?} (size: {})",
            desc.label,
            desc.size()
        );
        Ok(BufferHandle(self.allocate()))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        log::trace!("DummyBackend: destroying buffer {:?}", buffer);
    }

    fn create_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> BackendResult<MeshHandle> {
        log::trace!(
            "DummyBackend: creating mesh ({} vertices, {} indices)",
            vertices.len(),
            indices.len()
        );
        Ok(MeshHandle(self.allocate()))
    }

    fn bind_texture(&mut self, _dimension: TextureDimension, _texture: TextureHandle, _slot: u32) {}

    fn unbind_texture(&mut self, _dimension: TextureDimension, _slot: u32) {}

    fn bind_constant_buffer_slot(&mut self, _buffer: BufferHandle, _slot: u32, _index: u32) {}

    fn update_constant_buffer(&mut self, _buffer: BufferHandle, _data: &[u8]) {}

    fn bind_structured_buffer(&mut self, _slot: u32, _buffer: BufferHandle) {}

    fn unbind_structured_buffer(&mut self, _slot: u32) {}

    fn bind_unordered_access_view(&mut self, _slot: u32, _texture: TextureHandle) {}

    fn unbind_unordered_access_view(&mut self, _slot: u32) {}

    fn set_render_target(&mut self, _framebuffer: FramebufferHandle, _index: u32, _mip: u32) {}

    fn unset_render_target(&mut self) {}

    fn clear(
        &mut self,
        _framebuffer: FramebufferHandle,
        _flags: ClearFlags,
        _clear_color: [f32; 4],
        _index: u32,
    ) {
    }

    fn set_viewport(&mut self, _viewport: Viewport) {}

    fn set_pipeline_state(&mut self, _name: PipelineStateName) {}

    fn set_stencil_ref(&mut self, _reference: u32) {}

    fn set_mesh(&mut self, _mesh: MeshHandle) {}

    fn draw_elements(&mut self, _count: u32, _offset: u32) {}

    fn draw_elements_instanced(&mut self, _instance_count: u32, _count: u32, _offset: u32) {}

    fn dispatch(&mut self, _x: u32, _y: u32, _z: u32) {}

    fn generate_mipmap(&mut self, _texture: TextureHandle) {}

    fn present(&mut self) -> BackendResult<()> {
        log::trace!("DummyBackend: present");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_backend_hands_out_unique_handles() {
        let mut backend = DummyBackend::new();
        let a = backend
            .create_texture(&TextureDescriptor::default(), SamplerDescriptor::Linear)
            .unwrap();
        let b = backend
            .create_texture(&TextureDescriptor::default(), SamplerDescriptor::Linear)
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(backend.kind(), BackendKind::Empty);
        assert_eq!(backend.frames_in_flight(), 1);
    }
}
