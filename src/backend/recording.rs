//! Backend that records every call instead of talking to a GPU.
//!
//! Used by the integration tests and the headless demo to observe what the
//! render graph issues each frame.

use crate::backend::traits::*;
use crate::backend::types::*;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateTexture { handle: TextureHandle, label: Option<String> },
    WriteTexture { texture: TextureHandle, len: usize },
    CreateFramebuffer { handle: FramebufferHandle },
    CreateConstantBuffer { handle: BufferHandle, element_count: u32 },
    CreateStructuredBuffer { handle: BufferHandle, element_count: u32 },
    DestroyBuffer(BufferHandle),
    CreateMesh { handle: MeshHandle, index_count: usize },
    BindTexture { dimension: TextureDimension, texture: TextureHandle, slot: u32 },
    UnbindTexture { dimension: TextureDimension, slot: u32 },
    BindConstantBufferSlot { buffer: BufferHandle, slot: u32, index: u32 },
    UpdateConstantBuffer { buffer: BufferHandle, data: Vec<u8> },
    BindStructuredBuffer { slot: u32, buffer: BufferHandle },
    UnbindStructuredBuffer { slot: u32 },
    BindUnorderedAccessView { slot: u32, texture: TextureHandle },
    UnbindUnorderedAccessView { slot: u32 },
    SetRenderTarget { framebuffer: FramebufferHandle, index: u32, mip: u32 },
    UnsetRenderTarget,
    Clear { framebuffer: FramebufferHandle, flags: ClearFlags, index: u32 },
    SetViewport(Viewport),
    SetPipelineState(PipelineStateName),
    SetStencilRef(u32),
    SetMesh(MeshHandle),
    DrawElements { count: u32, offset: u32 },
    DrawElementsInstanced { instance_count: u32, count: u32, offset: u32 },
    Dispatch { x: u32, y: u32, z: u32 },
    GenerateMipmap(TextureHandle),
    BeginFrame,
    EndFrame,
    Present,
}

/// Backend recording calls in order
#[derive(Debug)]
pub struct RecordingBackend {
    kind: BackendKind,
    frames_in_flight: usize,
    next_handle: u64,
    calls: Vec<BackendCall>,
    fail_present: bool,
}

impl RecordingBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            frames_in_flight: 1,
            next_handle: 1,
            calls: Vec::new(),
            fail_present: false,
        }
    }

    /// Report `count` frames in flight, like a D3D12 swap chain would
    pub fn with_frames_in_flight(mut self, count: usize) -> Self {
        self.frames_in_flight = count;
        self
    }

    /// Make every following `present` fail with `DeviceLost`
    pub fn set_fail_present(&mut self, fail: bool) {
        self.fail_present = fail;
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Drain the recorded calls
    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Count recorded calls matching a predicate
    pub fn count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn draw_call_count(&self) -> usize {
        self.count(|call| {
            matches!(
                call,
                BackendCall::DrawElements { .. } | BackendCall::DrawElementsInstanced { .. }
            )
        })
    }

    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn record(&mut self, call: BackendCall) {
        log::trace!("RecordingBackend: {:?}", call);
        self.calls.push(call);
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new(BackendKind::OpenGl)
    }
}

impl Backend for RecordingBackend {
    fn name(&self) -> &str {
        "Recording Backend"
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        _sampler: SamplerDescriptor,
    ) -> BackendResult<TextureHandle> {
        let handle = TextureHandle(self.allocate());
        self.record(BackendCall::CreateTexture {
            handle,
            label: desc.label.clone(),
        });
        Ok(handle)
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) {
        self.record(BackendCall::WriteTexture {
            texture,
            len: data.len(),
        });
    }

    fn create_framebuffer(
        &mut self,
        _color_attachments: &[TextureHandle],
        _depth_attachment: Option<TextureHandle>,
    ) -> BackendResult<FramebufferHandle> {
        let handle = FramebufferHandle(self.allocate());
        self.record(BackendCall::CreateFramebuffer { handle });
        Ok(handle)
    }

    fn create_constant_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let handle = BufferHandle(self.allocate());
        self.record(BackendCall::CreateConstantBuffer {
            handle,
            element_count: desc.element_count,
        });
        Ok(handle)
    }

    fn create_structured_buffer(
        &mut self,
        desc: &BufferDescriptor,
    ) -> BackendResult<BufferHandle> {
        let handle = BufferHandle(self.allocate());
        self.record(BackendCall::CreateStructuredBuffer {
            handle,
            element_count: desc.element_count,
        });
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.record(BackendCall::DestroyBuffer(buffer));
    }

    fn create_mesh(&mut self, _vertices: &[Vertex], indices: &[u32]) -> BackendResult<MeshHandle> {
        let handle = MeshHandle(self.allocate());
        self.record(BackendCall::CreateMesh {
            handle,
            index_count: indices.len(),
        });
        Ok(handle)
    }

    fn bind_texture(&mut self, dimension: TextureDimension, texture: TextureHandle, slot: u32) {
        self.record(BackendCall::BindTexture {
            dimension,
            texture,
            slot,
        });
    }

    fn unbind_texture(&mut self, dimension: TextureDimension, slot: u32) {
        self.record(BackendCall::UnbindTexture { dimension, slot });
    }

    fn bind_constant_buffer_slot(&mut self, buffer: BufferHandle, slot: u32, index: u32) {
        self.record(BackendCall::BindConstantBufferSlot {
            buffer,
            slot,
            index,
        });
    }

    fn update_constant_buffer(&mut self, buffer: BufferHandle, data: &[u8]) {
        self.record(BackendCall::UpdateConstantBuffer {
            buffer,
            data: data.to_vec(),
        });
    }

    fn bind_structured_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        self.record(BackendCall::BindStructuredBuffer { slot, buffer });
    }

    fn unbind_structured_buffer(&mut self, slot: u32) {
        self.record(BackendCall::UnbindStructuredBuffer { slot });
    }

    fn bind_unordered_access_view(&mut self, slot: u32, texture: TextureHandle) {
        self.record(BackendCall::BindUnorderedAccessView { slot, texture });
    }

    fn unbind_unordered_access_view(&mut self, slot: u32) {
        self.record(BackendCall::UnbindUnorderedAccessView { slot });
    }

    fn set_render_target(&mut self, framebuffer: FramebufferHandle, index: u32, mip: u32) {
        self.record(BackendCall::SetRenderTarget {
            framebuffer,
            index,
            mip,
        });
    }

    fn unset_render_target(&mut self) {
        self.record(BackendCall::UnsetRenderTarget);
    }

    fn clear(
        &mut self,
        framebuffer: FramebufferHandle,
        flags: ClearFlags,
        _clear_color: [f32; 4],
        index: u32,
    ) {
        self.record(BackendCall::Clear {
            framebuffer,
            flags,
            index,
        });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(BackendCall::SetViewport(viewport));
    }

    fn set_pipeline_state(&mut self, name: PipelineStateName) {
        self.record(BackendCall::SetPipelineState(name));
    }

    fn set_stencil_ref(&mut self, reference: u32) {
        self.record(BackendCall::SetStencilRef(reference));
    }

    fn set_mesh(&mut self, mesh: MeshHandle) {
        self.record(BackendCall::SetMesh(mesh));
    }

    fn draw_elements(&mut self, count: u32, offset: u32) {
        self.record(BackendCall::DrawElements { count, offset });
    }

    fn draw_elements_instanced(&mut self, instance_count: u32, count: u32, offset: u32) {
        self.record(BackendCall::DrawElementsInstanced {
            instance_count,
            count,
            offset,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(BackendCall::Dispatch { x, y, z });
    }

    fn generate_mipmap(&mut self, texture: TextureHandle) {
        self.record(BackendCall::GenerateMipmap(texture));
    }

    fn begin_frame(&mut self) {
        self.record(BackendCall::BeginFrame);
    }

    fn end_frame(&mut self) {
        self.record(BackendCall::EndFrame);
    }

    fn present(&mut self) -> BackendResult<()> {
        self.record(BackendCall::Present);
        if self.fail_present {
            return Err(BackendError::DeviceLost);
        }
        Ok(())
    }
}
