//! Core backend abstraction traits
//!
//! The render graph, frame caches and pass callbacks only ever talk to a
//! `&mut dyn Backend`, never to a concrete implementation.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create framebuffer: {0}")]
    FramebufferCreationFailed(String),
    #[error("Failed to create mesh: {0}")]
    MeshCreationFailed(String),
    #[error("Failed to present: {0}")]
    PresentFailed(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

impl TextureHandle {
    /// Raw value passed to shaders for bindless access
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Handle to a framebuffer (a set of attachments)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub(crate) u64);

/// Handle to uploaded mesh geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) u64);

/// Native API family of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// No GPU at all
    Empty,
    OpenGl,
    D3d11,
    D3d12,
    Vulkan,
    Metal,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Empty => "empty",
            BackendKind::OpenGl => "opengl",
            BackendKind::D3d11 => "d3d11",
            BackendKind::D3d12 => "d3d12",
            BackendKind::Vulkan => "vulkan",
            BackendKind::Metal => "metal",
        };
        f.write_str(name)
    }
}

/// Main graphics backend trait
///
/// A stateful command interface: render targets, pipeline states and
/// bindings stay set until changed.
pub trait Backend {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Native API family
    fn kind(&self) -> BackendKind;

    /// Number of frames the CPU may record ahead of the GPU.
    ///
    /// Backends without explicit frame management return 1.
    fn frames_in_flight(&self) -> usize {
        1
    }

    // Resource creation

    /// Create a texture
    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        sampler: SamplerDescriptor,
    ) -> BackendResult<TextureHandle>;

    /// Write pixel data to mip 0 of a texture
    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]);

    /// Create a framebuffer from existing textures
    fn create_framebuffer(
        &mut self,
        color_attachments: &[TextureHandle],
        depth_attachment: Option<TextureHandle>,
    ) -> BackendResult<FramebufferHandle>;

    /// Create a constant buffer holding `desc.element_count` elements
    fn create_constant_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    /// Create a structured (read/write) buffer
    fn create_structured_buffer(&mut self, desc: &BufferDescriptor)
        -> BackendResult<BufferHandle>;

    /// Release a constant or structured buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Upload mesh geometry
    fn create_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> BackendResult<MeshHandle>;

    // Binding

    fn bind_texture(&mut self, dimension: TextureDimension, texture: TextureHandle, slot: u32);

    fn unbind_texture(&mut self, dimension: TextureDimension, slot: u32);

    /// Bind element `index` of a constant buffer to shader register `slot`
    fn bind_constant_buffer_slot(&mut self, buffer: BufferHandle, slot: u32, index: u32);

    /// Replace the contents of a constant buffer
    fn update_constant_buffer(&mut self, buffer: BufferHandle, data: &[u8]);

    fn bind_structured_buffer(&mut self, slot: u32, buffer: BufferHandle);

    fn unbind_structured_buffer(&mut self, slot: u32);

    fn bind_unordered_access_view(&mut self, slot: u32, texture: TextureHandle);

    fn unbind_unordered_access_view(&mut self, slot: u32);

    // Render state

    /// Set the render target. `index` selects an array layer or cube face.
    fn set_render_target(&mut self, framebuffer: FramebufferHandle, index: u32, mip: u32);

    fn unset_render_target(&mut self);

    fn clear(
        &mut self,
        framebuffer: FramebufferHandle,
        flags: ClearFlags,
        clear_color: [f32; 4],
        index: u32,
    );

    fn set_viewport(&mut self, viewport: Viewport);

    fn set_pipeline_state(&mut self, name: PipelineStateName);

    fn set_stencil_ref(&mut self, reference: u32);

    fn set_mesh(&mut self, mesh: MeshHandle);

    // Work submission

    fn draw_elements(&mut self, count: u32, offset: u32);

    fn draw_elements_instanced(&mut self, instance_count: u32, count: u32, offset: u32);

    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    fn generate_mipmap(&mut self, texture: TextureHandle);

    // Frame

    fn begin_frame(&mut self) {}

    fn end_frame(&mut self) {}

    /// Present the finished frame
    fn present(&mut self) -> BackendResult<()>;
}
