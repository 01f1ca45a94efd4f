//! Render pass definitions for the render graph

use std::fmt;
use std::sync::Arc;

use crate::backend::traits::*;
use crate::draw::DrawData;
use crate::frame::FrameContext;
use crate::render_graph::resource::*;
use crate::RendererConfig;

/// Unique identifier for a render pass, its insertion index in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(pub(crate) u32);

impl PassHandle {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Well known render pass names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderPassName {
    Shadow,
    Gbuffer,
    Lighting,
    Voxelization,
    Bloom,
    Env,
    HighlightSelect,
    Emitter,
    Tone,
    Final,
    PathTracer,
}

impl RenderPassName {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderPassName::Shadow => "SHADOW",
            RenderPassName::Gbuffer => "GBUFFER",
            RenderPassName::Lighting => "LIGHTING",
            RenderPassName::Voxelization => "VOXELIZATION",
            RenderPassName::Bloom => "BLOOM",
            RenderPassName::Env => "ENV",
            RenderPassName::HighlightSelect => "HIGHLIGHT_SELECT",
            RenderPassName::Emitter => "EMITTER",
            RenderPassName::Tone => "TONE",
            RenderPassName::Final => "FINAL",
            RenderPassName::PathTracer => "PATH_TRACER",
        }
    }
}

impl fmt::Display for RenderPassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a draw pass callback may read or issue commands to
pub struct PassExecuteContext<'a> {
    pub backend: &'a mut dyn Backend,
    pub frame: &'a FrameContext,
    pub draw_data: &'a DrawData,
    pub resources: &'a ResourceRegistry,
    pub config: &'a RendererConfig,
}

/// Hook run for one resource when a draw pass starts or ends.
/// Receives the resource and the slot recorded in its transition.
pub type TransitionFn = Box<dyn Fn(&mut dyn Backend, &GpuTexture, u32) + Send + Sync>;

/// Command recording callback of a draw pass
pub type DrawPassExecuteFn =
    Box<dyn Fn(&mut PassExecuteContext<'_>, Option<&Framebuffer>) + Send + Sync>;

/// Custom binding change around a draw pass, typically an unordered access view
pub struct ResourceTransition {
    pub resource: Arc<GpuTexture>,
    pub slot: u32,
    pub begin: Option<TransitionFn>,
    pub end: Option<TransitionFn>,
}

impl ResourceTransition {
    pub fn new(resource: Arc<GpuTexture>, slot: u32) -> Self {
        Self {
            resource,
            slot,
            begin: None,
            end: None,
        }
    }

    pub fn on_begin(
        mut self,
        hook: impl Fn(&mut dyn Backend, &GpuTexture, u32) + Send + Sync + 'static,
    ) -> Self {
        self.begin = Some(Box::new(hook));
        self
    }

    pub fn on_end(
        mut self,
        hook: impl Fn(&mut dyn Backend, &GpuTexture, u32) + Send + Sync + 'static,
    ) -> Self {
        self.end = Some(Box::new(hook));
        self
    }

    /// Bind the resource as an unordered access view for the duration of the draw pass
    pub fn unordered_access(resource: Arc<GpuTexture>, slot: u32) -> Self {
        Self::new(resource, slot)
            .on_begin(|backend, texture, slot| {
                backend.bind_unordered_access_view(slot, texture.handle)
            })
            .on_end(|backend, _, slot| backend.unbind_unordered_access_view(slot))
    }
}

impl fmt::Debug for ResourceTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTransition")
            .field("resource", &self.resource.name)
            .field("slot", &self.slot)
            .field("begin", &self.begin.is_some())
            .field("end", &self.end.is_some())
            .finish()
    }
}

/// A single unit of recorded work inside a render pass
pub struct DrawPass {
    /// Compute-only draw passes have no framebuffer
    pub framebuffer: Option<Framebuffer>,
    pub transitions: Vec<ResourceTransition>,
    pub execute: DrawPassExecuteFn,
}

impl DrawPass {
    pub fn new(
        execute: impl Fn(&mut PassExecuteContext<'_>, Option<&Framebuffer>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            framebuffer: None,
            transitions: Vec::new(),
            execute: Box::new(execute),
        }
    }

    pub fn with_framebuffer(mut self, framebuffer: Framebuffer) -> Self {
        self.framebuffer = Some(framebuffer);
        self
    }

    pub fn with_transition(mut self, transition: ResourceTransition) -> Self {
        self.transitions.push(transition);
        self
    }
}

impl fmt::Debug for DrawPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawPass")
            .field("framebuffer", &self.framebuffer.as_ref().map(|fb| fb.handle))
            .field("transitions", &self.transitions)
            .finish_non_exhaustive()
    }
}

/// Description of a render pass before it is added to a graph
#[derive(Debug)]
pub struct RenderPassDesc {
    pub name: RenderPassName,
    pub dependencies: Vec<RenderPassName>,
    pub draw_passes: Vec<DrawPass>,
}

impl RenderPassDesc {
    pub fn new(name: RenderPassName) -> Self {
        Self {
            name,
            dependencies: Vec::new(),
            draw_passes: Vec::new(),
        }
    }

    pub fn depends_on(mut self, dependency: RenderPassName) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_draw_pass(mut self, draw_pass: DrawPass) -> Self {
        self.draw_passes.push(draw_pass);
        self
    }

    pub fn add_draw_pass(&mut self, draw_pass: DrawPass) {
        self.draw_passes.push(draw_pass);
    }
}

/// A render pass owned by a graph
#[derive(Debug)]
pub struct RenderPass {
    pub handle: PassHandle,
    pub name: RenderPassName,
    pub dependencies: Vec<RenderPassName>,
    pub draw_passes: Vec<DrawPass>,
}
