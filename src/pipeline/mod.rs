//! Render pipelines
//!
//! A pipeline is a render graph topology built in code. Every topology is
//! assembled by a [`RenderPassCreator`], which creates the render targets a
//! pass writes, wires its draw passes and declares its dependencies:
//!
//! - **Dummy**: G-buffer only, for backends without the full shader set
//! - **Default**: environment, shadows, G-buffer, selection highlight,
//!   deferred lighting, particles, bloom, tone mapping and the final blit
//! - **Experimental**: Default plus voxel cone tracing global illumination
//! - **PathTracer**: compute path tracer followed by tone mapping

mod env_pass;
mod gbuffer_pass;
mod lighting_pass;
mod path_tracer_pass;
pub mod postprocess;
mod shadow_pass;
mod voxelization_pass;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::draw::BatchContext;
use crate::render_graph::*;
use crate::renderer::RendererError;
use crate::resources::MeshData;
use crate::{ConfigError, RendererConfig};

/// Material texture slots
pub const BASE_COLOR_MAP_SLOT: u32 = 24;
pub const NORMAL_MAP_SLOT: u32 = 25;
pub const MATERIAL_MAP_SLOT: u32 = 26;

/// Unordered access view slots
pub const BLOOM_OUTPUT_UAV_SLOT: u32 = 0;
pub const VOXEL_ALBEDO_UAV_SLOT: u32 = 1;
pub const VOXEL_NORMAL_UAV_SLOT: u32 = 2;
pub const PATH_TRACER_UAV_SLOT: u32 = 3;

/// Structured buffer slots of the particle simulation
pub const PARTICLE_COUNTER_SLOT: u32 = 0;
pub const PARTICLE_DEAD_LIST_SLOT: u32 = 1;
pub const PARTICLE_ALIVE_PRE_SIM_SLOT: u32 = 2;
pub const PARTICLE_ALIVE_POST_SIM_SLOT: u32 = 3;
pub const PARTICLE_DATA_SLOT: u32 = 4;
pub const PARTICLE_INDIRECT_ARGS_SLOT: u32 = 5;

/// Threads per group of the 2D compute passes
pub const COMPUTE_TILE_SIZE: u32 = 16;

/// Which set of passes the renderer builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderGraphTopology {
    Dummy,
    #[default]
    Default,
    Experimental,
    PathTracer,
}

impl RenderGraphTopology {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderGraphTopology::Dummy => "dummy",
            RenderGraphTopology::Default => "default",
            RenderGraphTopology::Experimental => "experimental",
            RenderGraphTopology::PathTracer => "pathtracer",
        }
    }
}

impl fmt::Display for RenderGraphTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderGraphTopology {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dummy" => Ok(RenderGraphTopology::Dummy),
            "default" => Ok(RenderGraphTopology::Default),
            "experimental" | "vxgi" => Ok(RenderGraphTopology::Experimental),
            "pathtracer" | "path_tracer" => Ok(RenderGraphTopology::PathTracer),
            _ => Err(ConfigError::UnknownTopology(s.to_string())),
        }
    }
}

/// Pick the topology actually built for `requested` on a backend of `kind`.
///
/// Backends without the full shader set always run the dummy graph. The path
/// tracer exists on OpenGL and D3D11 only.
pub fn select_topology(
    kind: BackendKind,
    requested: RenderGraphTopology,
) -> Result<RenderGraphTopology, ConfigError> {
    match kind {
        BackendKind::Vulkan | BackendKind::Empty | BackendKind::Metal => {
            if requested != RenderGraphTopology::Dummy {
                log::info!("{} backend only supports the dummy render graph", kind);
            }
            Ok(RenderGraphTopology::Dummy)
        }
        BackendKind::OpenGl => Ok(requested),
        BackendKind::D3d11 | BackendKind::D3d12 => match requested {
            RenderGraphTopology::Experimental => {
                log::warn!(
                    "Experimental render graph requires OpenGL, falling back to default on {}",
                    kind
                );
                Ok(RenderGraphTopology::Default)
            }
            RenderGraphTopology::PathTracer if kind == BackendKind::D3d12 => {
                Err(ConfigError::UnsupportedTopology {
                    topology: requested,
                    backend: kind,
                })
            }
            _ => Ok(requested),
        },
    }
}

/// Render target holding the presented image of a topology
pub fn final_image(topology: RenderGraphTopology) -> RenderTargetName {
    match topology {
        RenderGraphTopology::Dummy => RenderTargetName::GbufferBaseColor,
        RenderGraphTopology::Default => RenderTargetName::Tone,
        RenderGraphTopology::Experimental => RenderTargetName::Final,
        RenderGraphTopology::PathTracer => RenderTargetName::PathTracer,
    }
}

/// Create the render targets and passes of `topology`, then compile the graph
pub fn build_render_graph(
    topology: RenderGraphTopology,
    config: &RendererConfig,
    backend: &mut dyn Backend,
    resources: &mut ResourceRegistry,
) -> Result<RenderGraph, RendererError> {
    let mut creator = RenderPassCreator::new(config, backend, resources)?;

    match topology {
        RenderGraphTopology::Dummy => {
            creator.add_gbuffer_pass()?;
        }
        RenderGraphTopology::Default | RenderGraphTopology::Experimental => {
            let experimental = topology == RenderGraphTopology::Experimental;

            creator.add_env_pass()?;
            creator.add_shadow_pass()?;
            creator.add_gbuffer_pass()?;
            creator.add_highlight_select_pass()?;
            if experimental {
                creator.add_voxelization_pass()?;
            }
            creator.add_lighting_pass(experimental && config.enable_vxgi)?;
            creator.add_emitter_pass()?;
            let tone_input = if config.enable_bloom {
                creator.add_bloom_pass()?;
                RenderPassName::Bloom
            } else {
                RenderPassName::Lighting
            };
            creator.add_tone_pass(tone_input)?;
            creator.add_final_pass()?;
        }
        RenderGraphTopology::PathTracer => {
            creator.add_path_tracer_pass()?;
            creator.add_tone_pass(RenderPassName::PathTracer)?;
        }
    }

    let graph = creator.finish()?;
    log::info!(
        "Built {} render graph with {} passes",
        topology,
        graph.passes().len()
    );
    Ok(graph)
}

/// Builder shared by every topology
pub struct RenderPassCreator<'a> {
    config: &'a RendererConfig,
    backend: &'a mut dyn Backend,
    resources: &'a mut ResourceRegistry,
    graph: RenderGraph,
    /// Fullscreen quad drawn by screen space passes
    quad: MeshHandle,
    /// Unit cube used as skybox geometry
    cube: MeshHandle,
}

impl<'a> RenderPassCreator<'a> {
    pub fn new(
        config: &'a RendererConfig,
        backend: &'a mut dyn Backend,
        resources: &'a mut ResourceRegistry,
    ) -> BackendResult<Self> {
        let quad = MeshData::screen_quad();
        let quad = backend.create_mesh(&quad.vertices, &quad.indices)?;
        let cube = MeshData::cube();
        let cube = backend.create_mesh(&cube.vertices, &cube.indices)?;

        Ok(Self {
            config,
            backend,
            resources,
            graph: RenderGraph::new(),
            quad,
            cube,
        })
    }

    fn create_render_target(
        &mut self,
        name: RenderTargetName,
        desc: TextureDescriptor,
        sampler: SamplerDescriptor,
    ) -> BackendResult<Arc<GpuTexture>> {
        self.resources
            .create_texture(&mut *self.backend, name, desc, sampler)
    }

    /// Screen sized 2D target
    fn create_screen_target(
        &mut self,
        name: RenderTargetName,
        format: TextureFormat,
        sampler: SamplerDescriptor,
    ) -> BackendResult<Arc<GpuTexture>> {
        let desc = TextureDescriptor::render_target(
            name.as_str(),
            self.config.width,
            self.config.height,
            format,
        );
        self.create_render_target(name, desc, sampler)
    }

    fn framebuffer(
        &mut self,
        color_attachments: &[RenderTargetName],
        depth_attachment: Option<RenderTargetName>,
    ) -> BackendResult<Framebuffer> {
        self.resources
            .create_framebuffer(&mut *self.backend, color_attachments, depth_attachment)
    }

    fn add_pass(&mut self, desc: RenderPassDesc) -> Result<(), RendererError> {
        log::debug!(
            "Adding render pass {} ({} draw passes, depends on {:?})",
            desc.name,
            desc.draw_passes.len(),
            desc.dependencies
        );
        self.graph.create_pass(desc)?;
        Ok(())
    }

    /// Compile the graph built so far
    pub fn finish(mut self) -> Result<RenderGraph, RendererError> {
        self.graph.compile()?;
        Ok(self.graph)
    }
}

/// Viewport covering the first attachment of a framebuffer
pub(crate) fn full_viewport(framebuffer: Option<&Framebuffer>) -> Viewport {
    let (width, height) = framebuffer.map_or((0, 0), Framebuffer::extent);
    Viewport::new(width, height)
}

/// Bind every existing render target in `names` at its shader resource slot.
/// Returns what was bound so it can be undone with [`unbind_inputs`].
pub(crate) fn bind_inputs(
    backend: &mut dyn Backend,
    resources: &ResourceRegistry,
    names: &[RenderTargetName],
) -> Vec<(TextureDimension, u32)> {
    let mut bound = Vec::with_capacity(names.len());
    for &name in names {
        let Some(texture) = resources.find_texture(name) else {
            continue;
        };
        let Some(slot) = texture.slot else {
            continue;
        };
        backend.bind_texture(texture.dimension(), texture.handle, slot);
        bound.push((texture.dimension(), slot));
    }
    bound
}

pub(crate) fn unbind_inputs(backend: &mut dyn Backend, bound: &[(TextureDimension, u32)]) {
    for &(dimension, slot) in bound {
        backend.unbind_texture(dimension, slot);
    }
}

/// Bind the per-batch state shared by every geometry pass
pub(crate) fn bind_batch(
    ctx: &mut PassExecuteContext<'_>,
    batch: &BatchContext,
    static_state: PipelineStateName,
    animated_state: PipelineStateName,
) {
    match batch.bone_idx {
        Some(bone_idx) => {
            ctx.frame.bone_cb.bind(ctx.backend, bone_idx);
            ctx.backend.set_pipeline_state(animated_state);
        }
        None => ctx.backend.set_pipeline_state(static_state),
    }
    ctx.frame.batch_cb.bind(ctx.backend, batch.batch_idx);
    ctx.backend.set_mesh(batch.mesh);
}

/// Bind a material payload and the textures it references
pub(crate) fn bind_material(ctx: &mut PassExecuteContext<'_>, material_idx: u32) {
    ctx.frame.material_cb.bind(ctx.backend, material_idx);

    let Some(material) = ctx.frame.material_cache.buffer().get(material_idx as usize) else {
        return;
    };
    let maps = [
        (material.has_base_color_map, material.base_color_map_handle, BASE_COLOR_MAP_SLOT),
        (material.has_normal_map, material.normal_map_handle, NORMAL_MAP_SLOT),
        (material.has_material_map, material.material_map_handle, MATERIAL_MAP_SLOT),
    ];
    for (enabled, handle, slot) in maps {
        if enabled != 0 {
            ctx.backend
                .bind_texture(TextureDimension::Texture2D, TextureHandle(handle), slot);
        }
    }
}

pub(crate) fn draw_quad(backend: &mut dyn Backend, quad: MeshHandle) {
    backend.set_mesh(quad);
    backend.draw_elements(6, 0);
}

pub(crate) fn dispatch_size(extent: u32) -> u32 {
    extent.div_ceil(COMPUTE_TILE_SIZE).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, RecordingBackend};
    use rstest::rstest;
    use RenderPassName::*;

    fn build(topology: RenderGraphTopology, config: &RendererConfig) -> (RenderGraph, ResourceRegistry) {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let mut resources = ResourceRegistry::new();
        let graph = build_render_graph(topology, config, &mut backend, &mut resources).unwrap();
        (graph, resources)
    }

    fn position(order: &[RenderPassName], name: RenderPassName) -> usize {
        order
            .iter()
            .position(|&n| n == name)
            .unwrap_or_else(|| panic!("{} missing from {:?}", name, order))
    }

    #[rstest]
    #[case("dummy", RenderGraphTopology::Dummy)]
    #[case("default", RenderGraphTopology::Default)]
    #[case("Experimental", RenderGraphTopology::Experimental)]
    #[case("vxgi", RenderGraphTopology::Experimental)]
    #[case("pathtracer", RenderGraphTopology::PathTracer)]
    fn test_parse_topology(#[case] input: &str, #[case] expected: RenderGraphTopology) {
        assert_eq!(input.parse::<RenderGraphTopology>(), Ok(expected));
    }

    #[test]
    fn test_parse_unknown_topology() {
        assert_eq!(
            "forward".parse::<RenderGraphTopology>(),
            Err(ConfigError::UnknownTopology("forward".to_string()))
        );
    }

    #[rstest]
    #[case(BackendKind::OpenGl, RenderGraphTopology::Experimental, RenderGraphTopology::Experimental)]
    #[case(BackendKind::D3d11, RenderGraphTopology::Experimental, RenderGraphTopology::Default)]
    #[case(BackendKind::D3d12, RenderGraphTopology::Experimental, RenderGraphTopology::Default)]
    #[case(BackendKind::D3d11, RenderGraphTopology::PathTracer, RenderGraphTopology::PathTracer)]
    #[case(BackendKind::Metal, RenderGraphTopology::Default, RenderGraphTopology::Dummy)]
    #[case(BackendKind::Vulkan, RenderGraphTopology::Default, RenderGraphTopology::Dummy)]
    #[case(BackendKind::Empty, RenderGraphTopology::Experimental, RenderGraphTopology::Dummy)]
    fn test_select_topology(
        #[case] kind: BackendKind,
        #[case] requested: RenderGraphTopology,
        #[case] expected: RenderGraphTopology,
    ) {
        assert_eq!(select_topology(kind, requested), Ok(expected));
    }

    #[test]
    fn test_path_tracer_is_unsupported_on_d3d12() {
        assert_eq!(
            select_topology(BackendKind::D3d12, RenderGraphTopology::PathTracer),
            Err(ConfigError::UnsupportedTopology {
                topology: RenderGraphTopology::PathTracer,
                backend: BackendKind::D3d12,
            })
        );
    }

    #[rstest]
    #[case(RenderGraphTopology::Dummy)]
    #[case(RenderGraphTopology::Default)]
    #[case(RenderGraphTopology::Experimental)]
    #[case(RenderGraphTopology::PathTracer)]
    fn test_final_image_exists(#[case] topology: RenderGraphTopology) {
        let (graph, resources) = build(topology, &RendererConfig::default());
        assert!(graph.is_compiled());
        assert!(resources.contains(final_image(topology)));
    }

    #[rstest]
    #[case(RenderGraphTopology::Default)]
    #[case(RenderGraphTopology::Experimental)]
    #[case(RenderGraphTopology::PathTracer)]
    fn test_every_pass_follows_its_dependencies(#[case] topology: RenderGraphTopology) {
        let config = RendererConfig {
            enable_vxgi: true,
            ..Default::default()
        };
        let (graph, _) = build(topology, &config);
        let order = graph.sorted_names();

        for pass in graph.passes() {
            for &dependency in &pass.dependencies {
                assert!(position(&order, dependency) < position(&order, pass.name));
            }
        }
    }

    #[test]
    fn test_dummy_topology() {
        let (graph, _) = build(RenderGraphTopology::Dummy, &RendererConfig::default());
        assert_eq!(graph.sorted_names(), vec![Gbuffer]);
    }

    #[test]
    fn test_default_topology_order() {
        let (graph, _) = build(RenderGraphTopology::Default, &RendererConfig::default());
        assert_eq!(
            graph.sorted_names(),
            vec![Env, Shadow, Gbuffer, HighlightSelect, Lighting, Emitter, Bloom, Tone, Final]
        );
    }

    #[test]
    fn test_default_topology_dependencies() {
        let (graph, _) = build(RenderGraphTopology::Default, &RendererConfig::default());
        let lighting = graph.find_pass(Lighting).and_then(|h| graph.get_pass(h)).unwrap();
        assert_eq!(lighting.dependencies, vec![Gbuffer, Shadow, Env]);

        let tone = graph.find_pass(Tone).and_then(|h| graph.get_pass(h)).unwrap();
        assert_eq!(tone.dependencies, vec![Bloom]);
    }

    #[test]
    fn test_experimental_lighting_waits_for_voxels() {
        let config = RendererConfig {
            enable_vxgi: true,
            ..Default::default()
        };
        let (graph, resources) = build(RenderGraphTopology::Experimental, &config);
        let order = graph.sorted_names();

        assert!(position(&order, Shadow) < position(&order, Voxelization));
        assert!(position(&order, Voxelization) < position(&order, Lighting));
        assert!(resources.contains(RenderTargetName::VoxelAlbedo));
    }

    #[test]
    fn test_disabled_features_drop_dependencies() {
        let config = RendererConfig {
            enable_shadow: false,
            enable_ibl: false,
            enable_bloom: false,
            runtime: true,
            ..Default::default()
        };
        let (graph, resources) = build(RenderGraphTopology::Default, &config);

        assert_eq!(graph.find_pass(Bloom), None);
        assert_eq!(graph.find_pass(Final), None);
        let lighting = graph.find_pass(Lighting).and_then(|h| graph.get_pass(h)).unwrap();
        assert_eq!(lighting.dependencies, vec![Gbuffer]);
        let tone = graph.find_pass(Tone).and_then(|h| graph.get_pass(h)).unwrap();
        assert_eq!(tone.dependencies, vec![Lighting]);
        assert!(!resources.contains(RenderTargetName::Bloom0));
    }

    #[test]
    fn test_path_tracer_topology() {
        let (graph, resources) = build(RenderGraphTopology::PathTracer, &RendererConfig::default());
        assert_eq!(graph.sorted_names(), vec![PathTracer, Tone]);
        assert!(!resources.contains(RenderTargetName::GbufferDepth));
    }

    #[test]
    fn test_bloom_chain_layout() {
        let (graph, resources) = build(RenderGraphTopology::Default, &RendererConfig::default());
        let bloom = graph.find_pass(Bloom).and_then(|h| graph.get_pass(h)).unwrap();

        assert_eq!(bloom.draw_passes.len(), 1 + 2 * (postprocess::BLOOM_MIP_CHAIN_MAX - 1));
        for draw_pass in &bloom.draw_passes {
            assert_eq!(draw_pass.transitions.len(), 1);
            assert_eq!(draw_pass.transitions[0].slot, BLOOM_OUTPUT_UAV_SLOT);
        }

        let sizes: Vec<u32> = (0..postprocess::BLOOM_MIP_CHAIN_MAX)
            .filter_map(RenderTargetName::bloom)
            .map(|name| resources.texture(name).desc.width)
            .collect();
        assert_eq!(sizes, vec![640, 320, 160, 80, 40, 20, 10]);
    }

    #[test]
    fn test_build_uploads_shared_meshes() {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let mut resources = ResourceRegistry::new();
        build_render_graph(
            RenderGraphTopology::Dummy,
            &RendererConfig::default(),
            &mut backend,
            &mut resources,
        )
        .unwrap();

        assert_eq!(
            backend.count(|call| matches!(call, BackendCall::CreateMesh { .. })),
            2
        );
    }
}
