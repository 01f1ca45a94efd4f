//! Render Scheduler - A render graph scheduler with per-frame constant buffer deduplication
//!
//! Each frame the renderer decides which GPU passes run and in what order,
//! which resources are bound around them, and which draw payloads are
//! uploaded, exactly once each.
//!
//! # Features
//! - Render graph with dependency ordered passes, compiled once at startup
//! - Deferred pipeline with shadows, image based lighting, particles, bloom
//!   and tone mapping, plus voxel GI and path tracing topologies
//! - Per-frame constant buffer caches keyed by entity (first writer wins)
//! - Multi-buffered frame state for backends with several frames in flight
//! - Entity Component System (ECS) based scenes using Bevy ECS
//! - Background image decoding delivered to the render thread
//!
//! ```no_run
//! use render_scheduler::{DummyBackend, Renderer, RendererConfig, RenderGraphTopology, Scene};
//!
//! let config = RendererConfig {
//!     topology: RenderGraphTopology::Dummy,
//!     ..Default::default()
//! };
//! let mut renderer = Renderer::new(DummyBackend::new(), config).unwrap();
//! renderer.update(&Scene::new()).unwrap();
//! ```

pub mod backend;
pub mod draw;
pub mod frame;
pub mod pipeline;
pub mod render_graph;
pub mod renderer;
pub mod resources;
pub mod scene;

use thiserror::Error;

// Re-export Bevy ECS prelude for users
pub use bevy_ecs::prelude::*;

pub use backend::{Backend, BackendError, BackendKind, DummyBackend, RecordingBackend};
pub use pipeline::RenderGraphTopology;
pub use render_graph::{GraphError, RenderGraph, RenderPassName, RenderTargetName};
pub use renderer::{Renderer, RendererError, RendererResult};
pub use scene::Scene;

/// Invalid render graph selection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The {topology} render graph is not supported on the {backend} backend")]
    UnsupportedTopology {
        topology: RenderGraphTopology,
        backend: BackendKind,
    },
    #[error("Unknown render graph topology '{0}', expected dummy, default, experimental or pathtracer")]
    UnknownTopology(String),
}

/// Configuration for initializing the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Size of the screen sized render targets
    pub width: u32,
    pub height: u32,
    /// Requested topology, see [`pipeline::select_topology`]
    pub topology: RenderGraphTopology,
    pub enable_shadow: bool,
    /// Voxel cone traced GI, only built by the experimental topology
    pub enable_vxgi: bool,
    /// Image based lighting from the environment maps
    pub enable_ibl: bool,
    pub enable_bloom: bool,
    /// Luminance above which pixels feed the bloom chain
    pub bloom_threshold: f32,
    /// Embedded in an editor that presents `TONE` itself; the final blit is skipped
    pub runtime: bool,
    pub shadow_map_resolution: u32,
    pub point_shadow_resolution: u32,
    /// Voxels per side of the GI volume
    pub voxel_texture_size: u32,
    /// Voxel to visualize instead of the lit image
    pub debug_voxel_id: Option<i32>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            topology: RenderGraphTopology::Default,
            enable_shadow: true,
            enable_vxgi: false,
            enable_ibl: true,
            enable_bloom: true,
            bloom_threshold: 1.3,
            runtime: false,
            shadow_map_resolution: 2048,
            point_shadow_resolution: 512,
            voxel_texture_size: 64,
            debug_voxel_id: None,
        }
    }
}
