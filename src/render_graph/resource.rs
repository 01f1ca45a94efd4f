//! Named render targets shared between passes

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::backend::traits::*;
use crate::backend::types::*;

/// Every render target a pipeline can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderTargetName {
    ShadowMap,
    PointShadowMap0,
    PointShadowMap1,
    PointShadowMap2,
    PointShadowMap3,

    GbufferPosition,
    GbufferNormal,
    GbufferBaseColor,
    GbufferMaterial,
    GbufferDepth,

    HighlightSelect,

    EnvSkyboxCubeMap,
    EnvSkyboxDepth,
    EnvDiffuseIrradianceCubeMap,
    EnvDiffuseIrradianceDepth,
    EnvPrefilterCubeMap,
    EnvPrefilterDepth,
    Brdf,

    VoxelAlbedo,
    VoxelNormal,

    Bloom0,
    Bloom1,
    Bloom2,
    Bloom3,
    Bloom4,
    Bloom5,
    Bloom6,

    Lighting,
    PathTracer,
    Tone,
    Final,
}

impl RenderTargetName {
    const POINT_SHADOW_MAPS: [RenderTargetName; 4] = [
        RenderTargetName::PointShadowMap0,
        RenderTargetName::PointShadowMap1,
        RenderTargetName::PointShadowMap2,
        RenderTargetName::PointShadowMap3,
    ];

    const BLOOM_MIPS: [RenderTargetName; 7] = [
        RenderTargetName::Bloom0,
        RenderTargetName::Bloom1,
        RenderTargetName::Bloom2,
        RenderTargetName::Bloom3,
        RenderTargetName::Bloom4,
        RenderTargetName::Bloom5,
        RenderTargetName::Bloom6,
    ];

    /// Cube shadow map of the `index`-th shadow casting point light
    pub fn point_shadow_map(index: usize) -> Option<Self> {
        Self::POINT_SHADOW_MAPS.get(index).copied()
    }

    /// Bloom mip chain target `index`
    pub fn bloom(index: usize) -> Option<Self> {
        Self::BLOOM_MIPS.get(index).copied()
    }

    /// Shader resource slot the target is bound to while it is not being rendered.
    ///
    /// Targets without a slot are only consumed inside their own pass.
    pub fn srv_slot(self) -> Option<u32> {
        use RenderTargetName::*;
        let slot = match self {
            GbufferBaseColor => 0,
            GbufferPosition => 1,
            GbufferNormal => 2,
            GbufferMaterial => 3,
            GbufferDepth => 4,
            ShadowMap => 5,
            PointShadowMap0 => 6,
            PointShadowMap1 => 7,
            PointShadowMap2 => 8,
            PointShadowMap3 => 9,
            HighlightSelect => 10,
            EnvSkyboxCubeMap => 11,
            EnvDiffuseIrradianceCubeMap => 12,
            EnvPrefilterCubeMap => 13,
            Brdf => 14,
            Lighting => 15,
            Bloom0 => 16,
            Tone => 17,
            VoxelAlbedo => 18,
            VoxelNormal => 19,
            PathTracer => 20,
            EnvSkyboxDepth | EnvDiffuseIrradianceDepth | EnvPrefilterDepth => return None,
            Bloom1 | Bloom2 | Bloom3 | Bloom4 | Bloom5 | Bloom6 => return None,
            Final => return None,
        };
        Some(slot)
    }

    pub fn as_str(self) -> &'static str {
        use RenderTargetName::*;
        match self {
            ShadowMap => "SHADOW_MAP",
            PointShadowMap0 => "POINT_SHADOW_MAP_0",
            PointShadowMap1 => "POINT_SHADOW_MAP_1",
            PointShadowMap2 => "POINT_SHADOW_MAP_2",
            PointShadowMap3 => "POINT_SHADOW_MAP_3",
            GbufferPosition => "GBUFFER_POSITION",
            GbufferNormal => "GBUFFER_NORMAL",
            GbufferBaseColor => "GBUFFER_BASE_COLOR",
            GbufferMaterial => "GBUFFER_MATERIAL",
            GbufferDepth => "GBUFFER_DEPTH",
            HighlightSelect => "HIGHLIGHT_SELECT",
            EnvSkyboxCubeMap => "ENV_SKYBOX_CUBE_MAP",
            EnvSkyboxDepth => "ENV_SKYBOX_DEPTH",
            EnvDiffuseIrradianceCubeMap => "ENV_DIFFUSE_IRRADIANCE_CUBE_MAP",
            EnvDiffuseIrradianceDepth => "ENV_DIFFUSE_IRRADIANCE_DEPTH",
            EnvPrefilterCubeMap => "ENV_PREFILTER_CUBE_MAP",
            EnvPrefilterDepth => "ENV_PREFILTER_DEPTH",
            Brdf => "BRDF",
            VoxelAlbedo => "VOXEL_ALBEDO",
            VoxelNormal => "VOXEL_NORMAL",
            Bloom0 => "BLOOM_0",
            Bloom1 => "BLOOM_1",
            Bloom2 => "BLOOM_2",
            Bloom3 => "BLOOM_3",
            Bloom4 => "BLOOM_4",
            Bloom5 => "BLOOM_5",
            Bloom6 => "BLOOM_6",
            Lighting => "LIGHTING",
            PathTracer => "PATH_TRACER",
            Tone => "TONE",
            Final => "FINAL",
        }
    }
}

impl fmt::Display for RenderTargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A render target allocated on the backend
#[derive(Debug, Clone, PartialEq)]
pub struct GpuTexture {
    pub name: RenderTargetName,
    pub handle: TextureHandle,
    pub desc: TextureDescriptor,
    /// Shader resource slot, see [`RenderTargetName::srv_slot`]
    pub slot: Option<u32>,
}

impl GpuTexture {
    pub fn dimension(&self) -> TextureDimension {
        self.desc.dimension
    }
}

/// Attachments a draw pass renders into
#[derive(Debug, Clone)]
pub struct Framebuffer {
    pub handle: FramebufferHandle,
    pub color_attachments: Vec<Arc<GpuTexture>>,
    pub depth_attachment: Option<Arc<GpuTexture>>,
}

impl Framebuffer {
    /// Color attachments followed by the depth attachment
    pub fn outputs(&self) -> impl Iterator<Item = &Arc<GpuTexture>> {
        self.color_attachments
            .iter()
            .chain(self.depth_attachment.iter())
    }

    /// Size of the first attachment
    pub fn extent(&self) -> (u32, u32) {
        self.outputs()
            .next()
            .map(|texture| (texture.desc.width, texture.desc.height))
            .unwrap_or((0, 0))
    }
}

/// Owner of all named render targets.
///
/// Targets are created once while the pipeline is built and live as long as
/// the renderer.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    textures: HashMap<RenderTargetName, Arc<GpuTexture>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a named render target.
    ///
    /// # Panics
    ///
    /// Panics if a target with the same name was already created.
    pub fn create_texture(
        &mut self,
        backend: &mut dyn Backend,
        name: RenderTargetName,
        desc: TextureDescriptor,
        sampler: SamplerDescriptor,
    ) -> BackendResult<Arc<GpuTexture>> {
        assert!(
            !self.textures.contains_key(&name),
            "render target {} already exists",
            name
        );

        let handle = backend.create_texture(&desc, sampler)?;
        let texture = Arc::new(GpuTexture {
            name,
            handle,
            desc,
            slot: name.srv_slot(),
        });
        log::debug!(
            "Created render target {} ({}x{}, {:?})",
            name,
            texture.desc.width,
            texture.desc.height,
            texture.desc.format
        );
        self.textures.insert(name, texture.clone());
        Ok(texture)
    }

    pub fn find_texture(&self, name: RenderTargetName) -> Option<Arc<GpuTexture>> {
        self.textures.get(&name).cloned()
    }

    /// # Panics
    ///
    /// Panics if the target was never created.
    pub fn texture(&self, name: RenderTargetName) -> Arc<GpuTexture> {
        match self.textures.get(&name) {
            Some(texture) => texture.clone(),
            None => panic!("render target {} was never created", name),
        }
    }

    pub fn contains(&self, name: RenderTargetName) -> bool {
        self.textures.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Create a framebuffer from already registered targets
    pub fn create_framebuffer(
        &self,
        backend: &mut dyn Backend,
        color_attachments: &[RenderTargetName],
        depth_attachment: Option<RenderTargetName>,
    ) -> BackendResult<Framebuffer> {
        let colors: Vec<Arc<GpuTexture>> = color_attachments
            .iter()
            .map(|&name| self.texture(name))
            .collect();
        let depth = depth_attachment.map(|name| self.texture(name));

        let color_handles: Vec<TextureHandle> = colors.iter().map(|t| t.handle).collect();
        let handle = backend.create_framebuffer(&color_handles, depth.as_ref().map(|t| t.handle))?;

        Ok(Framebuffer {
            handle,
            color_attachments: colors,
            depth_attachment: depth,
        })
    }
}
