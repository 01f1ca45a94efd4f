//! Image based lighting maps
//!
//! The skybox is rendered into a cube map, convolved into a diffuse
//! irradiance map and a roughness prefiltered specular map, and the BRDF
//! integration lookup table is generated. All of it only runs on frames
//! where [`DrawData::env_pass_idx`](crate::draw::DrawData::env_pass_idx) is
//! set, the maps are kept otherwise.

use crate::backend::types::*;
use crate::pipeline::*;

pub const BRDF_LUT_SIZE: u32 = 512;
pub const SKYBOX_CUBE_MAP_SIZE: u32 = 512;
pub const IRRADIANCE_CUBE_MAP_SIZE: u32 = 32;
pub const PREFILTER_CUBE_MAP_SIZE: u32 = 512;
pub const PREFILTER_MIP_LEVELS: u32 = 5;

const CUBE_FACE_COUNT: u32 = 6;
const CUBE_INDEX_COUNT: u32 = 36;

impl RenderPassCreator<'_> {
    fn create_cube_target(
        &mut self,
        color: RenderTargetName,
        depth: RenderTargetName,
        size: u32,
        mip_levels: u32,
    ) -> Result<Framebuffer, RendererError> {
        let mut desc =
            TextureDescriptor::render_target(color.as_str(), size, size, TextureFormat::Rgba16Float)
                .with_dimension(TextureDimension::TextureCube)
                .with_array_size(CUBE_FACE_COUNT)
                .with_mip_levels(mip_levels);
        if mip_levels > 1 {
            desc = desc.with_usage(TextureUsage::GENERATE_MIPS);
        }
        let sampler = if mip_levels > 1 {
            SamplerDescriptor::Mipmapped
        } else {
            SamplerDescriptor::Linear
        };
        self.create_render_target(color, desc, sampler)?;

        let depth_desc =
            TextureDescriptor::render_target(depth.as_str(), size, size, TextureFormat::Depth32Float)
                .with_dimension(TextureDimension::TextureCube)
                .with_array_size(CUBE_FACE_COUNT);
        self.create_render_target(depth, depth_desc, SamplerDescriptor::Point)?;

        Ok(self.framebuffer(&[color], Some(depth))?)
    }

    pub(crate) fn add_env_pass(&mut self) -> Result<(), RendererError> {
        let quad = self.quad;
        let cube = self.cube;
        let mut desc = RenderPassDesc::new(RenderPassName::Env);

        // BRDF integration lookup table
        let brdf = TextureDescriptor::render_target(
            RenderTargetName::Brdf.as_str(),
            BRDF_LUT_SIZE,
            BRDF_LUT_SIZE,
            TextureFormat::Rg16Float,
        );
        self.create_render_target(RenderTargetName::Brdf, brdf, SamplerDescriptor::Linear)?;
        let framebuffer = self.framebuffer(&[RenderTargetName::Brdf], None)?;
        desc.add_draw_pass(
            DrawPass::new(move |ctx, framebuffer| {
                let (Some(framebuffer), Some(_)) = (framebuffer, ctx.draw_data.env_pass_idx) else {
                    return;
                };
                ctx.backend.set_render_target(framebuffer.handle, 0, 0);
                ctx.backend.set_viewport(full_viewport(Some(framebuffer)));
                ctx.backend
                    .clear(framebuffer.handle, ClearFlags::COLOR, [0.0; 4], 0);
                ctx.backend.set_pipeline_state(PipelineStateName::Brdf);
                draw_quad(ctx.backend, quad);
            })
            .with_framebuffer(framebuffer),
        );

        // Skybox to cube map
        let mip_levels = SKYBOX_CUBE_MAP_SIZE.ilog2() + 1;
        let framebuffer = self.create_cube_target(
            RenderTargetName::EnvSkyboxCubeMap,
            RenderTargetName::EnvSkyboxDepth,
            SKYBOX_CUBE_MAP_SIZE,
            mip_levels,
        )?;
        desc.add_draw_pass(
            DrawPass::new(move |ctx, framebuffer| {
                let (Some(framebuffer), Some(env_pass_idx)) =
                    (framebuffer, ctx.draw_data.env_pass_idx)
                else {
                    return;
                };
                ctx.backend.set_viewport(full_viewport(Some(framebuffer)));
                ctx.backend
                    .set_pipeline_state(PipelineStateName::EnvSkyboxToCubeMap);
                render_cube_faces(ctx, framebuffer, env_pass_idx, cube, 0);

                // Mips are sampled by the convolution passes below
                ctx.backend.unset_render_target();
                for texture in &framebuffer.color_attachments {
                    ctx.backend.generate_mipmap(texture.handle);
                }
            })
            .with_framebuffer(framebuffer),
        );

        // Diffuse irradiance
        let framebuffer = self.create_cube_target(
            RenderTargetName::EnvDiffuseIrradianceCubeMap,
            RenderTargetName::EnvDiffuseIrradianceDepth,
            IRRADIANCE_CUBE_MAP_SIZE,
            1,
        )?;
        desc.add_draw_pass(
            DrawPass::new(move |ctx, framebuffer| {
                let (Some(framebuffer), Some(env_pass_idx)) =
                    (framebuffer, ctx.draw_data.env_pass_idx)
                else {
                    return;
                };
                ctx.backend.set_viewport(full_viewport(Some(framebuffer)));
                ctx.backend
                    .set_pipeline_state(PipelineStateName::DiffuseIrradiance);
                render_cube_faces(ctx, framebuffer, env_pass_idx, cube, 0);
            })
            .with_framebuffer(framebuffer),
        );

        // Specular prefilter, one roughness level per mip
        let framebuffer = self.create_cube_target(
            RenderTargetName::EnvPrefilterCubeMap,
            RenderTargetName::EnvPrefilterDepth,
            PREFILTER_CUBE_MAP_SIZE,
            PREFILTER_MIP_LEVELS,
        )?;
        desc.add_draw_pass(
            DrawPass::new(move |ctx, framebuffer| {
                let (Some(framebuffer), Some(env_pass_idx)) =
                    (framebuffer, ctx.draw_data.env_pass_idx)
                else {
                    return;
                };
                ctx.backend.set_pipeline_state(PipelineStateName::Prefilter);
                for mip in 0..PREFILTER_MIP_LEVELS {
                    let size = (PREFILTER_CUBE_MAP_SIZE >> mip).max(1);
                    ctx.backend.set_viewport(Viewport::new(size, size));
                    render_cube_faces(ctx, framebuffer, env_pass_idx, cube, mip);
                }
            })
            .with_framebuffer(framebuffer),
        );

        self.add_pass(desc)
    }
}

/// Draw the cube once per face, with the face's view in pass constants
fn render_cube_faces(
    ctx: &mut PassExecuteContext<'_>,
    framebuffer: &Framebuffer,
    env_pass_idx: u32,
    cube: MeshHandle,
    mip: u32,
) {
    for face in 0..CUBE_FACE_COUNT {
        ctx.frame.pass_cb.bind(ctx.backend, env_pass_idx + face);
        ctx.backend.set_render_target(framebuffer.handle, face, mip);
        ctx.backend
            .clear(framebuffer.handle, ClearFlags::ALL, [0.0; 4], face);
        ctx.backend.set_mesh(cube);
        ctx.backend.draw_elements(CUBE_INDEX_COUNT, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::PREFILTER_MIP_LEVELS;
    use crate::backend::{BackendCall, BackendKind, RecordingBackend};
    use crate::draw::DrawData;
    use crate::frame::{FrameCapacities, FrameContext};
    use crate::pipeline::*;

    fn run_env(env_pass_idx: Option<u32>) -> Vec<BackendCall> {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let mut resources = ResourceRegistry::new();
        let config = RendererConfig::default();
        let mut creator = RenderPassCreator::new(&config, &mut backend, &mut resources).unwrap();
        creator.add_env_pass().unwrap();
        let graph = creator.finish().unwrap();

        let frame = FrameContext::new(&mut backend, FrameCapacities::default()).unwrap();
        let draw_data = DrawData {
            env_pass_idx,
            ..Default::default()
        };
        backend.take_calls();

        graph.execute(&mut PassExecuteContext {
            backend: &mut backend,
            frame: &frame,
            draw_data: &draw_data,
            resources: &resources,
            config: &config,
        });
        backend.take_calls()
    }

    #[test]
    fn test_env_maps_skip_without_pass_constants() {
        let calls = run_env(None);
        assert!(!calls.iter().any(|call| matches!(
            call,
            BackendCall::DrawElements { .. } | BackendCall::GenerateMipmap(_)
        )));
    }

    #[test]
    fn test_env_maps_render_every_face() {
        let calls = run_env(Some(2));

        let draws = calls
            .iter()
            .filter(|call| matches!(call, BackendCall::DrawElements { .. }))
            .count();
        // BRDF quad, skybox and irradiance faces, prefilter faces per mip
        assert_eq!(draws, 1 + 6 + 6 + 6 * PREFILTER_MIP_LEVELS as usize);

        let prefilter_targets: Vec<(u32, u32)> = calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetRenderTarget { index, mip, .. } if *mip > 0 => Some((*index, *mip)),
                _ => None,
            })
            .collect();
        assert_eq!(prefilter_targets.len(), 6 * (PREFILTER_MIP_LEVELS as usize - 1));
        assert_eq!(prefilter_targets[0], (0, 1));
        assert_eq!(calls.iter().filter(|c| matches!(c, BackendCall::GenerateMipmap(_))).count(), 1);
    }
}
