//! Deferred lighting and GPU particles
//!
//! Lighting resolves the G-buffer with a fullscreen quad into the HDR
//! `LIGHTING` target. Particle emitters are then simulated with compute
//! shaders and drawn on top of it, depth tested against the G-buffer.

use crate::backend::types::*;
use crate::pipeline::*;

/// Threads per group of the particle emit and simulation shaders
pub const PARTICLE_LOCAL_SIZE: u32 = 32;

/// Optional lighting inputs, bound only when the pipeline created them
const LIGHTING_INPUTS: [RenderTargetName; 10] = [
    RenderTargetName::ShadowMap,
    RenderTargetName::PointShadowMap0,
    RenderTargetName::PointShadowMap1,
    RenderTargetName::PointShadowMap2,
    RenderTargetName::PointShadowMap3,
    RenderTargetName::EnvDiffuseIrradianceCubeMap,
    RenderTargetName::EnvPrefilterCubeMap,
    RenderTargetName::Brdf,
    RenderTargetName::VoxelAlbedo,
    RenderTargetName::VoxelNormal,
];

impl RenderPassCreator<'_> {
    pub(crate) fn add_lighting_pass(&mut self, use_voxels: bool) -> Result<(), RendererError> {
        self.create_screen_target(
            RenderTargetName::Lighting,
            TextureFormat::Rgba16Float,
            SamplerDescriptor::Linear,
        )?;
        let framebuffer = self.framebuffer(&[RenderTargetName::Lighting], None)?;

        let quad = self.quad;
        let draw_pass = DrawPass::new(move |ctx, framebuffer| {
            let Some(framebuffer) = framebuffer else {
                return;
            };
            ctx.backend.set_render_target(framebuffer.handle, 0, 0);
            ctx.backend.set_viewport(full_viewport(Some(framebuffer)));
            ctx.backend
                .clear(framebuffer.handle, ClearFlags::COLOR, [0.0; 4], 0);

            let bound = bind_inputs(ctx.backend, ctx.resources, &LIGHTING_INPUTS);
            ctx.backend.set_pipeline_state(PipelineStateName::Lighting);
            draw_quad(ctx.backend, quad);
            unbind_inputs(ctx.backend, &bound);
        })
        .with_framebuffer(framebuffer);

        let mut desc = RenderPassDesc::new(RenderPassName::Lighting)
            .depends_on(RenderPassName::Gbuffer)
            .with_draw_pass(draw_pass);
        if self.config.enable_shadow {
            desc = desc.depends_on(RenderPassName::Shadow);
        }
        if use_voxels {
            desc = desc.depends_on(RenderPassName::Voxelization);
        }
        if self.config.enable_ibl {
            desc = desc.depends_on(RenderPassName::Env);
        }
        self.add_pass(desc)
    }

    /// Particle simulation and rendering into the lit image
    pub(crate) fn add_emitter_pass(&mut self) -> Result<(), RendererError> {
        let framebuffer = self.framebuffer(
            &[RenderTargetName::Lighting],
            Some(RenderTargetName::GbufferDepth),
        )?;

        let quad = self.quad;
        let draw_pass = DrawPass::new(move |ctx, framebuffer| {
            let Some(framebuffer) = framebuffer else {
                return;
            };
            if ctx.draw_data.emitters.is_empty() {
                return;
            }
            ctx.backend.set_render_target(framebuffer.handle, 0, 0);
            ctx.backend.set_viewport(full_viewport(Some(framebuffer)));

            for emitter in &ctx.draw_data.emitters {
                let buffers = [
                    (PARTICLE_COUNTER_SLOT, emitter.buffers.counters),
                    (PARTICLE_DEAD_LIST_SLOT, emitter.buffers.dead_list),
                    (PARTICLE_ALIVE_PRE_SIM_SLOT, emitter.alive_pre_sim()),
                    (PARTICLE_ALIVE_POST_SIM_SLOT, emitter.alive_post_sim()),
                    (PARTICLE_DATA_SLOT, emitter.buffers.particles),
                    (PARTICLE_INDIRECT_ARGS_SLOT, emitter.buffers.indirect_args),
                ];

                ctx.frame.emitter_cb.bind(ctx.backend, emitter.emitter_idx);
                for (slot, buffer) in buffers {
                    ctx.backend.bind_structured_buffer(slot, buffer);
                }

                let groups = emitter.max_particle_count.div_ceil(PARTICLE_LOCAL_SIZE).max(1);
                ctx.backend
                    .set_pipeline_state(PipelineStateName::ParticleKickoff);
                ctx.backend.dispatch(1, 1, 1);
                ctx.backend.set_pipeline_state(PipelineStateName::ParticleEmit);
                ctx.backend.dispatch(groups, 1, 1);
                ctx.backend.set_pipeline_state(PipelineStateName::ParticleSim);
                ctx.backend.dispatch(groups, 1, 1);

                ctx.backend
                    .set_pipeline_state(PipelineStateName::ParticleRendering);
                ctx.backend.set_mesh(quad);
                ctx.backend
                    .draw_elements_instanced(emitter.max_particle_count, 6, 0);

                for (slot, _) in buffers {
                    ctx.backend.unbind_structured_buffer(slot);
                }
            }
        })
        .with_framebuffer(framebuffer);

        self.add_pass(
            RenderPassDesc::new(RenderPassName::Emitter)
                .depends_on(RenderPassName::Lighting)
                .with_draw_pass(draw_pass),
        )
    }
}
