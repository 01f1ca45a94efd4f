//! Tone mapping and the final blit

use crate::backend::types::*;
use crate::pipeline::*;

/// Images composed by tone mapping. Missing ones are skipped.
const TONE_INPUTS: [RenderTargetName; 4] = [
    RenderTargetName::Lighting,
    RenderTargetName::Bloom0,
    RenderTargetName::HighlightSelect,
    RenderTargetName::PathTracer,
];

impl RenderPassCreator<'_> {
    /// Map the HDR image produced by `input` to display range
    pub(crate) fn add_tone_pass(&mut self, input: RenderPassName) -> Result<(), RendererError> {
        self.create_screen_target(
            RenderTargetName::Tone,
            TextureFormat::Rgba8Unorm,
            SamplerDescriptor::Linear,
        )?;
        let depth = self
            .resources
            .contains(RenderTargetName::GbufferDepth)
            .then_some(RenderTargetName::GbufferDepth);
        let framebuffer = self.framebuffer(&[RenderTargetName::Tone], depth)?;

        let quad = self.quad;
        let draw_pass = DrawPass::new(move |ctx, framebuffer| {
            let Some(framebuffer) = framebuffer else {
                return;
            };
            ctx.backend.set_render_target(framebuffer.handle, 0, 0);
            ctx.backend.set_viewport(full_viewport(Some(framebuffer)));
            ctx.backend
                .clear(framebuffer.handle, ClearFlags::COLOR, [0.0; 4], 0);

            let bound = bind_inputs(ctx.backend, ctx.resources, &TONE_INPUTS);
            ctx.backend.set_pipeline_state(PipelineStateName::Tone);
            draw_quad(ctx.backend, quad);
            unbind_inputs(ctx.backend, &bound);
        })
        .with_framebuffer(framebuffer);

        self.add_pass(
            RenderPassDesc::new(RenderPassName::Tone)
                .depends_on(input)
                .with_draw_pass(draw_pass),
        )
    }

    /// Copy of the tone mapped image for presentation. The target always
    /// exists, the copy is skipped when running inside an editor runtime.
    pub(crate) fn add_final_pass(&mut self) -> Result<(), RendererError> {
        self.create_screen_target(
            RenderTargetName::Final,
            TextureFormat::Rgba8Unorm,
            SamplerDescriptor::Linear,
        )?;
        if self.config.runtime {
            return Ok(());
        }
        let framebuffer = self.framebuffer(&[RenderTargetName::Final], None)?;

        let quad = self.quad;
        let draw_pass = DrawPass::new(move |ctx, framebuffer| {
            let Some(framebuffer) = framebuffer else {
                return;
            };
            ctx.backend.set_render_target(framebuffer.handle, 0, 0);
            ctx.backend.set_viewport(full_viewport(Some(framebuffer)));
            ctx.backend
                .clear(framebuffer.handle, ClearFlags::COLOR, [0.0; 4], 0);

            let bound = bind_inputs(ctx.backend, ctx.resources, &[RenderTargetName::Tone]);
            ctx.backend.set_pipeline_state(PipelineStateName::Image2D);
            draw_quad(ctx.backend, quad);
            unbind_inputs(ctx.backend, &bound);
        })
        .with_framebuffer(framebuffer);

        self.add_pass(
            RenderPassDesc::new(RenderPassName::Final)
                .depends_on(RenderPassName::Tone)
                .with_draw_pass(draw_pass),
        )
    }
}
