//! Compute path tracer

use crate::backend::types::*;
use crate::pipeline::*;

impl RenderPassCreator<'_> {
    /// Trace the main camera view into the `PATH_TRACER` accumulation target
    pub(crate) fn add_path_tracer_pass(&mut self) -> Result<(), RendererError> {
        let desc = TextureDescriptor::render_target(
            RenderTargetName::PathTracer.as_str(),
            self.config.width,
            self.config.height,
            TextureFormat::Rgba32Float,
        )
        .with_usage(TextureUsage::UNORDERED_ACCESS);
        let output = self.create_render_target(
            RenderTargetName::PathTracer,
            desc,
            SamplerDescriptor::Point,
        )?;
        let (width, height) = (output.desc.width, output.desc.height);

        let draw_pass = DrawPass::new(move |ctx, _| {
            let draw_data = ctx.draw_data;
            if let Some(pass_idx) = draw_data.main_pass.as_ref().and_then(|pass| pass.pass_idx) {
                ctx.frame.pass_cb.bind(ctx.backend, pass_idx);
            }
            ctx.backend.set_pipeline_state(PipelineStateName::PathTracer);
            ctx.backend
                .dispatch(dispatch_size(width), dispatch_size(height), 1);
        })
        .with_transition(ResourceTransition::unordered_access(
            output,
            PATH_TRACER_UAV_SLOT,
        ));

        self.add_pass(RenderPassDesc::new(RenderPassName::PathTracer).with_draw_pass(draw_pass))
    }
}
