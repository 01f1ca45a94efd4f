//! G-buffer generation and selection highlight
//!
//! Renders geometry to multiple render targets (MRT):
//! - World-space position
//! - World-space normals
//! - Base color
//! - Material properties (metallic, roughness, emissive)
//! - Depth with the object flags written to stencil

use crate::backend::types::*;
use crate::frame::STENCIL_FLAG_SELECTED;
use crate::pipeline::*;

impl RenderPassCreator<'_> {
    pub(crate) fn add_gbuffer_pass(&mut self) -> Result<(), RendererError> {
        let targets = [
            (RenderTargetName::GbufferPosition, TextureFormat::Rgba32Float),
            (RenderTargetName::GbufferNormal, TextureFormat::Rgba16Float),
            (RenderTargetName::GbufferBaseColor, TextureFormat::Rgba8Unorm),
            (RenderTargetName::GbufferMaterial, TextureFormat::Rgba8Unorm),
        ];
        for (name, format) in targets {
            self.create_screen_target(name, format, SamplerDescriptor::Point)?;
        }
        self.create_screen_target(
            RenderTargetName::GbufferDepth,
            TextureFormat::Depth24PlusStencil8,
            SamplerDescriptor::Point,
        )?;

        let colors: Vec<RenderTargetName> = targets.iter().map(|(name, _)| *name).collect();
        let framebuffer = self.framebuffer(&colors, Some(RenderTargetName::GbufferDepth))?;

        let draw_pass = DrawPass::new(|ctx, framebuffer| {
            let Some(framebuffer) = framebuffer else {
                return;
            };
            ctx.backend.set_render_target(framebuffer.handle, 0, 0);
            ctx.backend.set_viewport(full_viewport(Some(framebuffer)));
            ctx.backend
                .clear(framebuffer.handle, ClearFlags::ALL, [0.0; 4], 0);

            let draw_data = ctx.draw_data;
            let Some(main_pass) = &draw_data.main_pass else {
                return;
            };
            if let Some(pass_idx) = main_pass.pass_idx {
                ctx.frame.pass_cb.bind(ctx.backend, pass_idx);
            }

            for batch in &main_pass.draws {
                bind_batch(
                    ctx,
                    batch,
                    PipelineStateName::GbufferStatic,
                    PipelineStateName::GbufferAnimated,
                );
                ctx.backend.set_stencil_ref(batch.flags);

                for subset in &batch.subsets {
                    bind_material(ctx, subset.material_idx);
                    ctx.backend
                        .draw_elements(subset.index_count, subset.index_offset);
                }
            }
        })
        .with_framebuffer(framebuffer);

        self.add_pass(RenderPassDesc::new(RenderPassName::Gbuffer).with_draw_pass(draw_pass))
    }

    /// Outline of the selected object, masked by its stencil flag
    pub(crate) fn add_highlight_select_pass(&mut self) -> Result<(), RendererError> {
        self.create_screen_target(
            RenderTargetName::HighlightSelect,
            TextureFormat::Rgba8Unorm,
            SamplerDescriptor::Linear,
        )?;
        let framebuffer = self.framebuffer(
            &[RenderTargetName::HighlightSelect],
            Some(RenderTargetName::GbufferDepth),
        )?;

        let quad = self.quad;
        let draw_pass = DrawPass::new(move |ctx, framebuffer| {
            let Some(framebuffer) = framebuffer else {
                return;
            };
            ctx.backend.set_render_target(framebuffer.handle, 0, 0);
            ctx.backend.set_viewport(full_viewport(Some(framebuffer)));
            ctx.backend
                .clear(framebuffer.handle, ClearFlags::COLOR, [0.0; 4], 0);

            ctx.backend
                .set_pipeline_state(PipelineStateName::HighlightSelect);
            ctx.backend.set_stencil_ref(STENCIL_FLAG_SELECTED);
            draw_quad(ctx.backend, quad);
        })
        .with_framebuffer(framebuffer);

        self.add_pass(
            RenderPassDesc::new(RenderPassName::HighlightSelect)
                .depends_on(RenderPassName::Gbuffer)
                .with_draw_pass(draw_pass),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::{BackendCall, BackendKind, RecordingBackend};
    use crate::pipeline::*;

    #[test]
    fn test_gbuffer_targets_and_slots() {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let mut resources = ResourceRegistry::new();
        let config = RendererConfig::default();
        let mut creator = RenderPassCreator::new(&config, &mut backend, &mut resources).unwrap();
        creator.add_gbuffer_pass().unwrap();
        let graph = creator.finish().unwrap();

        let pass = graph.get_pass(graph.sorted_order()[0]).unwrap();
        let framebuffer = pass.draw_passes[0].framebuffer.as_ref().unwrap();
        assert_eq!(framebuffer.color_attachments.len(), 4);
        assert_eq!(framebuffer.extent(), (1280, 720));

        let slots: Vec<Option<u32>> = framebuffer.outputs().map(|t| t.slot).collect();
        assert_eq!(slots, vec![Some(1), Some(2), Some(0), Some(3), Some(4)]);
        assert_eq!(resources.len(), 5);
        assert_eq!(
            backend.count(|call| matches!(call, BackendCall::CreateFramebuffer { .. })),
            1
        );
    }
}
