//! Bloom post-processing effect
//!
//! Bright parts of the lit image are extracted into `BLOOM_0`, blurred down a
//! mip chain of half-sized targets and accumulated back up into `BLOOM_0`.
//! Every step is a compute dispatch writing its output as an unordered access
//! view.

use std::sync::Arc;

use crate::backend::types::*;
use crate::pipeline::*;

/// Number of targets in the bloom chain, including `BLOOM_0`
pub const BLOOM_MIP_CHAIN_MAX: usize = 7;

/// Slot the previous step of the chain is read from
pub const BLOOM_INPUT_SLOT: u32 = 27;

fn bloom_step(
    state: PipelineStateName,
    input: Option<Arc<GpuTexture>>,
    output: Arc<GpuTexture>,
) -> DrawPass {
    let (width, height) = (output.desc.width, output.desc.height);
    DrawPass::new(move |ctx, _| {
        if let Some(input) = &input {
            ctx.backend
                .bind_texture(input.dimension(), input.handle, BLOOM_INPUT_SLOT);
        }
        ctx.backend.set_pipeline_state(state);
        ctx.backend
            .dispatch(dispatch_size(width), dispatch_size(height), 1);
        if let Some(input) = &input {
            ctx.backend.unbind_texture(input.dimension(), BLOOM_INPUT_SLOT);
        }
    })
    .with_transition(ResourceTransition::unordered_access(
        output,
        BLOOM_OUTPUT_UAV_SLOT,
    ))
}

impl RenderPassCreator<'_> {
    pub(crate) fn add_bloom_pass(&mut self) -> Result<(), RendererError> {
        let mut chain = Vec::with_capacity(BLOOM_MIP_CHAIN_MAX);
        for (index, name) in (0..BLOOM_MIP_CHAIN_MAX)
            .filter_map(|index| RenderTargetName::bloom(index).map(|name| (index, name)))
        {
            let shift = index as u32 + 1;
            let desc = TextureDescriptor::render_target(
                name.as_str(),
                (self.config.width >> shift).max(1),
                (self.config.height >> shift).max(1),
                TextureFormat::Rgba16Float,
            )
            .with_usage(TextureUsage::UNORDERED_ACCESS);
            chain.push(self.create_render_target(name, desc, SamplerDescriptor::Linear)?);
        }

        // Threshold, reading the lit image from its own slot
        let mut desc = RenderPassDesc::new(RenderPassName::Bloom)
            .depends_on(RenderPassName::Lighting)
            .with_draw_pass(bloom_step(
                PipelineStateName::BloomSetup,
                None,
                chain[0].clone(),
            ));

        for index in 1..chain.len() {
            desc.add_draw_pass(bloom_step(
                PipelineStateName::BloomDownsample,
                Some(chain[index - 1].clone()),
                chain[index].clone(),
            ));
        }
        for index in (0..chain.len() - 1).rev() {
            desc.add_draw_pass(bloom_step(
                PipelineStateName::BloomUpsample,
                Some(chain[index + 1].clone()),
                chain[index].clone(),
            ));
        }

        self.add_pass(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, BackendKind, RecordingBackend};
    use crate::draw::DrawData;
    use crate::frame::{FrameCapacities, FrameContext};

    #[test]
    fn test_bloom_walks_down_then_up() {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let mut resources = ResourceRegistry::new();
        let config = RendererConfig {
            width: 256,
            height: 128,
            ..Default::default()
        };
        let mut creator = RenderPassCreator::new(&config, &mut backend, &mut resources).unwrap();
        creator.add_gbuffer_pass().unwrap();
        creator.add_shadow_pass().unwrap();
        creator.add_env_pass().unwrap();
        creator.add_lighting_pass(false).unwrap();
        creator.add_bloom_pass().unwrap();
        let graph = creator.finish().unwrap();

        let frame = FrameContext::new(&mut backend, FrameCapacities::default()).unwrap();
        let draw_data = DrawData::default();
        backend.take_calls();
        graph.execute(&mut PassExecuteContext {
            backend: &mut backend,
            frame: &frame,
            draw_data: &draw_data,
            resources: &resources,
            config: &config,
        });

        let bloom_handles: Vec<TextureHandle> = (0..BLOOM_MIP_CHAIN_MAX)
            .filter_map(RenderTargetName::bloom)
            .map(|name| resources.texture(name).handle)
            .collect();
        let outputs: Vec<usize> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::BindUnorderedAccessView { texture, .. } => {
                    bloom_handles.iter().position(|handle| handle == texture)
                }
                _ => None,
            })
            .collect();
        assert_eq!(outputs, vec![0, 1, 2, 3, 4, 5, 6, 5, 4, 3, 2, 1, 0]);

        let dispatches: Vec<(u32, u32)> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::Dispatch { x, y, .. } => Some((*x, *y)),
                _ => None,
            })
            .collect();
        // 128x64 setup target, 2x1 at the bottom of the chain
        assert_eq!(dispatches[0], (8, 4));
        assert_eq!(dispatches[6], (1, 1));
        assert_eq!(
            backend.count(|call| matches!(call, BackendCall::UnbindUnorderedAccessView { .. })),
            13
        );
    }
}
