//! Directional and point light shadow maps

use crate::backend::types::*;
use crate::draw::PassContext;
use crate::frame::MAX_POINT_LIGHT_SHADOW_COUNT;
use crate::pipeline::*;

const CUBE_FACE_COUNT: u32 = 6;

impl RenderPassCreator<'_> {
    /// One draw pass for the directional shadow map, then one per point light
    /// cube map. Each cube face is rendered with its own constant buffer entry.
    pub(crate) fn add_shadow_pass(&mut self) -> Result<(), RendererError> {
        let size = self.config.shadow_map_resolution;
        let desc = TextureDescriptor::render_target(
            RenderTargetName::ShadowMap.as_str(),
            size,
            size,
            TextureFormat::Depth32Float,
        );
        self.create_render_target(RenderTargetName::ShadowMap, desc, SamplerDescriptor::Shadow)?;

        let framebuffer = self.framebuffer(&[], Some(RenderTargetName::ShadowMap))?;
        let mut desc = RenderPassDesc::new(RenderPassName::Shadow)
            .depends_on(RenderPassName::Env)
            .with_draw_pass(
                DrawPass::new(|ctx, framebuffer| {
                    let Some(framebuffer) = framebuffer else {
                        return;
                    };
                    ctx.backend.set_render_target(framebuffer.handle, 0, 0);
                    ctx.backend.set_viewport(full_viewport(Some(framebuffer)));
                    ctx.backend
                        .clear(framebuffer.handle, ClearFlags::DEPTH, [0.0; 4], 0);

                    let draw_data = ctx.draw_data;
                    let Some(shadow_pass) = &draw_data.shadow_pass else {
                        return;
                    };
                    if let Some(pass_idx) = shadow_pass.pass_idx {
                        ctx.frame.pass_cb.bind(ctx.backend, pass_idx);
                    }
                    draw_whole_meshes(
                        ctx,
                        shadow_pass,
                        PipelineStateName::DepthStatic,
                        PipelineStateName::DepthAnimated,
                    );
                })
                .with_framebuffer(framebuffer),
            );

        let size = self.config.point_shadow_resolution;
        for index in 0..MAX_POINT_LIGHT_SHADOW_COUNT {
            let Some(name) = RenderTargetName::point_shadow_map(index) else {
                break;
            };
            let target = TextureDescriptor::render_target(
                name.as_str(),
                size,
                size,
                TextureFormat::Depth32Float,
            )
            .with_dimension(TextureDimension::TextureCube)
            .with_array_size(CUBE_FACE_COUNT);
            self.create_render_target(name, target, SamplerDescriptor::Linear)?;

            let framebuffer = self.framebuffer(&[], Some(name))?;
            desc.add_draw_pass(
                DrawPass::new(move |ctx, framebuffer| {
                    let Some(framebuffer) = framebuffer else {
                        return;
                    };
                    let draw_data = ctx.draw_data;
                    let Some(point_pass) = &draw_data.point_shadow_passes[index] else {
                        return;
                    };

                    ctx.backend.set_viewport(full_viewport(Some(framebuffer)));
                    for face in 0..CUBE_FACE_COUNT {
                        ctx.frame
                            .point_shadow_cb
                            .bind(ctx.backend, index as u32 * CUBE_FACE_COUNT + face);
                        ctx.backend.set_render_target(framebuffer.handle, face, 0);
                        ctx.backend
                            .clear(framebuffer.handle, ClearFlags::DEPTH, [0.0; 4], face);
                        draw_whole_meshes(
                            ctx,
                            point_pass,
                            PipelineStateName::PointShadowStatic,
                            PipelineStateName::PointShadowAnimated,
                        );
                    }
                })
                .with_framebuffer(framebuffer),
            );
        }

        self.add_pass(desc)
    }
}

/// Depth-only passes draw every mesh in one call, materials are irrelevant
fn draw_whole_meshes(
    ctx: &mut PassExecuteContext<'_>,
    pass: &PassContext,
    static_state: PipelineStateName,
    animated_state: PipelineStateName,
) {
    for batch in &pass.draws {
        bind_batch(ctx, batch, static_state, animated_state);
        ctx.backend.draw_elements(batch.index_count, 0);
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::{BackendCall, BackendKind, RecordingBackend};
    use crate::draw::{DrawData, PassContext};
    use crate::frame::{FrameCapacities, FrameContext};
    use crate::pipeline::*;

    #[test]
    fn test_point_shadow_renders_each_cube_face() {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let mut resources = ResourceRegistry::new();
        let config = RendererConfig::default();
        let mut creator = RenderPassCreator::new(&config, &mut backend, &mut resources).unwrap();
        creator.add_env_pass().unwrap();
        creator.add_shadow_pass().unwrap();
        let graph = creator.finish().unwrap();

        let frame = FrameContext::new(&mut backend, FrameCapacities::default()).unwrap();
        let mut draw_data = DrawData::default();
        draw_data.point_shadow_passes[1] = Some(PassContext::default());
        backend.take_calls();

        let mut ctx = PassExecuteContext {
            backend: &mut backend,
            frame: &frame,
            draw_data: &draw_data,
            resources: &resources,
            config: &config,
        };
        graph.execute(&mut ctx);

        let faces: Vec<u32> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::Clear { index, flags, .. } if *flags == ClearFlags::DEPTH => {
                    Some(*index)
                }
                _ => None,
            })
            .collect();
        // Directional map, then the six faces of the only active point light
        assert_eq!(faces, vec![0, 0, 1, 2, 3, 4, 5]);

        let point_shadow_cb = frame.point_shadow_cb.handle();
        let bound: Vec<u32> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::BindConstantBufferSlot { buffer, index, .. }
                    if *buffer == point_shadow_cb =>
                {
                    Some(*index)
                }
                _ => None,
            })
            .collect();
        assert_eq!(bound, vec![6, 7, 8, 9, 10, 11]);
    }
}
