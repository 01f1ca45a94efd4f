//! Scene voxelization for cone traced global illumination

use std::sync::Arc;

use crate::backend::types::*;
use crate::pipeline::*;

/// Threads per axis of the voxel post-processing compute shader
pub const VOXEL_LOCAL_SIZE: u32 = 8;

/// Writable 3D texture. The shader resource slot is released while the
/// texture is bound for unordered access and restored afterwards.
fn voxel_storage(texture: Arc<GpuTexture>, uav_slot: u32) -> ResourceTransition {
    ResourceTransition::new(texture, uav_slot)
        .on_begin(|backend, texture, slot| {
            if let Some(srv_slot) = texture.slot {
                backend.unbind_texture(texture.dimension(), srv_slot);
            }
            backend.bind_unordered_access_view(slot, texture.handle);
        })
        .on_end(|backend, texture, slot| {
            backend.unbind_unordered_access_view(slot);
            if let Some(srv_slot) = texture.slot {
                backend.bind_texture(texture.dimension(), texture.handle, srv_slot);
            }
        })
}

impl RenderPassCreator<'_> {
    pub(crate) fn add_voxelization_pass(&mut self) -> Result<(), RendererError> {
        let size = self.config.voxel_texture_size;
        let mut voxels = Vec::new();
        for (name, uav_slot) in [
            (RenderTargetName::VoxelAlbedo, VOXEL_ALBEDO_UAV_SLOT),
            (RenderTargetName::VoxelNormal, VOXEL_NORMAL_UAV_SLOT),
        ] {
            let desc = TextureDescriptor {
                label: Some(name.as_str().to_string()),
                dimension: TextureDimension::Texture3D,
                width: size,
                height: size,
                depth: size,
                mip_levels: size.max(1).ilog2() + 1,
                format: TextureFormat::Rgba8Unorm,
                ..Default::default()
            }
            .with_usage(TextureUsage::UNORDERED_ACCESS | TextureUsage::GENERATE_MIPS);
            let texture = self.create_render_target(name, desc, SamplerDescriptor::Mipmapped)?;
            voxels.push((texture, uav_slot));
        }

        let mut voxelize = DrawPass::new(move |ctx, _| {
            let draw_data = ctx.draw_data;
            let Some(voxel_pass) = &draw_data.voxel_pass else {
                return;
            };

            ctx.backend.set_viewport(Viewport::new(size, size));
            if let Some(pass_idx) = voxel_pass.pass_idx {
                ctx.frame.pass_cb.bind(ctx.backend, pass_idx);
            }
            for batch in &voxel_pass.draws {
                bind_batch(
                    ctx,
                    batch,
                    PipelineStateName::VoxelizationStatic,
                    PipelineStateName::VoxelizationAnimated,
                );
                for subset in &batch.subsets {
                    bind_material(ctx, subset.material_idx);
                    ctx.backend
                        .draw_elements(subset.index_count, subset.index_offset);
                }
            }

            let groups = size.div_ceil(VOXEL_LOCAL_SIZE).max(1);
            ctx.backend
                .set_pipeline_state(PipelineStateName::VoxelizationPost);
            ctx.backend.dispatch(groups, groups, groups);
        });
        for (texture, uav_slot) in &voxels {
            voxelize = voxelize.with_transition(voxel_storage(texture.clone(), *uav_slot));
        }

        let handles: Vec<TextureHandle> = voxels.iter().map(|(texture, _)| texture.handle).collect();
        let mipmaps = DrawPass::new(move |ctx, _| {
            if ctx.draw_data.voxel_pass.is_none() {
                return;
            }
            for &handle in &handles {
                ctx.backend.generate_mipmap(handle);
            }
        });

        self.add_pass(
            RenderPassDesc::new(RenderPassName::Voxelization)
                .depends_on(RenderPassName::Shadow)
                .with_draw_pass(voxelize)
                .with_draw_pass(mipmaps),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, BackendKind, RecordingBackend};

    #[test]
    fn test_voxel_storage_swaps_srv_for_uav() {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let mut resources = ResourceRegistry::new();
        let desc = TextureDescriptor {
            dimension: TextureDimension::Texture3D,
            ..Default::default()
        };
        let texture = resources
            .create_texture(&mut backend, RenderTargetName::VoxelNormal, desc, SamplerDescriptor::Linear)
            .unwrap();
        let transition = voxel_storage(texture.clone(), VOXEL_NORMAL_UAV_SLOT);
        backend.take_calls();

        (transition.begin.as_ref().unwrap())(&mut backend, &transition.resource, transition.slot);
        (transition.end.as_ref().unwrap())(&mut backend, &transition.resource, transition.slot);

        assert_eq!(
            backend.take_calls(),
            vec![
                BackendCall::UnbindTexture {
                    dimension: TextureDimension::Texture3D,
                    slot: 19
                },
                BackendCall::BindUnorderedAccessView {
                    slot: VOXEL_NORMAL_UAV_SLOT,
                    texture: texture.handle
                },
                BackendCall::UnbindUnorderedAccessView {
                    slot: VOXEL_NORMAL_UAV_SLOT
                },
                BackendCall::BindTexture {
                    dimension: TextureDimension::Texture3D,
                    texture: texture.handle,
                    slot: 19
                },
            ]
        );
    }
}
