//! Shader resource bookkeeping around draw passes.
//!
//! A render target cannot be sampled while it is bound for output. Before a
//! draw pass runs, every output attachment with a shader resource slot is
//! unbound from that slot. Once the draw pass is done the render target is
//! released and the attachments are bound back, so later passes can sample
//! them.

use crate::backend::traits::Backend;
use crate::render_graph::pass::DrawPass;

/// Prepare bindings before the draw pass records its commands
pub fn begin_draw_pass(backend: &mut dyn Backend, draw_pass: &DrawPass) {
    if let Some(framebuffer) = &draw_pass.framebuffer {
        for texture in framebuffer.outputs() {
            if let Some(slot) = texture.slot {
                backend.unbind_texture(texture.dimension(), slot);
            }
        }
    }

    for transition in &draw_pass.transitions {
        if let Some(begin) = &transition.begin {
            begin(backend, &transition.resource, transition.slot);
        }
    }
}

/// Restore bindings after the draw pass recorded its commands
pub fn end_draw_pass(backend: &mut dyn Backend, draw_pass: &DrawPass) {
    backend.unset_render_target();

    if let Some(framebuffer) = &draw_pass.framebuffer {
        for texture in framebuffer.outputs() {
            if let Some(slot) = texture.slot {
                backend.bind_texture(texture.dimension(), texture.handle, slot);
            }
        }
    }

    for transition in &draw_pass.transitions {
        if let Some(end) = &transition.end {
            end(backend, &transition.resource, transition.slot);
        }
    }
}
