//! Multi-buffered frame contexts.
//!
//! The ring owns one [`FrameContext`] per frame the backend keeps in flight.
//! Each frame writes into the slot selected by the frame index, then
//! [`FrameRing::move_to_next_frame`] advances the index after present. A slot
//! is only written again once every other slot has had its turn. Waiting for
//! the GPU to release a slot is the backend's job.

use crate::backend::{Backend, BackendResult};
use crate::frame::context::{FrameCapacities, FrameContext};

/// Frame contexts cycled once per presented frame
pub struct FrameRing {
    frames: Vec<FrameContext>,
    /// Slot written this frame
    frame_index: usize,
    /// Total number of frames moved past
    frame_count: u64,
}

impl FrameRing {
    /// Allocate one frame context per frame in flight
    pub fn new(backend: &mut dyn Backend, capacities: FrameCapacities) -> BackendResult<Self> {
        let count = backend.frames_in_flight();
        assert!(count > 0, "backend must keep at least one frame in flight");

        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(FrameContext::new(&mut *backend, capacities)?);
        }

        log::info!(
            "Allocated {} frame context(s) for {}",
            count,
            backend.name()
        );

        Ok(Self {
            frames,
            frame_index: 0,
            frame_count: 0,
        })
    }

    pub fn current(&self) -> &FrameContext {
        &self.frames[self.frame_index]
    }

    pub fn current_mut(&mut self) -> &mut FrameContext {
        &mut self.frames[self.frame_index]
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Advance to the next slot; called once per frame after present
    pub fn move_to_next_frame(&mut self) {
        self.frame_index = (self.frame_index + 1) % self.frames.len();
        self.frame_count += 1;
        log::trace!(
            "Next frame {} (slot {})",
            self.frame_count,
            self.frame_index
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, RecordingBackend};

    #[test]
    fn test_single_frame_backend_reuses_slot() {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let mut ring = FrameRing::new(&mut backend, FrameCapacities::default()).unwrap();

        assert_eq!(ring.len(), 1);
        ring.move_to_next_frame();
        assert_eq!(ring.frame_index(), 0);
        assert_eq!(ring.frame_count(), 1);
    }

    #[test]
    fn test_frames_in_flight_cycle() {
        let mut backend = RecordingBackend::new(BackendKind::D3d12).with_frames_in_flight(3);
        let mut ring = FrameRing::new(&mut backend, FrameCapacities::default()).unwrap();

        let mut slots = Vec::new();
        for _ in 0..7 {
            slots.push(ring.frame_index());
            ring.move_to_next_frame();
        }
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_each_slot_owns_distinct_buffers() {
        let mut backend = RecordingBackend::new(BackendKind::D3d12).with_frames_in_flight(2);
        let mut ring = FrameRing::new(&mut backend, FrameCapacities::default()).unwrap();

        let first = ring.current().batch_cb.handle();
        ring.move_to_next_frame();
        let second = ring.current().batch_cb.handle();
        assert_ne!(first, second);
    }
}
