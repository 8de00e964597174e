use anyhow::Result;
use glam::Mat4;

use crate::animation::frame::AnimatedFrame;
use crate::md5::anim::FrameBounds;
use crate::mesh::{MeshUpload, SkinnedMesh};

/// A fully resolved, renderable skeletal model: its skin meshes, every
/// precomputed animation frame, and the frame cursor. Built once by
/// `skinning::process`; the cursor is the only state that moves after
/// that.
#[derive(Debug)]
pub struct AnimatedItem {
    meshes: Vec<SkinnedMesh>,
    frames: Vec<AnimatedFrame>,
    inverse_bind: Vec<Mat4>,
    frame_rate: u32,
    bounds: Vec<FrameBounds>,
    current: usize,
}

impl AnimatedItem {
    /// `frames` is never empty; `process` rejects animations without
    /// frames before construction.
    pub(crate) fn new(
        meshes: Vec<SkinnedMesh>,
        frames: Vec<AnimatedFrame>,
        inverse_bind: Vec<Mat4>,
        frame_rate: u32,
        bounds: Vec<FrameBounds>,
    ) -> Self {
        Self { meshes, frames, inverse_bind, frame_rate, bounds, current: 0 }
    }

    pub fn current_frame(&self) -> &AnimatedFrame {
        &self.frames[self.current]
    }

    /// Peeks at the frame the next `advance_frame` will land on, without
    /// moving the cursor. The renderer uses it for inter-frame work.
    pub fn next_frame(&self) -> &AnimatedFrame {
        &self.frames[(self.current + 1) % self.frames.len()]
    }

    /// Steps the cursor one frame forward, wrapping back to the first
    /// frame after the last.
    pub fn advance_frame(&mut self) {
        self.current = (self.current + 1) % self.frames.len();
    }

    pub fn current_frame_index(&self) -> usize {
        self.current
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[AnimatedFrame] {
        &self.frames
    }

    pub fn meshes(&self) -> &[SkinnedMesh] {
        &self.meshes
    }

    pub fn inverse_bind_matrices(&self) -> &[Mat4] {
        &self.inverse_bind
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Per-frame AABBs from the animation file, when it carried a bounds
    /// block. Indexed like `frames`.
    pub fn frame_bounds(&self) -> &[FrameBounds] {
        &self.bounds
    }

    /// Pushes every mesh through the GPU upload interface, in mesh order.
    pub fn upload_to<U: MeshUpload>(&self, gpu: &mut U) -> Result<()> {
        for mesh in &self.meshes {
            gpu.upload(&mesh.vertex_arrays(), &mesh.indices, &mesh.material)?;
        }
        Ok(())
    }
}
