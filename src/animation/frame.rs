use glam::Mat4;

/// Joint palette ceiling shared by the resolver and the skinning shader's
/// uniform block. Models are rejected at load time if they exceed it.
pub const MAX_JOINTS: usize = 150;

/// One resolved animation frame: per joint, its model-space transform and
/// the final skinning matrix. Slots past the model's joint count stay
/// identity.
#[derive(Clone, Debug)]
pub struct AnimatedFrame {
    pub local_matrices: [Mat4; MAX_JOINTS],
    pub skin_matrices: [Mat4; MAX_JOINTS],
}

impl AnimatedFrame {
    pub fn new() -> Self {
        Self {
            local_matrices: [Mat4::IDENTITY; MAX_JOINTS],
            skin_matrices: [Mat4::IDENTITY; MAX_JOINTS],
        }
    }

    /// Stores a joint's model-space transform and derives its skinning
    /// matrix by cancelling the bind pose.
    pub fn set_joint(&mut self, index: usize, local: Mat4, inverse_bind: Mat4) {
        self.local_matrices[index] = local;
        self.skin_matrices[index] = local * inverse_bind;
    }
}

impl Default for AnimatedFrame {
    fn default() -> Self {
        Self::new()
    }
}
