use anyhow::Result;
use glam::{Vec2, Vec3};

use crate::material::Material;

/// Widest joint influence the vertex layout carries. Weights beyond this
/// still shape the bind-pose position but are dropped from the buffers.
pub const MAX_WEIGHTS: usize = 4;

/// GPU-facing skin vertex. Unused joint slots hold -1 and unused weight
/// slots hold -1.0 so shaders can tell them from joint 0.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    pub joints: [i32; MAX_WEIGHTS],
    pub weights: [f32; MAX_WEIGHTS],
}

impl SkinnedVertex {
    pub fn new(position: Vec3, uv: Vec2, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            uv: uv.to_array(),
            normal: normal.to_array(),
            joints: [-1; MAX_WEIGHTS],
            weights: [-1.0; MAX_WEIGHTS],
        }
    }

    pub fn with_skin(mut self, joints: [i32; MAX_WEIGHTS], weights: [f32; MAX_WEIGHTS]) -> Self {
        self.joints = joints;
        self.weights = weights;
        self
    }
}

#[derive(Clone, Debug)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

impl MeshBounds {
    pub fn from_vertices(vertices: &[SkinnedVertex]) -> Self {
        if vertices.is_empty() {
            return MeshBounds { min: Vec3::ZERO, max: Vec3::ZERO, center: Vec3::ZERO, radius: 0.0 };
        }
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for vertex in vertices {
            let pos = Vec3::from_array(vertex.position);
            min = min.min(pos);
            max = max.max(pos);
        }
        let center = (min + max) * 0.5;
        let mut radius: f32 = 0.0;
        for vertex in vertices {
            let pos = Vec3::from_array(vertex.position);
            radius = radius.max((pos - center).length());
        }
        MeshBounds { min, max, center, radius }
    }
}

/// One bind-pose skin mesh with the material resolved from its shader
/// path (or the fallback color).
#[derive(Clone, Debug)]
pub struct SkinnedMesh {
    pub vertices: Vec<SkinnedVertex>,
    pub indices: Vec<u32>,
    pub bounds: MeshBounds,
    pub material: Material,
}

impl SkinnedMesh {
    pub fn new(vertices: Vec<SkinnedVertex>, indices: Vec<u32>, material: Material) -> Self {
        let bounds = MeshBounds::from_vertices(&vertices);
        Self { vertices, indices, bounds, material }
    }

    pub fn vertex_arrays(&self) -> VertexArrays {
        VertexArrays::from_vertices(&self.vertices)
    }
}

/// The planar attribute streams the upload interface consumes: positions
/// xyz, UVs, normals xyz, then `MAX_WEIGHTS` joint indices and weights
/// per vertex.
#[derive(Clone, Debug, Default)]
pub struct VertexArrays {
    pub positions: Vec<f32>,
    pub uvs: Vec<f32>,
    pub normals: Vec<f32>,
    pub joints: Vec<i32>,
    pub weights: Vec<f32>,
}

impl VertexArrays {
    pub fn from_vertices(vertices: &[SkinnedVertex]) -> Self {
        let mut arrays = VertexArrays {
            positions: Vec::with_capacity(vertices.len() * 3),
            uvs: Vec::with_capacity(vertices.len() * 2),
            normals: Vec::with_capacity(vertices.len() * 3),
            joints: Vec::with_capacity(vertices.len() * MAX_WEIGHTS),
            weights: Vec::with_capacity(vertices.len() * MAX_WEIGHTS),
        };
        for vertex in vertices {
            arrays.positions.extend_from_slice(&vertex.position);
            arrays.uvs.extend_from_slice(&vertex.uv);
            arrays.normals.extend_from_slice(&vertex.normal);
            arrays.joints.extend_from_slice(&vertex.joints);
            arrays.weights.extend_from_slice(&vertex.weights);
        }
        arrays
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// The GPU upload collaborator. The engine's renderer implements this;
/// tests use in-memory recorders.
pub trait MeshUpload {
    fn upload(&mut self, arrays: &VertexArrays, indices: &[u32], material: &Material) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32) -> SkinnedVertex {
        SkinnedVertex::new(Vec3::new(x, 0.0, 0.0), Vec2::ZERO, Vec3::Z)
            .with_skin([0, -1, -1, -1], [1.0, -1.0, -1.0, -1.0])
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<SkinnedVertex>(), 64);
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let mesh = SkinnedMesh::new(
            vec![vertex(-2.0), vertex(4.0)],
            vec![0, 1, 1],
            Material::flat([1.0; 4], 1.0),
        );
        assert_eq!(mesh.bounds.min, Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!(mesh.bounds.max, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(mesh.bounds.center, Vec3::new(1.0, 0.0, 0.0));
        assert!((mesh.bounds.radius - 3.0).abs() < 1e-6);
    }

    #[test]
    fn empty_mesh_has_zero_bounds() {
        let bounds = MeshBounds::from_vertices(&[]);
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.radius, 0.0);
    }

    #[test]
    fn arrays_are_planar_per_attribute() {
        let arrays = VertexArrays::from_vertices(&[vertex(1.0), vertex(2.0)]);
        assert_eq!(arrays.vertex_count(), 2);
        assert_eq!(arrays.positions, vec![1.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        assert_eq!(arrays.uvs.len(), 4);
        assert_eq!(arrays.normals[2], 1.0);
        assert_eq!(arrays.joints, vec![0, -1, -1, -1, 0, -1, -1, -1]);
        assert_eq!(arrays.weights[0], 1.0);
        assert_eq!(arrays.weights[1], -1.0);
    }
}
