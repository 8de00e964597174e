use anyhow::{anyhow, bail, ensure, Result};
use glam::{Mat4, Vec3};
use log::warn;

use crate::animation::frame::{AnimatedFrame, MAX_JOINTS};
use crate::animation::item::AnimatedItem;
use crate::material::Material;
use crate::md5::anim::{Frame, JointFlags, Md5Anim};
use crate::md5::model::{Joint, Md5Model, MeshData, WeightData};
use crate::md5::restore_quat_w;
use crate::mesh::{SkinnedMesh, SkinnedVertex, MAX_WEIGHTS};

/// Resolves a parsed model/animation pair into a renderable item: bind
/// pose meshes, inverse bind matrices, and one precomputed
/// `AnimatedFrame` per source frame. Consumes both parse results;
/// nothing else is kept from them.
pub fn process(model: Md5Model, anim: Md5Anim, default_color: [f32; 4]) -> Result<AnimatedItem> {
    validate(&model, &anim)?;

    let inverse_bind = inverse_bind_matrices(&model.joints);
    let mut frames = Vec::with_capacity(anim.frames.len());
    for frame in &anim.frames {
        frames.push(resolve_frame(&model.joints, &anim, frame, &inverse_bind)?);
    }
    let meshes = bind_pose_meshes(&model, default_color)?;

    Ok(AnimatedItem::new(meshes, frames, inverse_bind, anim.header.frame_rate, anim.bounds))
}

/// Count checks up front so the per-frame loop can index freely.
fn validate(model: &Md5Model, anim: &Md5Anim) -> Result<()> {
    let num_joints = model.joints.len();
    ensure!(
        num_joints <= MAX_JOINTS,
        "model has {num_joints} joints, more than the {MAX_JOINTS} the skinning palette holds"
    );
    for (index, joint) in model.joints.iter().enumerate() {
        ensure!(
            joint.parent >= -1 && joint.parent < index as i32,
            "joint `{}` references parent {} at or after itself",
            joint.name,
            joint.parent
        );
    }
    ensure!(
        anim.hierarchy.len() >= num_joints,
        "animation hierarchy has {} entries for {num_joints} model joints",
        anim.hierarchy.len()
    );
    ensure!(
        anim.base_frame.len() >= num_joints,
        "animation base frame has {} poses for {num_joints} model joints",
        anim.base_frame.len()
    );
    ensure!(!anim.frames.is_empty(), "animation has no frames");
    Ok(())
}

/// Bind matrix per joint is translate-then-rotate; its inverse takes a
/// model-space point back into the joint's bind-local frame.
pub fn inverse_bind_matrices(joints: &[Joint]) -> Vec<Mat4> {
    joints
        .iter()
        .map(|joint| {
            (Mat4::from_translation(joint.bind_position) * Mat4::from_quat(joint.bind_orientation))
                .inverse()
        })
        .collect()
}

fn resolve_frame(
    joints: &[Joint],
    anim: &Md5Anim,
    frame: &Frame,
    inverse_bind: &[Mat4],
) -> Result<AnimatedFrame> {
    let mut resolved = AnimatedFrame::new();
    for (index, joint) in joints.iter().enumerate() {
        let base = &anim.base_frame[index];
        let entry = &anim.hierarchy[index];

        let mut position = base.position;
        let mut rotation = base.orientation.xyz();
        let mut cursor = entry.start_index;
        // Flagged components overwrite the base pose in the stream's
        // fixed order: tx ty tz qx qy qz.
        if entry.flags.contains(JointFlags::TX) {
            position.x = next_component(frame, &mut cursor, &joint.name)?;
        }
        if entry.flags.contains(JointFlags::TY) {
            position.y = next_component(frame, &mut cursor, &joint.name)?;
        }
        if entry.flags.contains(JointFlags::TZ) {
            position.z = next_component(frame, &mut cursor, &joint.name)?;
        }
        if entry.flags.contains(JointFlags::QX) {
            rotation.x = next_component(frame, &mut cursor, &joint.name)?;
        }
        if entry.flags.contains(JointFlags::QY) {
            rotation.y = next_component(frame, &mut cursor, &joint.name)?;
        }
        if entry.flags.contains(JointFlags::QZ) {
            rotation.z = next_component(frame, &mut cursor, &joint.name)?;
        }

        let orientation = restore_quat_w(rotation);
        let mut local = Mat4::from_translation(position) * Mat4::from_quat(orientation);
        if joint.parent >= 0 {
            // Parents sit earlier in the joint list, so their local
            // matrix for this frame is already in place.
            local = resolved.local_matrices[joint.parent as usize] * local;
        }
        resolved.set_joint(index, local, inverse_bind[index]);
    }
    Ok(resolved)
}

fn next_component(frame: &Frame, cursor: &mut usize, joint_name: &str) -> Result<f32> {
    let value = frame.data.get(*cursor).copied().ok_or_else(|| {
        anyhow!(
            "frame {} has {} components, joint `{joint_name}` reads past the end",
            frame.id,
            frame.data.len()
        )
    })?;
    *cursor += 1;
    Ok(value)
}

/// Builds every mesh of the model in its bind pose. Uses only the model;
/// vertex positions come from the weighted joint offsets and normals
/// from area-weighted face accumulation.
pub fn bind_pose_meshes(model: &Md5Model, default_color: [f32; 4]) -> Result<Vec<SkinnedMesh>> {
    model
        .meshes
        .iter()
        .enumerate()
        .map(|(index, mesh)| build_mesh(&model.joints, mesh, index, default_color))
        .collect()
}

fn build_mesh(
    joints: &[Joint],
    mesh: &MeshData,
    mesh_index: usize,
    default_color: [f32; 4],
) -> Result<SkinnedMesh> {
    let mut positions = Vec::with_capacity(mesh.vertices.len());
    for (vertex_index, vertex) in mesh.vertices.iter().enumerate() {
        let weights = weight_range(mesh, vertex.weight_start, vertex.weight_count).ok_or_else(
            || {
                anyhow!(
                    "mesh {mesh_index} vertex {vertex_index} weight range {}+{} outside the {} weights",
                    vertex.weight_start,
                    vertex.weight_count,
                    mesh.weights.len()
                )
            },
        )?;
        if vertex.weight_count > MAX_WEIGHTS {
            warn!(
                "mesh {mesh_index} vertex {vertex_index} has {} weights, buffers keep the first {MAX_WEIGHTS}",
                vertex.weight_count
            );
        }
        let mut position = Vec3::ZERO;
        for weight in weights {
            let joint = joints.get(weight.joint).ok_or_else(|| {
                anyhow!(
                    "mesh {mesh_index} weight references joint {} of {}",
                    weight.joint,
                    joints.len()
                )
            })?;
            let rotated = joint.bind_orientation * weight.local_position;
            position += (joint.bind_position + rotated) * weight.bias;
        }
        positions.push(position);
    }

    let mut normals = vec![Vec3::ZERO; positions.len()];
    let mut indices = Vec::with_capacity(mesh.triangles.len() * 3);
    for triangle in &mesh.triangles {
        let [v0, v1, v2] = triangle.vertices;
        for vertex in triangle.vertices {
            if vertex >= positions.len() {
                bail!(
                    "mesh {mesh_index} triangle references vertex {vertex} of {}",
                    positions.len()
                );
            }
        }
        let normal = (positions[v2] - positions[v0]).cross(positions[v1] - positions[v0]);
        normals[v0] += normal;
        normals[v1] += normal;
        normals[v2] += normal;
        indices.extend_from_slice(&[v0 as u32, v1 as u32, v2 as u32]);
    }
    for normal in &mut normals {
        *normal = normal.normalize_or_zero();
    }

    let mut vertices = Vec::with_capacity(mesh.vertices.len());
    for (vertex_index, vertex) in mesh.vertices.iter().enumerate() {
        let mut joint_slots = [-1_i32; MAX_WEIGHTS];
        let mut weight_slots = [-1.0_f32; MAX_WEIGHTS];
        let range = &mesh.weights[vertex.weight_start..vertex.weight_start + vertex.weight_count];
        for (slot, weight) in range.iter().take(MAX_WEIGHTS).enumerate() {
            joint_slots[slot] = weight.joint as i32;
            weight_slots[slot] = weight.bias;
        }
        vertices.push(
            SkinnedVertex::new(positions[vertex_index], vertex.uv, normals[vertex_index])
                .with_skin(joint_slots, weight_slots),
        );
    }

    let material = match &mesh.texture {
        Some(path) => Material::textured(path),
        None => Material::flat(default_color, 1.0),
    };
    Ok(SkinnedMesh::new(vertices, indices, material))
}

fn weight_range(mesh: &MeshData, start: usize, count: usize) -> Option<&[WeightData]> {
    let end = start.checked_add(count)?;
    mesh.weights.get(start..end)
}
