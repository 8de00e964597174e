use anyhow::{ensure, Result};
use glam::{Mat4, Vec3};
use merlin_engine::animation::skinning::{self, inverse_bind_matrices};
use merlin_engine::md5::{restore_quat_w, Md5Anim, Md5Model};
use merlin_engine::mesh::MAX_WEIGHTS;

fn load_biped() -> Result<(Md5Model, Md5Anim)> {
    let mesh_path = "fixtures/md5/biped.md5mesh";
    let anim_path = "fixtures/md5/biped.md5anim";
    ensure!(std::path::Path::new(mesh_path).exists(), "fixture missing at {mesh_path}");
    Ok((Md5Model::load(mesh_path)?, Md5Anim::load(anim_path)?))
}

fn approx_mat4(actual: Mat4, expected: Mat4) {
    assert!(actual.abs_diff_eq(expected, 1e-5), "expected {expected:?}, got {actual:?}");
}

fn approx_vec3(actual: Vec3, expected: Vec3) {
    assert!((actual - expected).length() < 1e-5, "expected {expected:?}, got {actual:?}");
}

#[test]
fn bind_matrices_invert_cleanly() -> Result<()> {
    let (model, _) = load_biped()?;
    let inverse = inverse_bind_matrices(&model.joints);
    assert_eq!(inverse.len(), model.joints.len());
    for (joint, inv) in model.joints.iter().zip(&inverse) {
        let bind =
            Mat4::from_translation(joint.bind_position) * Mat4::from_quat(joint.bind_orientation);
        approx_mat4(bind * *inv, Mat4::IDENTITY);
    }
    Ok(())
}

#[test]
fn quaternion_w_reconstruction_matches_convention() {
    let q = restore_quat_w(Vec3::new(0.5, 0.5, 0.5));
    assert!((q.w - 0.5).abs() < 1e-6);
    assert!((q.length() - 1.0).abs() < 1e-6);
    assert!(q.w >= 0.0);
}

#[test]
fn biped_resolves_two_distinct_frames() -> Result<()> {
    let (model, anim) = load_biped()?;
    let item = skinning::process(model, anim, [1.0; 4])?;
    assert_eq!(item.frame_count(), 2);
    assert_eq!(item.frame_rate(), 24);
    assert_eq!(item.frame_bounds().len(), 2);

    let first = &item.frames()[0];
    let second = &item.frames()[1];

    // Frame 0 repeats the base pose, which equals the bind pose, so
    // every skinning matrix cancels.
    for index in 0..2 {
        approx_mat4(first.skin_matrices[index], Mat4::IDENTITY);
    }
    approx_mat4(first.local_matrices[1], Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));

    // Frame 1 moves the root one unit along x; the arm rides along.
    approx_mat4(second.local_matrices[0], Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));
    approx_mat4(second.local_matrices[1], Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
    approx_mat4(second.skin_matrices[1], Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));

    // skin = local * inverse_bind holds for every joint of every frame.
    for frame in item.frames() {
        for (index, inv) in item.inverse_bind_matrices().iter().enumerate() {
            approx_mat4(frame.skin_matrices[index], frame.local_matrices[index] * *inv);
        }
    }

    // Beyond the skeleton the slots stay identity.
    approx_mat4(second.local_matrices[2], Mat4::IDENTITY);
    Ok(())
}

#[test]
fn child_world_position_composes_through_the_parent() -> Result<()> {
    let (model, anim) = load_biped()?;
    let item = skinning::process(model, anim, [1.0; 4])?;
    let second = &item.frames()[1];
    approx_vec3(second.local_matrices[1].transform_point3(Vec3::ZERO), Vec3::new(2.0, 0.0, 0.0));
    Ok(())
}

#[test]
fn bind_pose_positions_blend_weights() -> Result<()> {
    let (model, _) = load_biped()?;
    let meshes = skinning::bind_pose_meshes(&model, [1.0; 4])?;
    assert_eq!(meshes.len(), 1);
    let mesh = &meshes[0];

    approx_vec3(Vec3::from_array(mesh.vertices[0].position), Vec3::ZERO);
    approx_vec3(Vec3::from_array(mesh.vertices[1].position), Vec3::new(2.0, 0.0, 0.0));
    approx_vec3(Vec3::from_array(mesh.vertices[2].position), Vec3::new(1.0, 1.0, 0.0));
    // Two half weights: 0.5*(0,0,2) on the origin plus 0.5*((1,0,0)+(0,0,2)) on the arm.
    approx_vec3(Vec3::from_array(mesh.vertices[3].position), Vec3::new(0.5, 0.0, 2.0));

    // Attribute slots: vertex 3 blends both joints, the rest pad with -1.
    assert_eq!(mesh.vertices[3].joints.len(), MAX_WEIGHTS);
    assert_eq!(mesh.vertices[3].joints, [0, 1, -1, -1]);
    assert_eq!(mesh.vertices[3].weights, [0.5, 0.5, -1.0, -1.0]);
    assert_eq!(mesh.vertices[0].joints, [0, -1, -1, -1]);
    assert_eq!(mesh.vertices[0].weights, [1.0, -1.0, -1.0, -1.0]);

    // Only one triangle touches vertex 0, so its normal is that face's.
    approx_vec3(Vec3::from_array(mesh.vertices[0].normal), Vec3::new(0.0, 0.0, -1.0));
    Ok(())
}

#[test]
fn planar_quad_normals_match_the_face_normal() -> Result<()> {
    let model = Md5Model::load("fixtures/md5/quad.md5mesh")?;
    let meshes = skinning::bind_pose_meshes(&model, [1.0; 4])?;
    let mesh = &meshes[0];
    assert_eq!(mesh.vertices.len(), 4);
    assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);

    let p: Vec<Vec3> = mesh.vertices.iter().map(|v| Vec3::from_array(v.position)).collect();
    let face = (p[2] - p[0]).cross(p[1] - p[0]).normalize();
    for vertex in &mesh.vertices {
        approx_vec3(Vec3::from_array(vertex.normal), face);
        assert!((Vec3::from_array(vertex.normal).length() - 1.0).abs() < 1e-5);
    }
    Ok(())
}

#[test]
fn larger_animation_skeleton_is_tolerated() -> Result<()> {
    // The quad has one joint; the biped animation carries two hierarchy
    // entries. The extras are simply unused.
    let model = Md5Model::load("fixtures/md5/quad.md5mesh")?;
    let anim = Md5Anim::load("fixtures/md5/biped.md5anim")?;
    let item = skinning::process(model, anim, [1.0; 4])?;
    assert_eq!(item.inverse_bind_matrices().len(), 1);
    assert_eq!(item.frame_count(), 2);
    approx_mat4(item.frames()[1].local_matrices[0], Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));
    Ok(())
}
