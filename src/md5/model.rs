use anyhow::{Context, Result};
use glam::{Quat, Vec2, Vec3};
use log::warn;
use std::fs;
use std::path::Path;

use super::blocks::{self, RawBlock, RawDocument};
use super::{restore_quat_w, Md5Error};

#[derive(Debug, Clone, Default)]
pub struct ModelHeader {
    pub version: i32,
    pub command_line: String,
    pub num_joints: i32,
    pub num_meshes: i32,
}

/// One node of the bind-pose skeleton. `bind_position` and
/// `bind_orientation` are in model space; `parent` is -1 for roots and
/// always references an earlier joint for everything else.
#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub parent: i32,
    pub bind_position: Vec3,
    pub bind_orientation: Quat,
}

/// Pre-skin vertex: UV plus a contiguous range into the mesh's weight
/// list. Positions are derived later from the weights.
#[derive(Debug, Clone, Copy)]
pub struct VertexData {
    pub uv: Vec2,
    pub weight_start: usize,
    pub weight_count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct TriangleData {
    pub vertices: [usize; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct WeightData {
    pub joint: usize,
    pub bias: f32,
    pub local_position: Vec3,
}

#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub texture: Option<String>,
    pub vertices: Vec<VertexData>,
    pub triangles: Vec<TriangleData>,
    pub weights: Vec<WeightData>,
}

#[derive(Debug, Clone)]
pub struct Md5Model {
    pub header: ModelHeader,
    pub joints: Vec<Joint>,
    pub meshes: Vec<MeshData>,
}

impl Md5Model {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self, Md5Error> {
        let doc = RawDocument::parse(text)?;
        let header = parse_header(&doc.header)?;

        let joints_block = doc
            .block("joints")
            .ok_or(Md5Error::MissingRequiredBlock("joints"))?;
        let joints = parse_joints(joints_block)?;
        if joints.is_empty() {
            return Err(Md5Error::MalformedBlock {
                block: "joints".to_string(),
                detail: "no joint definitions parsed".to_string(),
            });
        }

        let mut meshes = Vec::new();
        for block in doc.blocks.iter().filter(|b| b.name == "mesh") {
            meshes.push(parse_mesh(block)?);
        }

        Ok(Self { header, joints, meshes })
    }
}

/// Header fields are informational; the authoritative counts are whatever
/// the blocks actually contain.
fn parse_header(lines: &[&str]) -> Result<ModelHeader, Md5Error> {
    let mut header = ModelHeader::default();
    for line in lines {
        let tokens = blocks::tokenize(line);
        let (Some(&key), Some(&value)) = (tokens.first(), tokens.get(1)) else {
            continue;
        };
        match key {
            "MD5Version" => header.version = blocks::parse_i32(value, "MD5Version")?,
            "commandline" => header.command_line = blocks::unquote(value).to_string(),
            "numJoints" => header.num_joints = blocks::parse_i32(value, "numJoints")?,
            "numMeshes" => header.num_meshes = blocks::parse_i32(value, "numMeshes")?,
            _ => {}
        }
    }
    Ok(header)
}

fn parse_joints(block: &RawBlock<'_>) -> Result<Vec<Joint>, Md5Error> {
    let mut joints = Vec::new();
    for line in &block.body {
        let tokens = blocks::tokenize(line);
        if tokens.is_empty() {
            continue;
        }
        // "name" parent ( px py pz ) ( qx qy qz )
        let shaped = tokens.len() >= 12 && tokens[0].starts_with('"');
        let position = if shaped { blocks::read_vec3(&tokens, 2, "joint position")? } else { None };
        let orientation = if shaped { blocks::read_vec3(&tokens, 7, "joint orientation")? } else { None };
        let (Some(position), Some(orientation)) = (position, orientation) else {
            warn!("skipping malformed joints line: {}", line.trim());
            continue;
        };
        joints.push(Joint {
            name: blocks::unquote(tokens[0]).to_string(),
            parent: blocks::parse_i32(tokens[1], "joint parent index")?,
            bind_position: position,
            bind_orientation: restore_quat_w(orientation),
        });
    }
    Ok(joints)
}

fn parse_mesh(block: &RawBlock<'_>) -> Result<MeshData, Md5Error> {
    let mut mesh = MeshData::default();
    for line in &block.body {
        let tokens = blocks::tokenize(line);
        let Some(&keyword) = tokens.first() else {
            continue;
        };
        match keyword {
            "shader" => match tokens.get(1) {
                Some(token) if token.starts_with('"') => {
                    let path = blocks::unquote(token);
                    if !path.is_empty() {
                        mesh.texture = Some(path.to_string());
                    }
                }
                _ => warn!("skipping malformed shader line: {}", line.trim()),
            },
            "vert" => {
                // vert index ( u v ) weightStart weightCount
                if tokens.len() >= 8 && tokens[2] == "(" && tokens[5] == ")" {
                    blocks::parse_usize(tokens[1], "vertex index")?;
                    mesh.vertices.push(VertexData {
                        uv: Vec2::new(
                            blocks::parse_f32(tokens[3], "vertex u")?,
                            blocks::parse_f32(tokens[4], "vertex v")?,
                        ),
                        weight_start: blocks::parse_usize(tokens[6], "vertex weight start")?,
                        weight_count: blocks::parse_usize(tokens[7], "vertex weight count")?,
                    });
                } else {
                    warn!("skipping malformed vert line: {}", line.trim());
                }
            }
            "tri" => {
                // tri index v0 v1 v2
                if tokens.len() >= 5 {
                    blocks::parse_usize(tokens[1], "triangle index")?;
                    mesh.triangles.push(TriangleData {
                        vertices: [
                            blocks::parse_usize(tokens[2], "triangle vertex")?,
                            blocks::parse_usize(tokens[3], "triangle vertex")?,
                            blocks::parse_usize(tokens[4], "triangle vertex")?,
                        ],
                    });
                } else {
                    warn!("skipping malformed tri line: {}", line.trim());
                }
            }
            "weight" => {
                // weight index joint bias ( x y z )
                let position = if tokens.len() >= 9 {
                    blocks::read_vec3(&tokens, 4, "weight position")?
                } else {
                    None
                };
                if let Some(position) = position {
                    blocks::parse_usize(tokens[1], "weight index")?;
                    mesh.weights.push(WeightData {
                        joint: blocks::parse_usize(tokens[2], "weight joint index")?,
                        bias: blocks::parse_f32(tokens[3], "weight bias")?,
                        local_position: position,
                    });
                } else {
                    warn!("skipping malformed weight line: {}", line.trim());
                }
            }
            // numverts / numtris / numweights and anything else carry no
            // data the block does not already imply.
            _ => {}
        }
    }
    Ok(mesh)
}
