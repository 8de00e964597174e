use anyhow::{Context, Result};
use bitflags::bitflags;
use glam::{Quat, Vec3};
use log::warn;
use std::fs;
use std::path::Path;

use super::blocks::{self, RawBlock, RawDocument};
use super::{restore_quat_w, Md5Error};

#[derive(Debug, Clone, Default)]
pub struct AnimHeader {
    pub version: i32,
    pub command_line: String,
    pub num_frames: i32,
    pub num_joints: i32,
    pub frame_rate: u32,
    pub num_animated_components: i32,
}

bitflags! {
    /// Which transform components a joint overrides per frame. Bit order
    /// matches the order the components are consumed from the frame data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct JointFlags: u32 {
        const TX = 1 << 0;
        const TY = 1 << 1;
        const TZ = 1 << 2;
        const QX = 1 << 3;
        const QY = 1 << 4;
        const QZ = 1 << 5;
    }
}

#[derive(Debug, Clone)]
pub struct HierarchyEntry {
    pub name: String,
    pub parent: i32,
    pub flags: JointFlags,
    /// Offset into each frame's data stream where this joint's animated
    /// components start.
    pub start_index: usize,
}

/// Per-frame AABB, published for renderer-side culling.
#[derive(Debug, Clone, Copy)]
pub struct FrameBounds {
    pub min: Vec3,
    pub max: Vec3,
}

/// Default pose for one joint, overridden component-wise by frame data.
#[derive(Debug, Clone, Copy)]
pub struct BaseFrameEntry {
    pub position: Vec3,
    pub orientation: Quat,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub id: i32,
    pub data: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct Md5Anim {
    pub header: AnimHeader,
    pub hierarchy: Vec<HierarchyEntry>,
    pub bounds: Vec<FrameBounds>,
    pub base_frame: Vec<BaseFrameEntry>,
    pub frames: Vec<Frame>,
}

impl Md5Anim {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self, Md5Error> {
        let doc = RawDocument::parse(text)?;
        let header = parse_header(&doc.header)?;

        let hierarchy_block = doc
            .block("hierarchy")
            .ok_or(Md5Error::MissingRequiredBlock("hierarchy"))?;
        let hierarchy = parse_hierarchy(hierarchy_block)?;
        if hierarchy.is_empty() {
            return Err(Md5Error::MalformedBlock {
                block: "hierarchy".to_string(),
                detail: "no joint entries parsed".to_string(),
            });
        }

        let base_block = doc
            .block("baseframe")
            .ok_or(Md5Error::MissingRequiredBlock("baseframe"))?;
        let base_frame = parse_base_frame(base_block)?;
        if base_frame.is_empty() {
            return Err(Md5Error::MalformedBlock {
                block: "baseframe".to_string(),
                detail: "no joint poses parsed".to_string(),
            });
        }

        let bounds = match doc.block("bounds") {
            Some(block) => parse_bounds(block)?,
            None => Vec::new(),
        };

        let mut frames = Vec::new();
        for block in &doc.blocks {
            let Some(id) = block.name.strip_prefix("frame ") else {
                continue;
            };
            frames.push(Frame {
                id: blocks::parse_i32(id.trim(), "frame block id")?,
                data: parse_frame_data(block)?,
            });
        }

        Ok(Self { header, hierarchy, bounds, base_frame, frames })
    }
}

fn parse_header(lines: &[&str]) -> Result<AnimHeader, Md5Error> {
    let mut header = AnimHeader::default();
    for line in lines {
        let tokens = blocks::tokenize(line);
        let (Some(&key), Some(&value)) = (tokens.first(), tokens.get(1)) else {
            continue;
        };
        match key {
            "MD5Version" => header.version = blocks::parse_i32(value, "MD5Version")?,
            "commandline" => header.command_line = blocks::unquote(value).to_string(),
            "numFrames" => header.num_frames = blocks::parse_i32(value, "numFrames")?,
            "numJoints" => header.num_joints = blocks::parse_i32(value, "numJoints")?,
            "frameRate" => header.frame_rate = blocks::parse_u32(value, "frameRate")?,
            "numAnimatedComponents" => {
                header.num_animated_components = blocks::parse_i32(value, "numAnimatedComponents")?;
            }
            _ => {}
        }
    }
    Ok(header)
}

fn parse_hierarchy(block: &RawBlock<'_>) -> Result<Vec<HierarchyEntry>, Md5Error> {
    let mut entries = Vec::new();
    for line in &block.body {
        let tokens = blocks::tokenize(line);
        if tokens.is_empty() {
            continue;
        }
        // "name" parent flags startIndex
        if tokens.len() < 4 || !tokens[0].starts_with('"') {
            warn!("skipping malformed hierarchy line: {}", line.trim());
            continue;
        }
        entries.push(HierarchyEntry {
            name: blocks::unquote(tokens[0]).to_string(),
            parent: blocks::parse_i32(tokens[1], "hierarchy parent index")?,
            flags: JointFlags::from_bits_truncate(blocks::parse_u32(tokens[2], "hierarchy flags")?),
            start_index: blocks::parse_usize(tokens[3], "hierarchy start index")?,
        });
    }
    Ok(entries)
}

fn parse_bounds(block: &RawBlock<'_>) -> Result<Vec<FrameBounds>, Md5Error> {
    let mut bounds = Vec::new();
    for line in &block.body {
        let tokens = blocks::tokenize(line);
        if tokens.is_empty() {
            continue;
        }
        // ( min ) ( max )
        let min = blocks::read_vec3(&tokens, 0, "bounds minimum")?;
        let max = blocks::read_vec3(&tokens, 5, "bounds maximum")?;
        let (Some(min), Some(max)) = (min, max) else {
            warn!("skipping malformed bounds line: {}", line.trim());
            continue;
        };
        bounds.push(FrameBounds { min, max });
    }
    Ok(bounds)
}

fn parse_base_frame(block: &RawBlock<'_>) -> Result<Vec<BaseFrameEntry>, Md5Error> {
    let mut entries = Vec::new();
    for line in &block.body {
        let tokens = blocks::tokenize(line);
        if tokens.is_empty() {
            continue;
        }
        // ( position ) ( qx qy qz )
        let position = blocks::read_vec3(&tokens, 0, "baseframe position")?;
        let orientation = blocks::read_vec3(&tokens, 5, "baseframe orientation")?;
        let (Some(position), Some(orientation)) = (position, orientation) else {
            warn!("skipping malformed baseframe line: {}", line.trim());
            continue;
        };
        entries.push(BaseFrameEntry { position, orientation: restore_quat_w(orientation) });
    }
    Ok(entries)
}

/// Frame bodies are a flat float stream; any non-numeric token means the
/// file is unusable.
fn parse_frame_data(block: &RawBlock<'_>) -> Result<Vec<f32>, Md5Error> {
    let mut data = Vec::new();
    for line in &block.body {
        for token in blocks::tokenize(line) {
            data.push(blocks::parse_f32(token, "frame data")?);
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "\
MD5Version 10
commandline \"anim models/minimal.mb\"

numFrames 2
numJoints 2
frameRate 24
numAnimatedComponents 6

hierarchy {
\t\"origin\"\t-1 63 0\t//
\t\"arm\"\t0 0 6\t// origin
}

bounds {
\t( -1 -1 -1 ) ( 2 2 2 )
\t( -1 -1 -1 ) ( 3 3 3 )
}

baseframe {
\t( 0 0 0 ) ( 0 0 0 )
\t( 1 0 0 ) ( 0 0 0 )
}

frame 0 {
\t 0 0 0
\t 0 0 0
}

frame 1 {
\t 1 0 0
\t 0 0 0
}
";

    #[test]
    fn parses_minimal_anim() {
        let anim = Md5Anim::parse(MINIMAL).unwrap();
        assert_eq!(anim.header.num_frames, 2);
        assert_eq!(anim.header.frame_rate, 24);
        assert_eq!(anim.header.num_animated_components, 6);

        assert_eq!(anim.hierarchy.len(), 2);
        assert_eq!(anim.hierarchy[0].flags, JointFlags::all());
        assert_eq!(anim.hierarchy[0].start_index, 0);
        assert!(anim.hierarchy[1].flags.is_empty());
        assert_eq!(anim.hierarchy[1].start_index, 6);

        assert_eq!(anim.bounds.len(), 2);
        assert_eq!(anim.bounds[1].max, Vec3::splat(3.0));

        assert_eq!(anim.base_frame.len(), 2);
        assert_eq!(anim.base_frame[1].position, Vec3::new(1.0, 0.0, 0.0));
        assert!((anim.base_frame[1].orientation.w - 1.0).abs() < 1e-6);

        assert_eq!(anim.frames.len(), 2);
        assert_eq!(anim.frames[0].id, 0);
        assert_eq!(anim.frames[1].data, vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn flag_bits_follow_component_order() {
        assert_eq!(JointFlags::TX.bits(), 1);
        assert_eq!(JointFlags::TZ.bits(), 4);
        assert_eq!(JointFlags::QZ.bits(), 32);
        let flags = JointFlags::from_bits_truncate(0b101);
        assert!(flags.contains(JointFlags::TX));
        assert!(!flags.contains(JointFlags::TY));
        assert!(flags.contains(JointFlags::TZ));
    }

    #[test]
    fn unknown_flag_bits_are_dropped() {
        let flags = JointFlags::from_bits_truncate(0xFFFF_FFC1);
        assert_eq!(flags, JointFlags::TX);
    }

    #[test]
    fn missing_hierarchy_is_fatal() {
        let text = "MD5Version 10\nbaseframe {\n\t( 0 0 0 ) ( 0 0 0 )\n}\n";
        let err = Md5Anim::parse(text).unwrap_err();
        assert!(matches!(err, Md5Error::MissingRequiredBlock("hierarchy")));
    }

    #[test]
    fn missing_baseframe_is_fatal() {
        let text = "MD5Version 10\nhierarchy {\n\t\"origin\" -1 0 0\n}\n";
        let err = Md5Anim::parse(text).unwrap_err();
        assert!(matches!(err, Md5Error::MissingRequiredBlock("baseframe")));
    }

    #[test]
    fn hierarchy_with_no_usable_lines_is_fatal() {
        let text = "MD5Version 10\nhierarchy {\n\tnoise without quotes\n}\n";
        let err = Md5Anim::parse(text).unwrap_err();
        assert!(matches!(err, Md5Error::MalformedBlock { .. }));
    }

    #[test]
    fn non_numeric_frame_token_is_fatal() {
        let text = "\
MD5Version 10
hierarchy {
\t\"origin\" -1 0 0
}
baseframe {
\t( 0 0 0 ) ( 0 0 0 )
}
frame 0 {
\t0.5 oops 1.5
}
";
        let err = Md5Anim::parse(text).unwrap_err();
        assert!(matches!(err, Md5Error::InvalidNumber { .. }));
    }

    #[test]
    fn frames_without_bounds_still_parse() {
        let text = "\
MD5Version 10
hierarchy {
\t\"origin\" -1 0 0
}
baseframe {
\t( 0 0 0 ) ( 0 0 0 )
}
frame 0 {
}
";
        let anim = Md5Anim::parse(text).unwrap();
        assert!(anim.bounds.is_empty());
        assert_eq!(anim.frames.len(), 1);
        assert!(anim.frames[0].data.is_empty());
    }
}
