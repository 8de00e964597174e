use std::path::{Path, PathBuf};

pub const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Surface description handed to the renderer alongside each mesh. The
/// crate only records texture paths; decoding them is the texture
/// cache's problem.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub color: [f32; 4],
    pub reflectance: f32,
    pub texture: Option<PathBuf>,
    pub normal_map: Option<PathBuf>,
}

impl Material {
    pub fn flat(color: [f32; 4], reflectance: f32) -> Self {
        Self { color, reflectance, texture: None, normal_map: None }
    }

    /// Records a texture path and probes the filesystem for its
    /// `<stem>_normal.<ext>` companion.
    pub fn textured(path: impl Into<PathBuf>) -> Self {
        let texture = path.into();
        let normal_map = normal_map_companion(&texture);
        Self { color: DEFAULT_COLOR, reflectance: 0.0, texture: Some(texture), normal_map }
    }

    pub fn is_textured(&self) -> bool {
        self.texture.is_some()
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::flat(DEFAULT_COLOR, 0.0)
    }
}

fn normal_map_companion(texture: &Path) -> Option<PathBuf> {
    let stem = texture.file_stem()?.to_str()?;
    let ext = texture.extension()?.to_str()?;
    let candidate = texture.with_file_name(format!("{stem}_normal.{ext}"));
    candidate.exists().then_some(candidate)
}
