use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::animation::item::AnimatedItem;
use crate::animation::skinning;
use crate::material::DEFAULT_COLOR;
use crate::md5::{Md5Anim, Md5Model};

/// One model the manifest asks for: a mesh/animation file pair plus the
/// fallback color used when a mesh has no shader texture. Paths are
/// relative to the manifest file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub mesh: String,
    pub anim: String,
    #[serde(default = "default_entry_color")]
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelManifest {
    pub models: Vec<ModelEntry>,
}

impl ModelManifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("{} does not match the model manifest schema", path.display()))
    }
}

/// Every manifest entry resolved into a ready `AnimatedItem`, keyed by
/// entry name.
pub struct ModelCatalog {
    items: HashMap<String, AnimatedItem>,
}

impl ModelCatalog {
    pub fn load(manifest_path: impl AsRef<Path>) -> Result<Self> {
        let manifest_path = manifest_path.as_ref();
        let manifest = ModelManifest::load(manifest_path)?;
        let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));

        let mut items = HashMap::new();
        for entry in &manifest.models {
            let model = Md5Model::load(base.join(&entry.mesh))?;
            let anim = Md5Anim::load(base.join(&entry.anim))?;
            let item = skinning::process(model, anim, entry.color)
                .with_context(|| format!("resolving model `{}`", entry.name))?;
            if items.insert(entry.name.clone(), item).is_some() {
                bail!("duplicate model entry `{}` in {}", entry.name, manifest_path.display());
            }
        }
        Ok(Self { items })
    }

    pub fn item(&self, name: &str) -> Option<&AnimatedItem> {
        self.items.get(name)
    }

    /// Mutable access so the game loop can advance an item's frame
    /// cursor.
    pub fn item_mut(&mut self, name: &str) -> Option<&mut AnimatedItem> {
        self.items.get_mut(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

const fn default_entry_color() -> [f32; 4] {
    DEFAULT_COLOR
}
