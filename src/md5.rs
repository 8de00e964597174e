use glam::{Quat, Vec3};
use thiserror::Error;

pub mod anim;
pub mod blocks;
pub mod model;

pub use anim::Md5Anim;
pub use model::Md5Model;

/// Errors raised while parsing `.md5mesh` / `.md5anim` text. Block body
/// lines of the wrong shape are not errors; they are skipped with a logged
/// diagnostic.
#[derive(Debug, Error)]
pub enum Md5Error {
    #[error("cannot parse empty file")]
    EmptyFile,
    #[error("cannot find header terminator")]
    MissingHeader,
    #[error("malformed `{block}` block: {detail}")]
    MalformedBlock { block: String, detail: String },
    #[error("missing required `{0}` block")]
    MissingRequiredBlock(&'static str),
    #[error("invalid number `{token}` in {context}")]
    InvalidNumber { token: String, context: &'static str },
}

/// Rebuilds the `w` component of a quaternion stored as its vector part
/// only. MD5 files truncate orientations this way; both the bind pose and
/// every animation frame must go through this exact reconstruction or the
/// two disagree about which of the two mirror rotations was meant.
pub fn restore_quat_w(v: Vec3) -> Quat {
    let t = 1.0 - v.x * v.x - v.y * v.y - v.z * v.z;
    let w = if t < 0.0 { 0.0 } else { t.sqrt() };
    Quat::from_xyzw(v.x, v.y, v.z, w)
}
