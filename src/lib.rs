pub mod animation;
pub mod assets;
pub mod material;
pub mod md5;
pub mod mesh;

pub use animation::{process, AnimatedFrame, AnimatedItem, MAX_JOINTS};
pub use md5::{Md5Anim, Md5Error, Md5Model};
