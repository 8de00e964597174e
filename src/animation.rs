pub mod frame;
pub mod item;
pub mod skinning;

pub use frame::{AnimatedFrame, MAX_JOINTS};
pub use item::AnimatedItem;
pub use skinning::process;
