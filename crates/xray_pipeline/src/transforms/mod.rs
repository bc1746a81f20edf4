pub mod compose;
pub mod core;
pub mod vision;

pub use compose::{Compose, ImagePipeline, TransformStep};
pub use core::{Chain, Transform};
