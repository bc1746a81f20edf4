//! Vision transforms for chest X-ray preprocessing and augmentation.
//!
//! ```text
//! transforms/vision/
//! ├── geometric.rs     → Spatial transformations (resize, crop, rotate)
//! ├── photometric.rs   → Color and appearance (jitter, normalize)
//! ├── conversion.rs    → Format conversions (image → tensor)
//! ├── augmentation.rs  → Pure data augmentation (flip)
//! └── io.rs            → Image loading
//! ```
//!
//! All transforms are re-exported at the module level:
//!
//! ```ignore
//! use crate::transforms::Transform;
//! use crate::transforms::vision::{CenterCrop, Normalize, Resize, ResizeTarget, ToTensor};
//!
//! let pipeline = Resize::new(ResizeTarget::ShorterSide(224))?
//!     .then(CenterCrop::square(224)?)
//!     .then(ToTensor)
//!     .then(Normalize::imagenet());
//! ```

pub mod augmentation;
pub mod conversion;
pub mod geometric;
pub mod io;
pub mod photometric;

pub use augmentation::RandomHorizontalFlip;
pub use conversion::ToTensor;
pub use geometric::{CenterCrop, EnsureRGB, RandomRotation, Resize, ResizeTarget};
pub use io::{LoadImage, LoadImageToSample};
pub use photometric::{ColorJitter, Normalize};
