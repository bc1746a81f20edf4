pub mod image_folder;

pub use image_folder::{ImageFolder, IMG_EXTENSIONS};
