use crate::sample::{Sample, IMAGE_FEATURE, LABEL_FEATURE};
use crate::transforms::vision::EnsureRGB;
use crate::transforms::Transform;
use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tch::Tensor;

// ============================================================================
// LoadImage
// ============================================================================

/// Reads an image file from disk into a `DynamicImage`.
///
/// The format is guessed from the file contents, so a mislabeled extension
/// (a PNG saved as `.jpg`) still decodes.
///
/// # Example
/// ```ignore
/// let image = LoadImage::new().apply(PathBuf::from("NORMAL/IM-0001.jpeg"))?;
/// println!("Image size: {:?}", image.dimensions());
/// ```
#[derive(Debug, Clone)]
pub struct LoadImage {
    buffer_size: usize,
}

impl LoadImage {
    /// Creates a new image loader with an 8KB read buffer.
    pub fn new() -> Self {
        Self { buffer_size: 8192 }
    }
}

impl Default for LoadImage {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<PathBuf, DynamicImage> for LoadImage {
    fn apply(&self, path: PathBuf) -> Result<DynamicImage> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?;
        let reader = BufReader::with_capacity(self.buffer_size, file);

        ImageReader::new(reader)
            .with_guessed_format()
            .with_context(|| format!("Failed to read image: {}", path.display()))?
            .decode()
            .with_context(|| format!("Failed to decode image: {}", path.display()))
    }
}

// ============================================================================
// LoadImageToSample
// ============================================================================

/// Loads a labeled image file and turns it into a [`Sample`].
///
/// 1. Loads the image with [`LoadImage`] and converts it to RGB
/// 2. Runs the image pipeline `T` (`DynamicImage -> Tensor`)
/// 3. Stores the result under `"image"` and the class index under `"label"`
///
/// The label is a scalar i64 tensor so a batch of labels collates to `[B]`.
///
/// # Example
/// ```ignore
/// let pipeline = Compose::new(vec![TransformStep::ToTensor]).build()?;
/// let dataset = InMemoryDataset::new(vec![(PathBuf::from("NORMAL/a.png"), 0)])
///     .with_transform(LoadImageToSample::new(pipeline));
/// ```
#[derive(Debug, Clone)]
pub struct LoadImageToSample<T> {
    image_loader: LoadImage,
    image_transform: T,
}

impl<T> LoadImageToSample<T> {
    pub fn new(image_transform: T) -> Self {
        Self {
            image_loader: LoadImage::new(),
            image_transform,
        }
    }
}

impl<T> Transform<(PathBuf, usize), Sample> for LoadImageToSample<T>
where
    T: Transform<DynamicImage, Tensor>,
{
    fn apply(&self, (path, label): (PathBuf, usize)) -> Result<Sample> {
        let image = self
            .image_loader
            .apply(path.clone())
            .and_then(|image| EnsureRGB.apply(image))?;

        let image_tensor = self
            .image_transform
            .apply(image)
            .with_context(|| format!("Failed to apply transforms to image: {}", path.display()))?;

        Ok(Sample::from_single(IMAGE_FEATURE, image_tensor)
            .with_feature(LABEL_FEATURE, Tensor::from(label as i64)))
    }
}
