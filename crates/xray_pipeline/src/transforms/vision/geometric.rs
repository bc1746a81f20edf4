use crate::dataloader::worker_gen_range;
use crate::transforms::Transform;
use anyhow::{ensure, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

// ============================================================================
// EnsureRGB
// ============================================================================
/// Ensures that the image is indeed 3-channel RGB. Chest X-rays are commonly
/// stored as single-channel grayscale.
#[derive(Debug, Clone)]
pub struct EnsureRGB;

impl Transform<DynamicImage, DynamicImage> for EnsureRGB {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        Ok(match img {
            DynamicImage::ImageRgb8(_) => img,
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        })
    }
}

// ============================================================================
// Resize
// ============================================================================

/// Target of a [`Resize`].
///
/// Serialized as either a bare integer (`224`) or a `[width, height]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResizeTarget {
    /// Match the shorter edge to this length, keeping the aspect ratio.
    ShorterSide(u32),
    /// Resize to exactly `[width, height]`.
    Exact([u32; 2]),
}

impl ResizeTarget {
    /// Output `(width, height)` for an input of `(width, height)`.
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        match *self {
            ResizeTarget::Exact([w, h]) => (w, h),
            ResizeTarget::ShorterSide(size) => {
                if width <= height {
                    let long = (size as u64 * height as u64 / width.max(1) as u64) as u32;
                    (size, long.max(1))
                } else {
                    let long = (size as u64 * width as u64 / height.max(1) as u64) as u32;
                    (long.max(1), size)
                }
            }
        }
    }
}

/// Resizes an image with a bilinear (`Triangle`) filter unless another
/// filter is requested.
///
/// # Filter Types
/// - `Nearest`: Nearest neighbour, fastest
/// - `Triangle`: Bilinear filter, good all-round default
/// - `CatmullRom`: Bicubic sharpening
/// - `Gaussian`: Blurring/smoothing
/// - `Lanczos3`: Lanczos with window 3, highest quality re-sampling but slowest.
///
/// # Examples
/// ``` ignore
/// let resize = Resize::new(ResizeTarget::ShorterSide(224))?;
/// let resized = resize.apply(img)?; // 1024x768 -> 298x224
/// ```
#[derive(Debug)]
pub struct Resize {
    target: ResizeTarget,
    filter: FilterType,
}

impl Resize {
    pub fn new(target: ResizeTarget) -> Result<Self> {
        Self::with_filter(target, FilterType::Triangle)
    }

    pub fn with_filter(target: ResizeTarget, filter: FilterType) -> Result<Self> {
        let valid = match target {
            ResizeTarget::ShorterSide(size) => size > 0,
            ResizeTarget::Exact([w, h]) => w > 0 && h > 0,
        };
        ensure!(
            valid,
            "Image dimensions must be positive after resizing (got {:?})",
            target
        );
        Ok(Self { target, filter })
    }
}

impl Transform<DynamicImage, DynamicImage> for Resize {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Cannot resize an empty image ({}x{})",
            width,
            height
        );
        let (new_width, new_height) = self.target.output_size(width, height);
        if (new_width, new_height) == (width, height) {
            return Ok(img);
        }
        Ok(img.resize_exact(new_width, new_height, self.filter))
    }
}

// ============================================================================
// CenterCrop
// ============================================================================

/// Crops the centered `width x height` window. Images smaller than the
/// window are zero-padded around the edges first.
#[derive(Debug)]
pub struct CenterCrop {
    width: u32,
    height: u32,
}

impl CenterCrop {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            "Crop dimensions must be positive (got {}x{})",
            width,
            height
        );
        Ok(Self { width, height })
    }

    /// Square crop, as configured for the X-ray loaders.
    pub fn square(size: u32) -> Result<Self> {
        Self::new(size, size)
    }

    fn pad_to_fit(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = img.dimensions();
        if width >= self.width && height >= self.height {
            return img;
        }
        let padded_width = width.max(self.width);
        let padded_height = height.max(self.height);
        let left = (padded_width - width) / 2;
        let top = (padded_height - height) / 2;

        let source = img.to_rgb8();
        let mut canvas = RgbImage::from_pixel(padded_width, padded_height, Rgb([0, 0, 0]));
        image::imageops::replace(&mut canvas, &source, left as i64, top as i64);
        DynamicImage::ImageRgb8(canvas)
    }
}

impl Transform<DynamicImage, DynamicImage> for CenterCrop {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let img = self.pad_to_fit(img);
        let (width, height) = img.dimensions();
        // Halves round to even: a 225-wide image cropped to 224 starts at 0.
        let left = ((width - self.width) as f64 / 2.0).round_ties_even() as u32;
        let top = ((height - self.height) as f64 / 2.0).round_ties_even() as u32;
        Ok(img.crop_imm(left, top, self.width, self.height))
    }
}

// ============================================================================
// RandomRotation
// ============================================================================

/// Rotates the image about its center by an angle drawn uniformly from
/// `[-degrees, degrees]`.
///
/// Nearest-neighbour sampling; the output keeps the input size and pixels
/// rotated in from outside the source are black.
#[derive(Debug)]
pub struct RandomRotation {
    degrees: f32,
}

impl RandomRotation {
    pub fn new(degrees: f32) -> Result<Self> {
        ensure!(
            degrees.is_finite() && degrees >= 0.0,
            "Rotation range must be a non-negative number of degrees (got {})",
            degrees
        );
        Ok(Self { degrees })
    }

    /// Rotates counter-clockwise by `angle` degrees.
    pub(crate) fn rotate(img: &RgbImage, angle: f64) -> RgbImage {
        let (width, height) = img.dimensions();
        let (sin, cos) = angle.to_radians().sin_cos();
        let center_x = (width as f64 - 1.0) / 2.0;
        let center_y = (height as f64 - 1.0) / 2.0;

        RgbImage::from_fn(width, height, |x, y| {
            // Inverse mapping: find the source pixel that lands on (x, y).
            let dx = x as f64 - center_x;
            let dy = y as f64 - center_y;
            let src_x = (cos * dx - sin * dy + center_x).round();
            let src_y = (sin * dx + cos * dy + center_y).round();

            if src_x >= 0.0 && src_y >= 0.0 && src_x < width as f64 && src_y < height as f64 {
                *img.get_pixel(src_x as u32, src_y as u32)
            } else {
                Rgb([0, 0, 0])
            }
        })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomRotation {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if self.degrees == 0.0 {
            return Ok(img);
        }
        let angle = worker_gen_range(-(self.degrees as f64), self.degrees as f64);
        Ok(DynamicImage::ImageRgb8(Self::rotate(&img.to_rgb8(), angle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_gradient_image(width: u32, height: u32) -> DynamicImage {
        let mut img = RgbImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let r = (x * 255 / width) as u8;
                let g = (y * 255 / height) as u8;
                img.put_pixel(x, y, Rgb([r, g, 128]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_resize_shorter_side_keeps_aspect() -> Result<()> {
        let resize = Resize::new(ResizeTarget::ShorterSide(50))?;

        assert_eq!(resize.apply(test_gradient_image(200, 100))?.dimensions(), (100, 50));
        assert_eq!(resize.apply(test_gradient_image(100, 300))?.dimensions(), (50, 150));
        Ok(())
    }

    #[test]
    fn test_resize_exact() -> Result<()> {
        let resize = Resize::with_filter(ResizeTarget::Exact([30, 20]), FilterType::Nearest)?;
        assert_eq!(resize.apply(test_gradient_image(100, 100))?.dimensions(), (30, 20));
        assert!(Resize::new(ResizeTarget::ShorterSide(0)).is_err());
        Ok(())
    }

    #[test]
    fn test_resize_target_serde_forms() -> Result<()> {
        let side: ResizeTarget = serde_json::from_str("224")?;
        let exact: ResizeTarget = serde_json::from_str("[32, 16]")?;
        assert_eq!(side, ResizeTarget::ShorterSide(224));
        assert_eq!(exact, ResizeTarget::Exact([32, 16]));
        Ok(())
    }

    #[test]
    fn test_center_crop_takes_middle() -> Result<()> {
        let mut img = RgbImage::new(5, 5);
        img.put_pixel(2, 2, Rgb([255, 255, 255]));
        let cropped = CenterCrop::square(3)?.apply(DynamicImage::ImageRgb8(img))?;

        assert_eq!(cropped.dimensions(), (3, 3));
        assert_eq!(cropped.to_rgb8().get_pixel(1, 1), &Rgb([255, 255, 255]));
        Ok(())
    }

    #[test]
    fn test_center_crop_odd_margin_rounds_to_even() -> Result<()> {
        let mut img = RgbImage::new(225, 229);
        img.put_pixel(0, 2, Rgb([255, 0, 0]));
        let cropped = CenterCrop::new(224, 224)?.apply(DynamicImage::ImageRgb8(img))?;

        // left = round(0.5) = 0, top = round(2.5) = 2
        assert_eq!(cropped.dimensions(), (224, 224));
        assert_eq!(cropped.to_rgb8().get_pixel(0, 0), &Rgb([255, 0, 0]));
        Ok(())
    }

    #[test]
    fn test_center_crop_pads_small_images() -> Result<()> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([9, 9, 9])));
        let cropped = CenterCrop::square(4)?.apply(img)?.to_rgb8();

        assert_eq!(cropped.dimensions(), (4, 4));
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(cropped.get_pixel(1, 1), &Rgb([9, 9, 9]));
        Ok(())
    }

    #[test]
    fn test_rotation_keeps_size_and_center() -> Result<()> {
        let mut img = RgbImage::new(5, 5);
        img.put_pixel(2, 2, Rgb([200, 10, 10]));

        let rotated = RandomRotation::rotate(&img, 90.0);
        assert_eq!(rotated.dimensions(), (5, 5));
        assert_eq!(rotated.get_pixel(2, 2), &Rgb([200, 10, 10]));

        let random = RandomRotation::new(10.0)?.apply(DynamicImage::ImageRgb8(img))?;
        assert_eq!(random.dimensions(), (5, 5));
        Ok(())
    }

    #[test]
    fn test_rotation_quarter_turn_moves_corners() {
        let mut img = RgbImage::new(3, 3);
        img.put_pixel(2, 0, Rgb([255, 0, 0])); // top-right

        // 90 degrees counter-clockwise moves top-right to top-left.
        let rotated = RandomRotation::rotate(&img, 90.0);
        assert_eq!(rotated.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_ensure_rgb_converts_grayscale() -> Result<()> {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(2, 2));
        assert!(matches!(EnsureRGB.apply(gray)?, DynamicImage::ImageRgb8(_)));
        Ok(())
    }
}
