use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use tch::{Kind, Tensor};

// ============================================================================
// ToTensor
// ============================================================================

/// Converts an image to a channel-first `[3, H, W]` f32 tensor in `[0.0, 1.0]`.
///
/// Non-RGB inputs (grayscale X-rays, RGBA PNGs) are converted to RGB first,
/// so every tensor leaving this step has three channels.
///
/// # Example
/// ```ignore
/// let tensor = ToTensor.apply(image)?;
/// ```
#[derive(Debug)]
pub struct ToTensor;

impl Transform<DynamicImage, Tensor> for ToTensor {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );

        let rgb = match img {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        };

        // Pixel data is interleaved (HWC); move channels to the front.
        Tensor::from_slice(rgb.as_raw())
            .reshape(&[height as i64, width as i64, 3])
            .permute(&[2, 0, 1])
            .to_kind(Kind::Float)
            .f_div_scalar(255.0)
            .context("Failed to scale tensor values")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_to_tensor_layout_and_range() -> Result<()> {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([255, 0, 51]));
        let tensor = ToTensor.apply(DynamicImage::ImageRgb8(img))?;

        assert_eq!(tensor.size(), vec![3, 2, 3]);
        assert_eq!(tensor.kind(), Kind::Float);
        assert!((tensor.double_value(&[0, 1, 2]) - 1.0).abs() < 1e-6);
        assert!(tensor.double_value(&[1, 1, 2]).abs() < 1e-6);
        assert!((tensor.double_value(&[2, 1, 2]) - 0.2).abs() < 1e-6);
        assert!(tensor.double_value(&[0, 0, 0]).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_to_tensor_grayscale_becomes_three_channels() -> Result<()> {
        let gray = GrayImage::from_pixel(4, 5, Luma([128]));
        let tensor = ToTensor.apply(DynamicImage::ImageLuma8(gray))?;

        assert_eq!(tensor.size(), vec![3, 5, 4]);
        for c in 0..3 {
            assert!((tensor.double_value(&[c, 0, 0]) - 128.0 / 255.0).abs() < 1e-6);
        }
        Ok(())
    }
}
