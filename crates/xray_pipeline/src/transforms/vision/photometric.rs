use crate::dataloader::{worker_gen_range, worker_shuffle};
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use tch::Tensor;

// ============================================================================
// ColorJitter
// ============================================================================

/// Randomly changes the brightness, contrast, saturation and hue of an image.
///
/// Each call draws
/// - a brightness factor from `[max(0, 1 - brightness), 1 + brightness]`
/// - a contrast factor from `[max(0, 1 - contrast), 1 + contrast]`
/// - a saturation factor from `[max(0, 1 - saturation), 1 + saturation]`
/// - a hue shift from `[-hue, hue]` (fraction of a full turn, `hue <= 0.5`)
///
/// and applies the four adjustments in a random order. A parameter of `0`
/// disables that adjustment.
///
/// # Example
/// ```ignore
/// let jitter = ColorJitter::new(0.1, 0.1, 0.1, 0.1)?;
/// let augmented = jitter.apply(image)?;
/// ```
#[derive(Debug, Clone)]
pub struct ColorJitter {
    brightness: f32,
    contrast: f32,
    saturation: f32,
    hue: f32,
}

#[derive(Debug, Clone, Copy)]
enum Adjustment {
    Brightness(f32),
    Contrast(f32),
    Saturation(f32),
    Hue(f32),
}

impl ColorJitter {
    pub fn new(brightness: f32, contrast: f32, saturation: f32, hue: f32) -> Result<Self> {
        for (name, value) in [
            ("brightness", brightness),
            ("contrast", contrast),
            ("saturation", saturation),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "ColorJitter {} must be non-negative (got {})",
                name,
                value
            );
        }
        ensure!(
            (0.0..=0.5).contains(&hue),
            "ColorJitter hue must be in [0.0, 0.5] (got {})",
            hue
        );
        Ok(Self {
            brightness,
            contrast,
            saturation,
            hue,
        })
    }

    fn factor(spread: f32) -> f32 {
        worker_gen_range((1.0 - spread).max(0.0) as f64, (1.0 + spread) as f64) as f32
    }

    fn draw_adjustments(&self) -> Vec<Adjustment> {
        let mut adjustments = Vec::with_capacity(4);
        if self.brightness > 0.0 {
            adjustments.push(Adjustment::Brightness(Self::factor(self.brightness)));
        }
        if self.contrast > 0.0 {
            adjustments.push(Adjustment::Contrast(Self::factor(self.contrast)));
        }
        if self.saturation > 0.0 {
            adjustments.push(Adjustment::Saturation(Self::factor(self.saturation)));
        }
        if self.hue > 0.0 {
            let shift = worker_gen_range(-(self.hue as f64), self.hue as f64) as f32;
            adjustments.push(Adjustment::Hue(shift));
        }
        worker_shuffle(&mut adjustments);
        adjustments
    }

    fn adjust(img: &mut RgbImage, adjustment: Adjustment) {
        match adjustment {
            Adjustment::Brightness(factor) => {
                for pixel in img.pixels_mut() {
                    for c in pixel.0.iter_mut() {
                        *c = clamp_u8(*c as f32 * factor);
                    }
                }
            }
            Adjustment::Contrast(factor) => {
                let count = (img.width() as f64 * img.height() as f64).max(1.0);
                let mean = img.pixels().map(|p| luma(p) as f64).sum::<f64>() / count;
                let mean = mean as f32;
                for pixel in img.pixels_mut() {
                    for c in pixel.0.iter_mut() {
                        *c = clamp_u8(blend(*c as f32, mean, factor));
                    }
                }
            }
            Adjustment::Saturation(factor) => {
                for pixel in img.pixels_mut() {
                    let gray = luma(pixel);
                    for c in pixel.0.iter_mut() {
                        *c = clamp_u8(blend(*c as f32, gray, factor));
                    }
                }
            }
            Adjustment::Hue(shift) => {
                for pixel in img.pixels_mut() {
                    let (h, s, v) = rgb_to_hsv(pixel);
                    *pixel = hsv_to_rgb((h + shift).rem_euclid(1.0), s, v);
                }
            }
        }
    }
}

impl Transform<DynamicImage, DynamicImage> for ColorJitter {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let adjustments = self.draw_adjustments();
        if adjustments.is_empty() {
            return Ok(img);
        }
        let mut rgb = img.to_rgb8();
        for adjustment in adjustments {
            Self::adjust(&mut rgb, adjustment);
        }
        Ok(DynamicImage::ImageRgb8(rgb))
    }
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// `factor * value + (1 - factor) * other`
fn blend(value: f32, other: f32, factor: f32) -> f32 {
    factor * value + (1.0 - factor) * other
}

/// ITU-R 601-2 luma, the grayscale used for contrast and saturation.
fn luma(pixel: &Rgb<u8>) -> f32 {
    let [r, g, b] = pixel.0;
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Returns `(hue, saturation, value)`, each in `[0, 1]`.
fn rgb_to_hsv(pixel: &Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = pixel.0.map(|c| c as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    (hue, saturation, max)
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Rgb<u8> {
    let sector = hue * 6.0;
    let chroma = value * saturation;
    let x = chroma * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
    let m = value - chroma;

    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    Rgb([r, g, b].map(|c| clamp_u8((c + m) * 255.0)))
}

// ============================================================================
// Normalize
// ============================================================================

/// Normalizes tensors using channel-wise statistics.
///
/// # Mathematical Operation:
/// ```text
/// output[...,c,h,w] = (input[...,c,h,w] - mean[c]) / std[c]
/// ```
///
/// # Example
/// ```ignore
/// let norm = Normalize::imagenet();
/// let normalized = norm.apply(tensor)?;
/// ```
#[derive(Debug)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalize {
    pub fn new(mean: &[f32], std: &[f32]) -> Result<Self> {
        ensure!(!mean.is_empty(), "Normalization mean cannot be empty");
        ensure!(
            mean.len() == std.len(),
            "The mean and standard deviation for normalization must match in dimension. \
            The dimension of mean is {} but the dimension of std is {}.",
            mean.len(),
            std.len()
        );
        ensure!(
            std.iter().all(|s| *s != 0.0),
            "Normalization std must not contain zeros (got {:?})",
            std
        );
        Ok(Self {
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    /// ImageNet standard normalization (RGB)
    pub fn imagenet() -> Self {
        Self {
            mean: vec![0.485, 0.456, 0.406],
            std: vec![0.229, 0.224, 0.225],
        }
    }
}

impl Transform<Tensor, Tensor> for Normalize {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        let (num_channels, _height, _width) = tensor
            .size3()
            .context("Input must be 3D tensor [C, H, W]")?;

        ensure!(
            num_channels as usize == self.mean.len(),
            "Channel count mismatch: input has {} channels but normalization expects {}",
            num_channels,
            self.mean.len()
        );

        let mean_t = Tensor::from_slice(&self.mean)
            .reshape(&[num_channels, 1, 1])
            .to_kind(tensor.kind());

        let std_t = Tensor::from_slice(&self.std)
            .reshape(&[num_channels, 1, 1])
            .to_kind(tensor.kind());

        Ok((tensor - mean_t) / std_t)
    }
}
